//! Face alignment via 4-DOF similarity transform.
//!
//! Aligns detected faces to a canonical square crop using the five
//! InsightFace reference landmarks and least-squares estimation, and pastes
//! generated crops back into the full frame through the inverse transform.

use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Width of the feathered seam when pasting a crop back, as a fraction of the crop size.
const PASTE_FEATHER_RATIO: f32 = 0.1;

/// 2×3 affine matrix `[a, c, tx, b, d, ty]`, mapping frame → crop.
pub type AffineMatrix = [f32; 6];

/// Reference landmarks for a `size`×`size` crop.
///
/// Multiples of 112 scale the ArcFace template directly; other sizes (the
/// 128 swap crop) use the 128 layout, which shifts the template right by 8/128.
pub fn reference_landmarks(size: u32) -> [(f32, f32); 5] {
    let (ratio, diff_x) = if size % 112 == 0 {
        (size as f32 / 112.0, 0.0)
    } else {
        let ratio = size as f32 / 128.0;
        (ratio, 8.0 * ratio)
    };
    REFERENCE_LANDMARKS_112.map(|(x, y)| (x * ratio + diff_x, y * ratio))
}

/// Estimate a 2×3 similarity transform (4-DOF: scale, rotation, translation)
/// from `src` landmarks to `dst` landmarks using least-squares.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
pub fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> AffineMatrix {
    // Build overdetermined system A * [a, b, tx, ty]^T = B
    // For each point pair (sx, sy) -> (dx, dy):
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16]; // 4x4, row-major
    let mut atb = [0.0f32; 4]; // 4x1

    for i in 0..5 {
        let (sx, sy) = src[i];
        let (dx, dy) = dst[i];

        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];

        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let x = solve_4x4(&ata, &atb);
    let (a, b, tx, ty) = (x[0], x[1], x[2], x[3]);

    [a, -b, tx, b, a, ty]
}

/// Solve a 4×4 linear system via Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    // Augmented matrix [A | b] as 4x5
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = ata[i * 4 + j];
        }
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut max_row = col;
        let mut max_val = m[col][col].abs();
        for row in (col + 1)..4 {
            if m[row][col].abs() > max_val {
                max_val = m[row][col].abs();
                max_row = row;
            }
        }
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0]; // fallback: identity-ish
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }

    x
}

/// Invert a 2×3 affine matrix. `None` when the linear part is singular.
pub fn invert_affine(m: &AffineMatrix) -> Option<AffineMatrix> {
    let (a, c, tx, b, d, ty) = (m[0], m[1], m[2], m[3], m[4], m[5]);
    let det = a * d - b * c;
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    let (ia, ic, ib, id) = (d * inv, -c * inv, -b * inv, a * inv);
    Some([ia, ic, -(ia * tx + ic * ty), ib, id, -(ib * tx + id * ty)])
}

fn apply(m: &AffineMatrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5])
}

/// Bilinear sample. `None` outside the image.
fn sample(image: &RgbImage, x: f32, y: f32) -> Option<[f32; 3]> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    if x < -0.5 || y < -0.5 || x > w as f32 - 0.5 || y > h as f32 - 0.5 {
        return None;
    }
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let px = |xx: i64, yy: i64| -> [f32; 3] {
        let p = image.get_pixel(xx.clamp(0, w - 1) as u32, yy.clamp(0, h - 1) as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };
    let (p00, p10, p01, p11) = (px(x0, y0), px(x0 + 1, y0), px(x0, y0 + 1), px(x0 + 1, y0 + 1));

    Some(std::array::from_fn(|c| {
        p00[c] * (1.0 - fx) * (1.0 - fy) + p10[c] * fx * (1.0 - fy) + p01[c] * (1.0 - fx) * fy + p11[c] * fx * fy
    }))
}

/// Apply a frame → crop affine warp, producing a `size`×`size` RGB crop.
///
/// Uses bilinear interpolation. Pixels that map outside the frame are black.
pub fn warp_affine(image: &RgbImage, matrix: &AffineMatrix, size: u32) -> RgbImage {
    let mut out = RgbImage::new(size, size);
    let Some(inverse) = invert_affine(matrix) else {
        return out;
    };

    for (ox, oy, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = apply(&inverse, ox as f32, oy as f32);
        if let Some(v) = sample(image, sx, sy) {
            *pixel = Rgb(v.map(|c| c.round().clamp(0.0, 255.0) as u8));
        }
    }

    out
}

/// Align a detected face to a canonical `size`×`size` crop.
///
/// Returns the crop and the frame → crop matrix needed by [`paste_back`].
pub fn align(image: &RgbImage, landmarks: &[(f32, f32); 5], size: u32) -> (RgbImage, AffineMatrix) {
    let matrix = estimate_similarity_transform(landmarks, &reference_landmarks(size));
    (warp_affine(image, &matrix, size), matrix)
}

/// Composite a generated crop back into `target` through the inverse of `matrix`.
///
/// The crop border is feathered so the seam fades into the target. Pixels
/// the crop does not cover are copied from `target` unchanged.
pub fn paste_back(target: &RgbImage, crop: &RgbImage, matrix: &AffineMatrix) -> RgbImage {
    let mut out = target.clone();
    let size = crop.width().min(crop.height()) as f32;
    let Some(inverse) = invert_affine(matrix) else {
        return out;
    };
    if size == 0.0 || target.width() == 0 || target.height() == 0 {
        return out;
    }

    // Bounding box of the crop in frame coordinates.
    let corners = [(0.0, 0.0), (size, 0.0), (0.0, size), (size, size)].map(|(x, y)| apply(&inverse, x, y));
    let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let max_x = (corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).ceil() as i64)
        .clamp(0, target.width() as i64 - 1) as u32;
    let max_y = (corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).ceil() as i64)
        .clamp(0, target.height() as i64 - 1) as u32;

    let feather = (size * PASTE_FEATHER_RATIO).max(1.0);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (cx, cy) = apply(matrix, x as f32, y as f32);
            let edge = cx.min(cy).min(size - 1.0 - cx).min(size - 1.0 - cy);
            if edge < 0.0 {
                continue;
            }
            let Some(generated) = sample(crop, cx, cy) else {
                continue;
            };
            let alpha = (edge / feather).min(1.0);
            let original = target.get_pixel(x, y);
            let blended: [u8; 3] = std::array::from_fn(|c| {
                (generated[c] * alpha + original[c] as f32 * (1.0 - alpha))
                    .round()
                    .clamp(0.0, 255.0) as u8
            });
            out.put_pixel(x, y, Rgb(blended));
        }
    }

    out
}
