//! Filter primitives: photographic enhancers, convolution, bilateral smoothing.
//!
//! Every function takes the input by reference and returns a new image.

use image::{Rgb, RgbImage};

/// 3x3 detail-boosting kernel (center 9, neighbors -1).
pub const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// 3x3 smoothing kernel used as the degenerate image for [`sharpness`].
const SMOOTH_KERNEL: [f32; 9] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    5.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
];

/// Reflect an out-of-range index back into `0..n` without repeating the edge.
fn reflect101(i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * (n - 1) - i;
        }
    }
    i as usize
}

/// Rec. 601 integer luma.
fn luma(p: &Rgb<u8>) -> u8 {
    ((p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000) as u8
}

/// Interpolate between `degenerate` and `image`: `d + factor * (i - d)`.
///
/// `factor` 1.0 returns `image`, 0.0 returns `degenerate`, values above 1.0
/// extrapolate away from the degenerate image.
fn blend(degenerate: &RgbImage, image: &RgbImage, factor: f32) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for ((o, d), i) in out.pixels_mut().zip(degenerate.pixels()).zip(image.pixels()) {
        for c in 0..3 {
            let (dv, iv) = (d[c] as f32, i[c] as f32);
            o[c] = (dv + factor * (iv - dv)).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Convolve with a 3x3 kernel (row-major), reflecting at the borders.
pub fn convolve3x3(image: &RgbImage, kernel: &[f32; 9]) -> RgbImage {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let mut out = RgbImage::new(image.width(), image.height());

    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 3];
            for ky in 0..3i64 {
                let sy = reflect101(y + ky - 1, h);
                for kx in 0..3i64 {
                    let sx = reflect101(x + kx - 1, w);
                    let weight = kernel[(ky * 3 + kx) as usize];
                    let p = image.get_pixel(sx as u32, sy as u32);
                    for c in 0..3 {
                        acc[c] += weight * p[c] as f32;
                    }
                }
            }
            out.put_pixel(
                x as u32,
                y as u32,
                Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8)),
            );
        }
    }

    out
}

/// Sharpness enhancer. `factor` 1.3 means +30% sharpness.
///
/// The degenerate image is a 3x3 smoothed copy whose one-pixel border is
/// kept from the original, so flat regions and edges of the frame are stable.
pub fn sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut smoothed = convolve3x3(image, &SMOOTH_KERNEL);
    for y in 0..h {
        for x in 0..w {
            if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                smoothed.put_pixel(x, y, *image.get_pixel(x, y));
            }
        }
    }
    blend(&smoothed, image, factor)
}

/// Contrast enhancer: interpolate against a flat image at the mean luma.
pub fn contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return image.clone();
    }
    let sum: u64 = image.pixels().map(|p| luma(p) as u64).sum();
    let mean = ((sum as f64 / count as f64) + 0.5) as u8;

    let flat = RgbImage::from_pixel(image.width(), image.height(), Rgb([mean, mean, mean]));
    blend(&flat, image, factor)
}

/// Color (saturation) enhancer: interpolate against the grayscale image.
pub fn color(image: &RgbImage, factor: f32) -> RgbImage {
    let mut gray = RgbImage::new(image.width(), image.height());
    for (g, p) in gray.pixels_mut().zip(image.pixels()) {
        let l = luma(p);
        *g = Rgb([l, l, l]);
    }
    blend(&gray, image, factor)
}

/// Edge-preserving bilateral filter.
///
/// `diameter` sets the circular neighborhood; range weights use the L1
/// distance over the three channels.
pub fn bilateral(image: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let radius = (diameter / 2).max(1) as i64;
    let (w, h) = (image.width() as i64, image.height() as i64);
    let mut out = RgbImage::new(image.width(), image.height());
    if w == 0 || h == 0 {
        return out;
    }

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let color_weights: Vec<f32> = (0..=255 * 3)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut offsets: Vec<(i64, i64, f32)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            offsets.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    for y in 0..h {
        for x in 0..w {
            let center = image.get_pixel(x as u32, y as u32);
            let mut acc = [0.0f32; 3];
            let mut wsum = 0.0f32;

            for &(dx, dy, space_w) in &offsets {
                let sx = reflect101(x + dx, w) as u32;
                let sy = reflect101(y + dy, h) as u32;
                let p = image.get_pixel(sx, sy);
                let dist = (0..3)
                    .map(|c| (p[c] as i32 - center[c] as i32).unsigned_abs() as usize)
                    .sum::<usize>();
                let weight = space_w * color_weights[dist];
                for c in 0..3 {
                    acc[c] += weight * p[c] as f32;
                }
                wsum += weight;
            }

            let px = if wsum > 0.0 {
                acc.map(|v| (v / wsum).round().clamp(0.0, 255.0) as u8)
            } else {
                center.0
            };
            out.put_pixel(x as u32, y as u32, Rgb(px));
        }
    }

    out
}

/// Light Gaussian blur.
pub fn gaussian_blur(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    image::imageops::blur(image, sigma)
}
