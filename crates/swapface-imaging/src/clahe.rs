//! Contrast-Limited Adaptive Histogram Equalization on a single 8-bit plane.

/// Apply CLAHE in-place to a row-major single-channel plane.
///
/// `grid` is the number of tiles per side. `clip_limit` follows the usual
/// convention of a multiple of the average bin height: each tile histogram is
/// clipped at `clip_limit * tile_pixels / 256` and the excess redistributed
/// evenly over all bins. Pixels are mapped by bilinear interpolation between the four
/// nearest tile lookup tables.
pub fn clahe(plane: &mut [u8], width: u32, height: u32, grid: u32, clip_limit: f32) {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 || grid == 0 || plane.len() < w * h {
        return;
    }

    // Never more tiles than pixels along an axis.
    let tx = (grid as usize).min(w);
    let ty = (grid as usize).min(h);

    let col_bounds: Vec<usize> = (0..=tx).map(|i| i * w / tx).collect();
    let row_bounds: Vec<usize> = (0..=ty).map(|i| i * h / ty).collect();

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity(tx * ty);

    for row in 0..ty {
        for col in 0..tx {
            let (y0, y1) = (row_bounds[row], row_bounds[row + 1]);
            let (x0, x1) = (col_bounds[col], col_bounds[col + 1]);
            let tile_pixels = (y1 - y0) * (x1 - x0);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for &p in &plane[y * w + x0..y * w + x1] {
                    hist[p as usize] += 1;
                }
            }

            if clip_limit > 0.0 {
                let clip = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);
                let mut excess = 0u32;
                for bin in hist.iter_mut() {
                    if *bin > clip {
                        excess += *bin - clip;
                        *bin = clip;
                    }
                }
                let redist = excess / 256;
                for bin in hist.iter_mut() {
                    *bin += redist;
                }
                // Residual spread at a fixed step across the whole range.
                let residual = (excess % 256) as usize;
                if residual > 0 {
                    let step = (256 / residual).max(1);
                    for bin in hist.iter_mut().step_by(step).take(residual) {
                        *bin += 1;
                    }
                }
            }

            let scale = 255.0 / tile_pixels.max(1) as f32;
            let mut lut = [0u8; 256];
            let mut cdf = 0u32;
            for (i, &count) in hist.iter().enumerate() {
                cdf += count;
                lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
            }
            luts.push(lut);
        }
    }

    let tile_w = w as f32 / tx as f32;
    let tile_h = h as f32 / ty as f32;

    for y in 0..h {
        let fy = ((y as f32 + 0.5) / tile_h - 0.5).clamp(0.0, (ty - 1) as f32);
        let r0 = fy as usize;
        let r1 = (r0 + 1).min(ty - 1);
        let dy = fy - r0 as f32;

        for x in 0..w {
            let fx = ((x as f32 + 0.5) / tile_w - 0.5).clamp(0.0, (tx - 1) as f32);
            let c0 = fx as usize;
            let c1 = (c0 + 1).min(tx - 1);
            let dx = fx - c0 as f32;

            let pixel = plane[y * w + x] as usize;
            let tl = luts[r0 * tx + c0][pixel] as f32;
            let tr = luts[r0 * tx + c1][pixel] as f32;
            let bl = luts[r1 * tx + c0][pixel] as f32;
            let br = luts[r1 * tx + c1][pixel] as f32;

            let top = tl * (1.0 - dx) + tr * dx;
            let bot = bl * (1.0 - dx) + br * dx;
            let val = top * (1.0 - dy) + bot * dy;

            plane[y * w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
}
