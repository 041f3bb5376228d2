//! 8-bit color-space conversions.
//!
//! Converted images reuse the three-channel `RgbImage` container; the channel
//! meaning changes with the space:
//!
//! - HSV: `[H, S, V]` with H in 0–179 (degrees / 2), S and V in 0–255.
//! - LAB: `[L, a, b]` with L scaled to 0–255 and a, b offset by 128.

use image::{Rgb, RgbImage};

// D65 reference white
const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;
const LAB_EPSILON: f32 = 0.008_856;

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv_pixel(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff / v * 255.0 } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as u32 % 180;
    [h as u8, s.round().clamp(0.0, 255.0) as u8, v as u8]
}

/// Convert one 8-bit HSV pixel back to RGB.
pub fn hsv_to_rgb_pixel(hsv: [u8; 3]) -> [u8; 3] {
    let h = hsv[0] as f32 * 2.0;
    let s = hsv[1] as f32 / 255.0;
    let v = hsv[2] as f32;

    if s == 0.0 {
        let v = v as u8;
        return [v, v, v];
    }

    let sector = (h / 60.0).floor();
    let f = h / 60.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    [r, g, b].map(|c| c.round().clamp(0.0, 255.0) as u8)
}

/// Convert an RGB image to 8-bit HSV.
pub fn rgb_to_hsv(image: &RgbImage) -> RgbImage {
    map_pixels(image, rgb_to_hsv_pixel)
}

/// Convert an 8-bit HSV image back to RGB.
pub fn hsv_to_rgb(image: &RgbImage) -> RgbImage {
    map_pixels(image, hsv_to_rgb_pixel)
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let cube = t * t * t;
    if cube > LAB_EPSILON {
        cube
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

/// Convert one RGB pixel to 8-bit CIE LAB.
pub fn rgb_to_lab_pixel(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| srgb_to_linear(c as f32 / 255.0));

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > LAB_EPSILON {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (fx - fy) + 128.0;
    let bb = 200.0 * (fy - fz) + 128.0;

    [l * 255.0 / 100.0, a, bb].map(|c| c.round().clamp(0.0, 255.0) as u8)
}

/// Convert one 8-bit CIE LAB pixel back to RGB.
pub fn lab_to_rgb_pixel(lab: [u8; 3]) -> [u8; 3] {
    let l = lab[0] as f32 * 100.0 / 255.0;
    let a = lab[1] as f32 - 128.0;
    let b = lab[2] as f32 - 128.0;

    let y = if l > 903.3 * LAB_EPSILON {
        ((l + 16.0) / 116.0).powi(3)
    } else {
        l / 903.3
    };
    let fy = lab_f(y);
    let x = lab_f_inv(a / 500.0 + fy) * WHITE_X;
    let z = lab_f_inv(fy - b / 200.0) * WHITE_Z;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_992 * y + 0.041_556 * z;
    let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    [r, g, bl].map(|c| (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0).round().clamp(0.0, 255.0) as u8)
}

/// Convert an RGB image to 8-bit CIE LAB.
pub fn rgb_to_lab(image: &RgbImage) -> RgbImage {
    map_pixels(image, rgb_to_lab_pixel)
}

/// Convert an 8-bit CIE LAB image back to RGB.
pub fn lab_to_rgb(image: &RgbImage) -> RgbImage {
    map_pixels(image, lab_to_rgb_pixel)
}

/// Per-channel mean of an image. Returns zeros for an empty image.
pub fn channel_means(image: &RgbImage) -> [f64; 3] {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return [0.0; 3];
    }

    let mut sums = [0u64; 3];
    for p in image.pixels() {
        for (sum, &c) in sums.iter_mut().zip(p.0.iter()) {
            *sum += c as u64;
        }
    }
    sums.map(|s| s as f64 / count as f64)
}

fn map_pixels(image: &RgbImage, f: impl Fn([u8; 3]) -> [u8; 3]) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        *dst = Rgb(f(src.0));
    }
    out
}
