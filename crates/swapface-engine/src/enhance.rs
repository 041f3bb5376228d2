//! Enhancement Pipeline: fixed, ordered cosmetic filter stages.
//!
//! Every stage is a pure `&RgbImage -> RgbImage` function. Face-guided
//! stages ask the [`RegionDetector`] for face boxes and return their input
//! unchanged when there are none.

use crate::quality::QualityLevel;
use image::{Rgb, RgbImage};
use swapface_core::{Region, RegionDetector};
use swapface_imaging::clahe::clahe;
use swapface_imaging::color::{
    channel_means, hsv_to_rgb_pixel, lab_to_rgb, rgb_to_hsv_pixel, rgb_to_lab,
};
use swapface_imaging::filters::{self, SHARPEN_KERNEL};

const BASIC_SHARPNESS: f32 = 1.3;
const BASIC_CONTRAST: f32 = 1.1;
const BASIC_COLOR: f32 = 1.1;

const SKIN_BILATERAL_DIAMETER: u32 = 9;
const SKIN_BILATERAL_SIGMA: f32 = 75.0;
/// Sigma of a 5×5 Gaussian kernel.
const SKIN_BLUR_SIGMA: f32 = 1.1;

/// Eye band as fractions of the face height: start, extent.
const EYE_BAND: (f32, f32) = (0.20, 0.25);
const LIP_BAND: (f32, f32) = (0.60, 0.25);
const EYE_SATURATION_BOOST: u8 = 10;
const LIP_SATURATION_BOOST: u8 = 20;

/// Weight of the corrected value in color matching; the rest is the original.
const COLOR_MATCH_WEIGHT: f64 = 0.7;

const HDR_CLAHE_CLIP: f32 = 2.0;
const HDR_CLAHE_GRID: u32 = 8;
const HDR_SATURATION_BOOST: u8 = 10;

/// Images the Ultra-HD color matching compares against.
pub struct ColorReference<'a> {
    pub target: &'a RgbImage,
    pub source: &'a RgbImage,
}

pub struct Enhancer {
    regions: Box<dyn RegionDetector>,
}

impl Enhancer {
    pub fn new(regions: Box<dyn RegionDetector>) -> Self {
        Self { regions }
    }

    /// Level 1: sharpness +30%, contrast +10%, color +10%.
    pub fn basic(&self, image: &RgbImage) -> RgbImage {
        tracing::info!("applying basic enhancement");
        let out = filters::sharpness(image, BASIC_SHARPNESS);
        let out = filters::contrast(&out, BASIC_CONTRAST);
        filters::color(&out, BASIC_COLOR)
    }

    /// Bilateral smoothing, light blur and detail kernel over each face region.
    pub fn skin(&self, image: &RgbImage) -> RgbImage {
        let faces = self.regions.regions(image);
        if faces.is_empty() {
            return image.clone();
        }
        tracing::info!(faces = faces.len(), "smoothing skin");

        let mut out = image.clone();
        for r in faces {
            let roi = image::imageops::crop_imm(&out, r.x, r.y, r.width, r.height).to_image();
            let roi = filters::bilateral(&roi, SKIN_BILATERAL_DIAMETER, SKIN_BILATERAL_SIGMA, SKIN_BILATERAL_SIGMA);
            let roi = filters::gaussian_blur(&roi, SKIN_BLUR_SIGMA);
            let roi = filters::convolve3x3(&roi, &SHARPEN_KERNEL);
            image::imageops::replace(&mut out, &roi, r.x as i64, r.y as i64);
        }
        out
    }

    /// HSV saturation boost in the eye and lip bands of each face region.
    pub fn facial_features(&self, image: &RgbImage) -> RgbImage {
        let faces = self.regions.regions(image);
        if faces.is_empty() {
            return image.clone();
        }
        tracing::info!(faces = faces.len(), "enhancing facial features");

        let mut out = image.clone();
        for r in &faces {
            boost_band(&mut out, r, EYE_BAND, EYE_SATURATION_BOOST);
            boost_band(&mut out, r, LIP_BAND, LIP_SATURATION_BOOST);
        }
        out
    }

    /// Scale each channel toward the target/source mean ratio.
    ///
    /// The applied factor is `ratio * 0.7 + 0.3`; a zero source mean uses ratio 1.
    pub fn color_correction(&self, image: &RgbImage, reference: &ColorReference<'_>) -> RgbImage {
        tracing::info!("applying color correction");
        let source = channel_means(reference.source);
        let target = channel_means(reference.target);
        let factors: [f64; 3] = std::array::from_fn(|c| {
            let ratio = if source[c] > 0.0 { target[c] / source[c] } else { 1.0 };
            ratio * COLOR_MATCH_WEIGHT + (1.0 - COLOR_MATCH_WEIGHT)
        });

        let mut out = image.clone();
        for p in out.pixels_mut() {
            for c in 0..3 {
                p[c] = (p[c] as f64 * factors[c]).round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }

    /// CLAHE on LAB lightness, then a flat saturation boost.
    pub fn hdr(&self, image: &RgbImage) -> RgbImage {
        tracing::info!("applying HDR effect");
        let (w, h) = image.dimensions();
        let mut lab = rgb_to_lab(image);

        let mut lightness: Vec<u8> = lab.pixels().map(|p| p[0]).collect();
        clahe(&mut lightness, w, h, HDR_CLAHE_GRID, HDR_CLAHE_CLIP);
        for (p, l) in lab.pixels_mut().zip(lightness) {
            p[0] = l;
        }

        let mut out = lab_to_rgb(&lab);
        for p in out.pixels_mut() {
            *p = saturate(p, HDR_SATURATION_BOOST);
        }
        out
    }

    /// Run every stage of `level` in order.
    ///
    /// Color matching runs only at Ultra-HD and only with a reference.
    pub fn apply(&self, image: &RgbImage, level: QualityLevel, reference: Option<&ColorReference<'_>>) -> RgbImage {
        tracing::info!(level = level.level(), "applying enhancements");
        let mut out = self.basic(image);

        if level >= QualityLevel::Hd {
            out = self.skin(&out);
            out = self.facial_features(&out);
        }

        if level >= QualityLevel::UltraHd {
            if let Some(reference) = reference {
                out = self.color_correction(&out, reference);
            }
            out = self.hdr(&out);
        }

        out
    }
}

/// Add `amount` to the HSV saturation of one pixel, saturating at 255.
fn saturate(p: &Rgb<u8>, amount: u8) -> Rgb<u8> {
    let mut hsv = rgb_to_hsv_pixel(p.0);
    hsv[1] = hsv[1].saturating_add(amount);
    Rgb(hsv_to_rgb_pixel(hsv))
}

/// Boost saturation in the horizontal band `(start, extent)` of `face`, clamped to the image.
fn boost_band(image: &mut RgbImage, face: &Region, band: (f32, f32), amount: u8) {
    let (w, h) = image.dimensions();
    if h == 0 {
        return;
    }
    let band_y = (face.y + (face.height as f32 * band.0) as u32).min(h - 1);
    let band_h = ((face.height as f32 * band.1) as u32).clamp(1, h - band_y);
    let x_end = (face.x + face.width).min(w);

    for y in band_y..band_y + band_h {
        for x in face.x..x_end {
            let p = *image.get_pixel(x, y);
            image.put_pixel(x, y, saturate(&p, amount));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRegions(Vec<Region>);

    impl RegionDetector for FixedRegions {
        fn regions(&self, _image: &RgbImage) -> Vec<Region> {
            self.0.clone()
        }
    }

    fn enhancer(regions: Vec<Region>) -> Enhancer {
        Enhancer::new(Box::new(FixedRegions(regions)))
    }

    fn gradient() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, (y * 4) as u8, 120]))
    }

    #[test]
    fn test_basic_preserves_dimensions() {
        let img = gradient();
        let out = enhancer(vec![]).basic(&img);
        assert_eq!(out.dimensions(), img.dimensions());
    }

    #[test]
    fn test_face_stages_noop_without_regions() {
        let e = enhancer(vec![]);
        let img = gradient();
        assert_eq!(e.skin(&img), img);
        assert_eq!(e.facial_features(&img), img);
    }

    #[test]
    fn test_skin_only_touches_region() {
        let region = Region { x: 8, y: 8, width: 16, height: 16 };
        let img = RgbImage::from_fn(64, 48, |x, y| {
            let v = if (x + y) % 2 == 0 { 90 } else { 150 };
            Rgb([v, v, v])
        });
        let out = enhancer(vec![region]).skin(&img);
        assert_eq!(out.get_pixel(40, 40), img.get_pixel(40, 40));
        let changed = (8..24).any(|y| (8..24).any(|x| out.get_pixel(x, y) != img.get_pixel(x, y)));
        assert!(changed);
    }

    #[test]
    fn test_facial_features_bands() {
        let region = Region { x: 0, y: 0, width: 20, height: 100 };
        let img = RgbImage::from_pixel(20, 100, Rgb([150, 100, 100]));
        let out = enhancer(vec![region]).facial_features(&img);

        let sat = |p: &Rgb<u8>| rgb_to_hsv_pixel(p.0)[1] as i32;
        let base = sat(img.get_pixel(5, 0));
        assert_eq!(out.get_pixel(5, 10), img.get_pixel(5, 10)); // above eyes
        assert!((sat(out.get_pixel(5, 30)) - base - 10).abs() <= 2); // eyes
        assert_eq!(out.get_pixel(5, 50), img.get_pixel(5, 50)); // between
        assert!((sat(out.get_pixel(5, 70)) - base - 20).abs() <= 2); // lips
        assert_eq!(out.get_pixel(5, 95), img.get_pixel(5, 95)); // chin
    }

    #[test]
    fn test_facial_features_band_clamped_to_image() {
        // Region hangs off the bottom: lip band starts past the last row.
        let region = Region { x: 0, y: 30, width: 10, height: 100 };
        let img = RgbImage::from_pixel(10, 40, Rgb([150, 100, 100]));
        let out = enhancer(vec![region]).facial_features(&img);
        assert_eq!(out.dimensions(), (10, 40));
    }

    #[test]
    fn test_color_correction() {
        let e = enhancer(vec![]);
        let target = RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]));
        let source = RgbImage::from_pixel(4, 4, Rgb([100, 100, 0]));
        let img = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let out = e.color_correction(&img, &ColorReference { target: &target, source: &source });
        // R ratio 2 → factor 1.7; G ratio 1 → 1.0; B source mean 0 → ratio 1 → 1.0
        assert_eq!(out.get_pixel(0, 0), &Rgb([170, 100, 100]));
    }

    #[test]
    fn test_color_correction_clamps() {
        let e = enhancer(vec![]);
        let target = RgbImage::from_pixel(2, 2, Rgb([250, 250, 250]));
        let source = RgbImage::from_pixel(2, 2, Rgb([10, 10, 10]));
        let img = RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]));
        let out = e.color_correction(&img, &ColorReference { target: &target, source: &source });
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_hdr_preserves_dimensions() {
        let img = RgbImage::from_pixel(32, 24, Rgb([128, 128, 128]));
        let out = enhancer(vec![]).hdr(&img);
        assert_eq!(out.dimensions(), (32, 24));
    }

    /// Low-contrast warm texture: every 16×16 CLAHE tile sees the full pattern.
    fn low_contrast_texture() -> RgbImage {
        RgbImage::from_fn(128, 128, |x, y| Rgb([140 + (x % 8) as u8, 100 + (y % 8) as u8, 80]))
    }

    fn lightness_stddev(image: &RgbImage) -> f64 {
        let lab = rgb_to_lab(image);
        let n = (lab.width() * lab.height()) as f64;
        let mean = lab.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
        (lab.pixels().map(|p| (p[0] as f64 - mean).powi(2)).sum::<f64>() / n).sqrt()
    }

    fn hue(p: &Rgb<u8>) -> i32 {
        rgb_to_hsv_pixel(p.0)[0] as i32
    }

    fn saturation(p: &Rgb<u8>) -> i32 {
        rgb_to_hsv_pixel(p.0)[1] as i32
    }

    #[test]
    fn test_hdr_raises_local_contrast() {
        let img = low_contrast_texture();
        let out = enhancer(vec![]).hdr(&img);
        let (before, after) = (lightness_stddev(&img), lightness_stddev(&out));
        assert!(after > before * 1.5, "lightness stddev {before:.2} -> {after:.2}");
    }

    #[test]
    fn test_hdr_keeps_hue() {
        let img = low_contrast_texture();
        let out = enhancer(vec![]).hdr(&img);
        let total: i32 = img.pixels().zip(out.pixels()).map(|(a, b)| (hue(a) - hue(b)).abs()).sum();
        let mean = total as f64 / (img.width() * img.height()) as f64;
        assert!(mean <= 4.0, "mean hue shift {mean:.2}");
    }

    #[test]
    fn test_hdr_boosts_saturation() {
        let img = RgbImage::from_pixel(128, 128, Rgb([150, 100, 80]));
        let out = enhancer(vec![]).hdr(&img);
        let (before, after) = (img.get_pixel(64, 64), out.get_pixel(64, 64));
        let gain = saturation(after) - saturation(before);
        assert!((4..=14).contains(&gain), "saturation gain {gain}");
        assert!((hue(after) - hue(before)).abs() <= 2);
    }

    #[test]
    fn test_apply_levels_preserve_dimensions() {
        let region = Region { x: 10, y: 10, width: 20, height: 20 };
        let e = enhancer(vec![region]);
        let img = gradient();
        let reference = ColorReference { target: &img, source: &img };
        for level in [QualityLevel::Basic, QualityLevel::Hd, QualityLevel::UltraHd] {
            let out = e.apply(&img, level, Some(&reference));
            assert_eq!(out.dimensions(), img.dimensions(), "{level}");
        }
    }

    #[test]
    fn test_apply_basic_ignores_regions() {
        let region = Region { x: 10, y: 10, width: 20, height: 20 };
        let img = gradient();
        assert_eq!(
            enhancer(vec![region]).apply(&img, QualityLevel::Basic, None),
            enhancer(vec![]).apply(&img, QualityLevel::Basic, None),
        );
    }
}
