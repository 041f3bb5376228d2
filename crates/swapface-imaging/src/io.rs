//! Image loading, saving and geometry helpers.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

/// Default upper bound for [`resize_image`].
pub const DEFAULT_MAX_SIZE: u32 = 1920;

/// Default JPEG quality used when saving results.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: String,
        source: image::ImageError,
    },
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Load an image from disk as 8-bit RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, ImagingError> {
    if !path.exists() {
        return Err(ImagingError::NotFound(path.display().to_string()));
    }

    let img = image::open(path).map_err(|source| ImagingError::Decode {
        path: path.display().to_string(),
        source,
    })?;

    let rgb = img.to_rgb8();
    tracing::debug!(
        path = %path.display(),
        width = rgb.width(),
        height = rgb.height(),
        "loaded image"
    );
    Ok(rgb)
}

/// Save an image, choosing the encoder from the file extension.
///
/// JPEG honors `quality` directly. PNG derives a compression level of
/// `min(9, 100 - quality / 10)` and maps it onto the encoder presets.
/// Parent directories are created when missing.
pub fn save_image(image: &RgbImage, path: &Path, quality: u8) -> Result<(), ImagingError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let encode_err = |source| ImagingError::Encode {
        path: path.display().to_string(),
        source,
    };

    match ext.as_str() {
        "jpg" | "jpeg" => {
            let writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            image.write_with_encoder(encoder).map_err(encode_err)?;
        }
        "png" => {
            let writer = BufWriter::new(File::create(path)?);
            let encoder = PngEncoder::new_with_quality(
                writer,
                png_compression(quality),
                PngFilter::Adaptive,
            );
            image.write_with_encoder(encoder).map_err(encode_err)?;
        }
        _ => image.save(path).map_err(encode_err)?,
    }

    tracing::debug!(path = %path.display(), quality, "saved image");
    Ok(())
}

/// Map a 0–100 quality value to a PNG compression preset.
fn png_compression(quality: u8) -> CompressionType {
    let level = 9u8.min(100 - quality.min(100) / 10);
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Downscale so neither side exceeds `max_size`, preserving aspect ratio.
///
/// Images already within bounds are returned unchanged (as a copy).
pub fn resize_image(image: &RgbImage, max_size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if max_size == 0 || (w <= max_size && h <= max_size) {
        return image.clone();
    }

    let scale = (max_size as f64 / w as f64).min(max_size as f64 / h as f64);
    let new_w = ((w as f64 * scale) as u32).clamp(1, max_size);
    let new_h = ((h as f64 * scale) as u32).clamp(1, max_size);

    image::imageops::resize(image, new_w, new_h, FilterType::Lanczos3)
}

/// Pack an RGB image into an interleaved BGR byte buffer.
pub fn to_bgr(image: &RgbImage) -> Vec<u8> {
    image
        .pixels()
        .flat_map(|p| [p[2], p[1], p[0]])
        .collect()
}

/// Rebuild an RGB image from an interleaved BGR byte buffer.
pub fn from_bgr(data: &[u8], width: u32, height: u32) -> Result<RgbImage, ImagingError> {
    let expected = width as usize * height as usize * 3;
    if data.len() != expected {
        return Err(ImagingError::InvalidLength {
            expected,
            actual: data.len(),
        });
    }

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let i = (y as usize * width as usize + x as usize) * 3;
        Rgb([data[i + 2], data[i + 1], data[i]])
    }))
}

/// Place `original` and `result` side by side with a red separator.
pub fn side_by_side(original: &RgbImage, result: &RgbImage) -> RgbImage {
    let (w1, h1) = original.dimensions();
    let (w2, h2) = result.dimensions();
    let mut canvas = RgbImage::new(w1 + w2, h1.max(h2));

    image::imageops::replace(&mut canvas, original, 0, 0);
    image::imageops::replace(&mut canvas, result, w1 as i64, 0);

    for y in 0..canvas.height() {
        for x in w1.saturating_sub(1)..(w1 + 1).min(canvas.width()) {
            canvas.put_pixel(x, y, Rgb([255, 0, 0]));
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]))
    }

    #[test]
    fn test_resize_never_exceeds_max() {
        for &(w, h) in &[(2000u32, 1000u32), (1000, 2000), (801, 799), (3000, 7)] {
            let out = resize_image(&RgbImage::new(w, h), 800);
            assert!(out.width() <= 800 && out.height() <= 800, "{w}x{h} -> {:?}", out.dimensions());
        }
    }

    #[test]
    fn test_resize_preserves_aspect() {
        let img = RgbImage::new(1000, 2000);
        let out = resize_image(&img, 800);
        let orig_ratio = 2000.0 / 1000.0;
        let new_ratio = out.height() as f64 / out.width() as f64;
        assert!((orig_ratio - new_ratio).abs() < 0.01, "ratio {new_ratio}");
    }

    #[test]
    fn test_resize_small_image_untouched() {
        let img = gradient(64, 32);
        let out = resize_image(&img, DEFAULT_MAX_SIZE);
        assert_eq!(out, img);
    }

    #[test]
    fn test_bgr_roundtrip() {
        let img = gradient(40, 30);
        let bgr = to_bgr(&img);
        assert_eq!(&bgr[0..3], &[77, 0, 0]);
        let back = from_bgr(&bgr, 40, 30).unwrap();

        let total: u64 = img
            .as_raw()
            .iter()
            .zip(back.as_raw().iter())
            .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as u64)
            .sum();
        let avg = total as f64 / img.as_raw().len() as f64;
        assert!(avg < 1.0, "average difference {avg}");
    }

    #[test]
    fn test_from_bgr_rejects_short_buffer() {
        assert!(matches!(
            from_bgr(&[0u8; 5], 2, 1),
            Err(ImagingError::InvalidLength { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_png_compression_mapping() {
        assert_eq!(png_compression(95), CompressionType::Best);
        assert_eq!(png_compression(100), CompressionType::Best);
        assert_eq!(png_compression(0), CompressionType::Best);
    }

    #[test]
    fn test_save_and_load_png_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.png");
        let img = gradient(16, 16);
        save_image(&img, &path, DEFAULT_JPEG_QUALITY).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_save_jpeg_writes_jpeg_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        save_image(&gradient(16, 16), &path, 80).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_image(Path::new("/nonexistent/face.png"));
        assert!(matches!(result, Err(ImagingError::NotFound(_))));
    }

    #[test]
    fn test_side_by_side_dimensions() {
        let a = RgbImage::new(10, 20);
        let b = RgbImage::new(30, 5);
        let out = side_by_side(&a, &b);
        assert_eq!(out.dimensions(), (40, 20));
        assert_eq!(out.get_pixel(10, 0), &Rgb([255, 0, 0]));
    }
}
