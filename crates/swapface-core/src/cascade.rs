//! Fast cosmetic face regions backed by the SeetaFace cascade (`rustface`).
//!
//! Lower accuracy than the SCRFD locator but cheap enough to run on every
//! enhancement pass. A missing model file disables the detector: it then
//! reports no regions and the face-guided enhancement stages become no-ops.

use crate::capability::RegionDetector;
use crate::types::Region;
use image::RgbImage;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

const CASCADE_MIN_FACE_SIZE: u32 = 20;
const CASCADE_SCORE_THRESHOLD: f64 = 2.0;
const CASCADE_PYRAMID_SCALE: f32 = 0.8;
const CASCADE_WINDOW_STEP: u32 = 4;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("failed to read cascade model {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// [`RegionDetector`] over the SeetaFace frontal cascade.
pub struct CascadeRegionDetector {
    model: Option<rustface::Model>,
}

impl CascadeRegionDetector {
    /// Load the cascade model from disk.
    pub fn load(model_path: &Path) -> Result<Self, CascadeError> {
        let read_err = |source| CascadeError::Read {
            path: model_path.display().to_string(),
            source,
        };
        let file = std::fs::File::open(model_path).map_err(read_err)?;
        let model = rustface::read_model(BufReader::new(file)).map_err(read_err)?;
        tracing::info!(path = %model_path.display(), "loaded SeetaFace cascade model");
        Ok(Self { model: Some(model) })
    }

    /// Load the model if present, otherwise fall back to [`disabled`](Self::disabled).
    pub fn load_or_disabled(model_path: &Path) -> Self {
        match Self::load(model_path) {
            Ok(detector) => detector,
            Err(e) => {
                tracing::warn!(error = %e, "cascade detector unavailable; face-guided enhancement disabled");
                Self::disabled()
            }
        }
    }

    /// A detector that never finds anything.
    pub fn disabled() -> Self {
        Self { model: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }
}

impl RegionDetector for CascadeRegionDetector {
    fn regions(&self, image: &RgbImage) -> Vec<Region> {
        let Some(model) = &self.model else {
            return Vec::new();
        };
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let gray = image::imageops::grayscale(image);

        let mut detector = rustface::create_detector_with_model(model.clone());
        detector.set_min_face_size(CASCADE_MIN_FACE_SIZE);
        detector.set_score_thresh(CASCADE_SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(CASCADE_PYRAMID_SCALE);
        detector.set_slide_window_step(CASCADE_WINDOW_STEP, CASCADE_WINDOW_STEP);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));
        tracing::debug!(count = faces.len(), "cascade regions");

        faces
            .iter()
            .filter_map(|face| {
                let b = face.bbox();
                Region::clamped(
                    b.x() as i64,
                    b.y() as i64,
                    b.width() as i64,
                    b.height() as i64,
                    width,
                    height,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_disabled_finds_nothing() {
        let detector = CascadeRegionDetector::disabled();
        assert!(!detector.is_enabled());
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 180, 160]));
        assert!(detector.regions(&img).is_empty());
    }

    #[test]
    fn test_missing_model_falls_back_to_disabled() {
        let detector = CascadeRegionDetector::load_or_disabled(Path::new("/nonexistent/seeta.bin"));
        assert!(!detector.is_enabled());
        assert!(matches!(
            CascadeRegionDetector::load(Path::new("/nonexistent/seeta.bin")),
            Err(CascadeError::Read { .. })
        ));
    }
}
