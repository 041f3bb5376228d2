//! Accurate identity face location: SCRFD detection plus ArcFace embeddings.

use crate::capability::FaceLocator;
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{sort_left_to_right, Face};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// [`FaceLocator`] that detects with SCRFD and attaches ArcFace embeddings.
pub struct InsightLocator {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl InsightLocator {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer) -> Self {
        Self { detector, recognizer }
    }

    /// Load both models.
    pub fn load(detector_path: &Path, recognizer_path: &Path, intra_threads: usize) -> Result<Self, LocatorError> {
        let detector = FaceDetector::load(detector_path, intra_threads)?;
        let recognizer = FaceRecognizer::load(recognizer_path, intra_threads)?;
        Ok(Self::new(detector, recognizer))
    }

    /// Detection and embedding, with errors surfaced.
    pub fn try_detect(&mut self, image: &RgbImage) -> Result<Vec<Face>, LocatorError> {
        let mut faces = self.detector.detect(image)?;

        for face in &mut faces {
            match self.recognizer.extract(image, face) {
                Ok(embedding) => face.embedding = Some(embedding),
                Err(e) => tracing::warn!(error = %e, "embedding extraction failed for face"),
            }
        }

        sort_left_to_right(&mut faces);
        tracing::info!(count = faces.len(), "faces located");
        Ok(faces)
    }
}

impl FaceLocator for InsightLocator {
    fn detect(&mut self, image: &RgbImage) -> Vec<Face> {
        self.try_detect(image).unwrap_or_else(|e| {
            tracing::error!(error = %e, "face detection failed");
            Vec::new()
        })
    }
}
