//! Capability interfaces for the inference-backed stages.
//!
//! The accurate identity detector ([`FaceLocator`]) and the fast cosmetic
//! detector ([`RegionDetector`]) are separate interfaces with different
//! accuracy/latency tradeoffs. [`SwapEngine`] wraps the generative model.

use crate::types::{Face, Region};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("model file not found: {0} — run provisioning or place it in models/")]
    ModelNotFound(String),
    #[error("invalid embedding map {path}: {reason}")]
    InvalidEmap { path: String, reason: String },
    #[error("target face has no landmarks — the locator must return landmarks for alignment")]
    NoLandmarks,
    #[error("source face has no embedding — the locator must run the recognizer")]
    NoEmbedding,
    #[error("embedding dimension {actual} does not match the model latent size {expected}")]
    LatentMismatch { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Accurate face detection for identity transfer.
pub trait FaceLocator: Send {
    /// Detect faces, sorted ascending by bounding-box left edge.
    ///
    /// An empty image yields an empty list. Inference failures are logged and
    /// also yield an empty list.
    fn detect(&mut self, image: &RgbImage) -> Vec<Face>;
}

/// Fast, lower-accuracy face boxes used to guide cosmetic filters.
pub trait RegionDetector: Send {
    /// Face rectangles clamped to the image. Empty when nothing is found.
    fn regions(&self, image: &RgbImage) -> Vec<Region>;
}

/// Generative face swap.
pub trait SwapEngine: Send {
    /// Composite `source_face`'s identity onto `target_face` in `target`.
    ///
    /// The returned image has the dimensions of `target`.
    fn try_swap(
        &mut self,
        target: &RgbImage,
        target_face: &Face,
        source: &RgbImage,
        source_face: &Face,
    ) -> Result<RgbImage, SwapError>;

    /// Like [`try_swap`](Self::try_swap), but any failure yields a copy of
    /// `target` unchanged.
    fn swap(
        &mut self,
        target: &RgbImage,
        target_face: &Face,
        source: &RgbImage,
        source_face: &Face,
    ) -> RgbImage {
        match self.try_swap(target, target_face, source, source_face) {
            Ok(result) => {
                tracing::info!("face swap completed");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "face swap failed; keeping original target");
                target.clone()
            }
        }
    }

    /// Apply `source_face` to every face in `target_faces`, in list order.
    ///
    /// Each swap composites onto the previous result, so overlapping faces
    /// see earlier swaps. Any failure yields a copy of `target` unchanged.
    fn swap_all(
        &mut self,
        target: &RgbImage,
        target_faces: &[Face],
        source: &RgbImage,
        source_face: &Face,
    ) -> RgbImage {
        tracing::info!(count = target_faces.len(), "swapping multiple faces");
        let mut result = target.clone();
        for face in target_faces {
            match self.try_swap(&result, face, source, source_face) {
                Ok(next) => result = next,
                Err(e) => {
                    tracing::warn!(error = %e, "multi-face swap failed; keeping original target");
                    return target.clone();
                }
            }
        }
        result
    }
}
