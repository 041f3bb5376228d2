//! swapface-core — Face location and face swap.
//!
//! Uses SCRFD for face detection, ArcFace for identity embeddings and
//! InSwapper for the generative swap, all running via ONNX Runtime for CPU
//! inference. A SeetaFace cascade supplies fast, approximate face regions
//! for cosmetic filters.

pub mod alignment;
pub mod capability;
pub mod cascade;
pub mod detector;
pub mod face_ops;
pub mod locator;
pub mod recognizer;
pub mod swapper;
pub mod types;

pub use capability::{FaceLocator, RegionDetector, SwapEngine, SwapError};
pub use cascade::CascadeRegionDetector;
pub use locator::{InsightLocator, LocatorError};
pub use swapper::InSwapper;
pub use types::{largest, sort_left_to_right, BoundingBox, Embedding, Face, Region};
