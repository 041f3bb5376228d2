//! swapface-imaging — Image I/O and pixel-level processing.
//!
//! Provides loading/saving with format-specific options, aspect-preserving
//! resize, HSV and CIE LAB conversions, CLAHE, and the filter primitives
//! used by the enhancement pipeline.

pub mod clahe;
pub mod color;
pub mod filters;
pub mod io;

pub use io::{load_image, resize_image, save_image, ImagingError};
