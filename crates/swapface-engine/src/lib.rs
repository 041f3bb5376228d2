//! swapface-engine — Configuration, enhancement and orchestration.
//!
//! Wires the capabilities from `swapface-core` into the fixed
//! load → locate → swap → enhance → save pipeline and runs it on a
//! background worker.

pub mod config;
pub mod enhance;
pub mod layout;
pub mod pipeline;
pub mod quality;
pub mod worker;

pub use config::Config;
pub use enhance::{ColorReference, Enhancer};
pub use pipeline::{Pipeline, PipelineError, PipelineRequest, PipelineResult};
pub use quality::QualityLevel;
pub use worker::{JobHandle, LogSink, ProgressSink, Worker, WorkerError};
