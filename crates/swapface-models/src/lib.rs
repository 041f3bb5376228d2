//! swapface-models — Model manifest and provisioning.
//!
//! The manifest is embedded at compile time; the provisioner fetches
//! missing files over HTTPS with a deadline.

pub mod manifest;
pub mod provision;

pub use manifest::{list_models, lookup_model, ModelSpec};
pub use provision::{ensure_model, model_path, try_ensure_model, ProvisionError, ProvisionOptions};
