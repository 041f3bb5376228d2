//! Model Provisioner: make sure a model file exists locally.
//!
//! An existing file is accepted without touching the network. Otherwise the
//! file is streamed from the manifest URL into a `.part` file next to the
//! destination and renamed into place once complete, so an interrupted
//! download never leaves a truncated model behind.

use crate::manifest::ModelSpec;
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("swapface/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("model {0} not found — no download URL is known, place it in models/")]
    NoUrl(String),
    #[error("HTTP {status}: {url}")]
    Status { status: u16, url: String },
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    Checksum {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Download behaviour.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Skip TLS certificate validation. Off unless explicitly configured.
    pub insecure_tls: bool,
    /// Deadline for the whole request, body included.
    pub timeout: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            insecure_tls: false,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

/// Path of `spec` inside `model_dir`.
pub fn model_path(spec: &ModelSpec, model_dir: &Path) -> PathBuf {
    model_dir.join(&spec.file_name)
}

/// Ensure the model is present, downloading it if needed.
///
/// Returns the model path.
pub async fn try_ensure_model(
    spec: &ModelSpec,
    model_dir: &Path,
    options: &ProvisionOptions,
) -> Result<PathBuf, ProvisionError> {
    let path = model_path(spec, model_dir);
    if path.exists() {
        tracing::debug!(path = %path.display(), "model already present");
        return Ok(path);
    }

    let url = spec.url.as_deref().ok_or_else(|| ProvisionError::NoUrl(spec.file_name.clone()))?;
    tokio::fs::create_dir_all(model_dir).await?;

    tracing::info!(model = %spec.name, %url, "downloading model");
    let partial = path.with_extension("part");
    match download(url, &partial, options).await {
        Ok(digest) => {
            if let Some(expected) = &spec.sha256 {
                if !expected.eq_ignore_ascii_case(&digest) {
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(ProvisionError::Checksum {
                        file: spec.file_name.clone(),
                        expected: expected.clone(),
                        actual: digest,
                    });
                }
            }
            tokio::fs::rename(&partial, &path).await?;
            tracing::info!(path = %path.display(), "model downloaded");
            Ok(path)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

/// Boolean form of [`try_ensure_model`]: failures are logged, never raised.
pub async fn ensure_model(spec: &ModelSpec, model_dir: &Path, options: &ProvisionOptions) -> bool {
    match try_ensure_model(spec, model_dir, options).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(model = %spec.name, error = %e, "model provisioning failed");
            false
        }
    }
}

/// Stream `url` into `dest`, returning the hex SHA-256 of the body.
async fn download(url: &str, dest: &Path, options: &ProvisionOptions) -> Result<String, ProvisionError> {
    if options.insecure_tls {
        tracing::warn!("TLS certificate validation disabled for model download");
    }
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(options.timeout)
        .danger_accept_invalid_certs(options.insecure_tls)
        .build()?;

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ProvisionError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let mut file = TokioFile::create(dest).await?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;
    tracing::debug!(bytes = downloaded, "download finished");

    Ok(format!("{:x}", hasher.finalize()))
}
