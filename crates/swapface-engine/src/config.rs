use std::path::{Path, PathBuf};
use std::time::Duration;
use swapface_models::manifest::{self, ModelSpec};
use swapface_models::ProvisionOptions;

/// Embedding map sidecar for the swap model, looked up next to it.
const SWAP_EMAP_FILE: &str = "inswapper_128.emap";

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing model files.
    pub model_dir: PathBuf,
    /// Pool of selectable input images.
    pub data_dir: PathBuf,
    /// Where results are written.
    pub output_dir: PathBuf,
    /// Skip TLS certificate validation when downloading models.
    pub insecure_tls: bool,
    /// Deadline in seconds for a model download.
    pub download_timeout_secs: u64,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// JPEG quality for saved results; PNG compression is derived from it.
    pub jpeg_quality: u8,
}

impl Config {
    /// Load configuration from `SWAPFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let base_dir = std::env::var("SWAPFACE_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let dir = |key: &str, name: &str| {
            std::env::var(key)
                .map(PathBuf::from)
                .unwrap_or_else(|_| base_dir.join(name))
        };

        Self {
            model_dir: dir("SWAPFACE_MODEL_DIR", "models"),
            data_dir: dir("SWAPFACE_DATA_DIR", "data"),
            output_dir: dir("SWAPFACE_OUTPUT_DIR", "output"),
            insecure_tls: std::env::var("SWAPFACE_INSECURE_TLS")
                .map(|v| v != "0" && !v.is_empty())
                .unwrap_or(false),
            download_timeout_secs: env_u64("SWAPFACE_DOWNLOAD_TIMEOUT_SECS", 300),
            intra_threads: env_usize("SWAPFACE_INTRA_THREADS", 2).max(1),
            jpeg_quality: env_u8("SWAPFACE_JPEG_QUALITY", 95).clamp(1, 100),
        }
    }

    /// Defaults rooted at `base_dir`, ignoring the environment.
    pub fn with_base_dir(base_dir: &Path) -> Self {
        Self {
            model_dir: base_dir.join("models"),
            data_dir: base_dir.join("data"),
            output_dir: base_dir.join("output"),
            insecure_tls: false,
            download_timeout_secs: 300,
            intra_threads: 2,
            jpeg_quality: 95,
        }
    }

    pub fn provision_options(&self) -> ProvisionOptions {
        ProvisionOptions {
            insecure_tls: self.insecure_tls,
            timeout: Duration::from_secs(self.download_timeout_secs),
        }
    }

    /// Path of a manifest model inside the model directory.
    ///
    /// Unknown names fall back to the name itself as the file name.
    pub fn model_path(&self, name: &str) -> PathBuf {
        match manifest::lookup_model(name) {
            Some(spec) => swapface_models::model_path(spec, &self.model_dir),
            None => self.model_dir.join(name),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_path(manifest::DETECTOR_MODEL)
    }

    /// Path to the ArcFace recognition model.
    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_path(manifest::RECOGNIZER_MODEL)
    }

    /// Path to the swap model.
    pub fn swap_model_path(&self) -> PathBuf {
        self.model_path(manifest::SWAP_MODEL)
    }

    /// Path to the swap model's optional embedding map.
    pub fn swap_emap_path(&self) -> PathBuf {
        self.model_dir.join(SWAP_EMAP_FILE)
    }

    /// Path to the cascade model used for cosmetic face regions.
    pub fn cascade_model_path(&self) -> PathBuf {
        self.model_path(manifest::CASCADE_MODEL)
    }

    /// Manifest entries the pipeline loads.
    pub fn pipeline_models(&self) -> Vec<&'static ModelSpec> {
        [
            manifest::SWAP_MODEL,
            manifest::DETECTOR_MODEL,
            manifest::RECOGNIZER_MODEL,
            manifest::CASCADE_MODEL,
        ]
        .into_iter()
        .filter_map(manifest::lookup_model)
        .collect()
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u8(key: &str, default: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_dir_layout() {
        let c = Config::with_base_dir(Path::new("/srv/swap"));
        assert_eq!(c.model_dir, PathBuf::from("/srv/swap/models"));
        assert_eq!(c.data_dir, PathBuf::from("/srv/swap/data"));
        assert_eq!(c.output_dir, PathBuf::from("/srv/swap/output"));
        assert!(!c.insecure_tls);
    }

    #[test]
    fn test_model_paths_follow_manifest() {
        let c = Config::with_base_dir(Path::new("/srv/swap"));
        assert_eq!(c.swap_model_path(), PathBuf::from("/srv/swap/models/inswapper_128.onnx"));
        assert_eq!(c.detector_model_path(), PathBuf::from("/srv/swap/models/det_10g.onnx"));
        assert_eq!(c.recognizer_model_path(), PathBuf::from("/srv/swap/models/w600k_r50.onnx"));
        assert_eq!(c.pipeline_models().len(), 4);
    }

    #[test]
    fn test_provision_options() {
        let mut c = Config::with_base_dir(Path::new("/tmp"));
        c.download_timeout_secs = 7;
        let o = c.provision_options();
        assert_eq!(o.timeout, Duration::from_secs(7));
        assert!(!o.insecure_tls);
    }
}
