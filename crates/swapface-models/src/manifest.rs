//! Model manifest.
//!
//! Lists every model file the application uses, where it lives under the
//! model directory and, when it can be fetched automatically, its download
//! URL. Manifest files are embedded at compile time from `contrib/models/*.toml`.

use serde::Deserialize;
use std::sync::OnceLock;

const MANIFEST_INSWAPPER: &str = include_str!("../../../contrib/models/inswapper_128.toml");
const MANIFEST_DET_10G: &str = include_str!("../../../contrib/models/det_10g.toml");
const MANIFEST_W600K_R50: &str = include_str!("../../../contrib/models/w600k_r50.toml");
const MANIFEST_SEETA: &str = include_str!("../../../contrib/models/seeta_fd_frontal.toml");

/// Manifest names of the models the pipeline loads.
pub const SWAP_MODEL: &str = "inswapper_128";
pub const DETECTOR_MODEL: &str = "det_10g";
pub const RECOGNIZER_MODEL: &str = "w600k_r50";
pub const CASCADE_MODEL: &str = "seeta_fd_frontal";

static MANIFEST: OnceLock<Vec<ModelSpec>> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct ManifestFile {
    model: ModelSpec,
}

/// One model entry from the `[model]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    /// File name relative to the model directory.
    pub file_name: String,
    /// Download location. Entries without one must be installed by hand.
    pub url: Option<String>,
    /// Lowercase hex SHA-256 of the file, checked after download when present.
    pub sha256: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Whether the pipeline refuses to start without this model.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

fn parse(src: &str) -> Result<ModelSpec, toml::de::Error> {
    toml::from_str::<ManifestFile>(src).map(|f| f.model)
}

fn manifest() -> &'static Vec<ModelSpec> {
    MANIFEST.get_or_init(|| {
        let mut db = Vec::new();
        for src in [MANIFEST_INSWAPPER, MANIFEST_DET_10G, MANIFEST_W600K_R50, MANIFEST_SEETA] {
            match parse(src) {
                Ok(spec) => db.push(spec),
                Err(e) => tracing::error!(error = %e, "bad model manifest TOML"),
            }
        }
        db
    })
}

/// Look up a model by manifest name.
pub fn lookup_model(name: &str) -> Option<&'static ModelSpec> {
    manifest().iter().find(|m| m.name == name)
}

/// All known models.
pub fn list_models() -> &'static [ModelSpec] {
    manifest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_manifest_parses() {
        assert_eq!(list_models().len(), 4);
        for name in [SWAP_MODEL, DETECTOR_MODEL, RECOGNIZER_MODEL, CASCADE_MODEL] {
            assert!(lookup_model(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_swap_model_is_downloadable() {
        let spec = lookup_model(SWAP_MODEL).unwrap();
        assert_eq!(spec.file_name, "inswapper_128.onnx");
        assert!(spec.url.as_deref().is_some_and(|u| u.starts_with("https://")));
        assert!(spec.required);
    }

    #[test]
    fn test_cascade_is_optional() {
        assert!(!lookup_model(CASCADE_MODEL).unwrap().required);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup_model("buffalo_xl").is_none());
    }

    #[test]
    fn test_parse_defaults() {
        let spec = parse("[model]\nname = \"x\"\nfile_name = \"x.onnx\"\n").unwrap();
        assert!(spec.url.is_none());
        assert!(spec.sha256.is_none());
        assert!(spec.required);
        assert!(spec.description.is_empty());
    }
}
