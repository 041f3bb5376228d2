//! On-disk layout: the model, data and output directories.

use crate::config::Config;
use crate::quality::QualityLevel;
use std::io;
use std::path::{Path, PathBuf};

/// Extensions accepted into the data pool (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Extension of pipeline results.
pub const OUTPUT_EXTENSION: &str = "png";

/// Create the model, data and output directories if missing.
pub fn ensure_layout(config: &Config) -> io::Result<()> {
    for dir in [&config.model_dir, &config.data_dir, &config.output_dir] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// File names of the images in `data_dir`, sorted.
///
/// The directory is created when missing, yielding an empty list.
pub fn list_images(data_dir: &Path) -> io::Result<Vec<String>> {
    std::fs::create_dir_all(data_dir)?;
    let mut names = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_supported_image(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Copy an external image into the data pool, returning its new path.
///
/// An existing file of the same name is overwritten.
pub fn import_image(path: &Path, data_dir: &Path) -> io::Result<PathBuf> {
    if !is_supported_image(path) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported image type: {}", path.display()),
        ));
    }
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    std::fs::create_dir_all(data_dir)?;
    let dest = data_dir.join(name);
    std::fs::copy(path, &dest)?;
    tracing::info!(from = %path.display(), to = %dest.display(), "image imported");
    Ok(dest)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `{TIER}_{target-stem}_con_rostro_de_{source-stem}.{ext}`
pub fn output_filename(quality: QualityLevel, target: &Path, source: &Path, extension: &str) -> String {
    format!(
        "{}_{}_con_rostro_de_{}.{}",
        quality.tier(),
        stem(target),
        stem(source),
        extension
    )
}
