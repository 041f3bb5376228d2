//! InSwapper 128 face swap via ONNX Runtime.
//!
//! The target face is aligned to a 128×128 crop, the generator repaints it
//! with the source identity latent, and the crop is pasted back into the
//! full frame through the inverse alignment transform.

use crate::alignment;
use crate::capability::{SwapEngine, SwapError};
use crate::types::{BoundingBox, Face};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const INSWAPPER_INPUT_SIZE: usize = 128;
const INSWAPPER_LATENT_DIM: usize = 512;
/// Gaussian sigma matching a 25×25 kernel.
const BOUNDARY_BLUR_SIGMA: f32 = 4.1;

/// InSwapper-based [`SwapEngine`].
pub struct InSwapper {
    session: Session,
    target_input: String,
    source_input: String,
    /// Row-major `LATENT_DIM × LATENT_DIM` projection from embedding to latent space.
    emap: Option<Vec<f32>>,
}

impl InSwapper {
    /// Load the swap model, plus the optional embedding map sidecar.
    ///
    /// The sidecar is a raw little-endian `f32` matrix of 512×512 values.
    /// Without it the normalized embedding is fed to the generator directly.
    pub fn load(model_path: &Path, emap_path: Option<&Path>, intra_threads: usize) -> Result<Self, SwapError> {
        if !model_path.exists() {
            return Err(SwapError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.inputs().iter().map(|i| i.name().to_string()).collect();
        if names.len() < 2 {
            return Err(SwapError::InferenceFailed(format!(
                "swap model requires 2 inputs (target, source), got {}",
                names.len()
            )));
        }
        let source_pos = names.iter().position(|n| n.contains("source")).unwrap_or(1);
        let target_pos = if source_pos == 0 { 1 } else { 0 };

        let emap = match emap_path.filter(|p| p.exists()) {
            Some(p) => Some(load_emap(p)?),
            None => {
                tracing::warn!("no embedding map found; using normalized embedding as latent");
                None
            }
        };

        tracing::info!(
            path = %model_path.display(),
            inputs = ?names,
            emap = emap.is_some(),
            "loaded InSwapper model"
        );

        Ok(Self {
            session,
            target_input: names[target_pos].clone(),
            source_input: names[source_pos].clone(),
            emap,
        })
    }

    /// Project a source embedding into the generator latent space.
    fn latent(&self, source_face: &Face) -> Result<Array2<f32>, SwapError> {
        let embedding = source_face.embedding.as_ref().ok_or(SwapError::NoEmbedding)?;
        if embedding.values.len() != INSWAPPER_LATENT_DIM {
            return Err(SwapError::LatentMismatch {
                expected: INSWAPPER_LATENT_DIM,
                actual: embedding.values.len(),
            });
        }
        Ok(project_latent(&embedding.normalized(), self.emap.as_deref()))
    }
}

impl SwapEngine for InSwapper {
    fn try_swap(
        &mut self,
        target: &RgbImage,
        target_face: &Face,
        _source: &RgbImage,
        source_face: &Face,
    ) -> Result<RgbImage, SwapError> {
        let landmarks = target_face.landmarks.as_ref().ok_or(SwapError::NoLandmarks)?;
        let latent = self.latent(source_face)?;

        let (aligned, matrix) = alignment::align(target, landmarks, INSWAPPER_INPUT_SIZE as u32);
        let blob = preprocess(&aligned);

        let outputs = self.session.run(ort::inputs![
            self.target_input.clone() => TensorRef::from_array_view(blob.view())?,
            self.source_input.clone() => TensorRef::from_array_view(latent.view())?,
        ])?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| SwapError::InferenceFailed(format!("swap output: {e}")))?;

        let generated = postprocess(data)?;
        Ok(alignment::paste_back(target, &generated, &matrix))
    }
}

/// Read the raw embedding map sidecar.
fn load_emap(path: &Path) -> Result<Vec<f32>, SwapError> {
    let bytes = std::fs::read(path)?;
    let expected = INSWAPPER_LATENT_DIM * INSWAPPER_LATENT_DIM * 4;
    if bytes.len() != expected {
        return Err(SwapError::InvalidEmap {
            path: path.display().to_string(),
            reason: format!("expected {expected} bytes, got {}", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// `normalize(embedding · emap)`, or the embedding itself without a map.
fn project_latent(embedding: &[f32], emap: Option<&[f32]>) -> Array2<f32> {
    let dim = embedding.len();
    let mut latent = match emap {
        Some(m) => (0..dim)
            .map(|col| (0..dim).map(|row| embedding[row] * m[row * dim + col]).sum())
            .collect::<Vec<f32>>(),
        None => embedding.to_vec(),
    };
    let norm = latent.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        latent.iter_mut().for_each(|v| *v /= norm);
    }
    Array2::from_shape_vec((1, dim), latent).unwrap_or_else(|_| Array2::zeros((1, dim)))
}

/// Aligned RGB crop → NCHW tensor in `[0, 1]`.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let size = INSWAPPER_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in aligned.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = pixel[c] as f32 / 255.0;
        }
    }
    tensor
}

/// NCHW generator output in `[0, 1]` → RGB crop.
fn postprocess(data: &[f32]) -> Result<RgbImage, SwapError> {
    let size = INSWAPPER_INPUT_SIZE;
    let plane = size * size;
    if data.len() != 3 * plane {
        return Err(SwapError::InferenceFailed(format!(
            "expected {} output values, got {}",
            3 * plane,
            data.len()
        )));
    }
    Ok(RgbImage::from_fn(size as u32, size as u32, |x, y| {
        let i = y as usize * size + x as usize;
        Rgb(std::array::from_fn(|c| (data[c * plane + i] * 255.0).round().clamp(0.0, 255.0) as u8))
    }))
}

/// Blend the swap result back onto the original target with a feathered box mask.
///
/// Inside `bbox` the result dominates; the mask is Gaussian-softened so the
/// transition to the untouched target is gradual. Images of different size
/// return `result` unchanged.
pub fn adjust_face_boundary(result: &RgbImage, target: &RgbImage, bbox: &BoundingBox) -> RgbImage {
    if result.dimensions() != target.dimensions() {
        tracing::warn!("boundary adjustment skipped: image sizes differ");
        return result.clone();
    }
    let (w, h) = result.dimensions();
    let (x1, y1, x2, y2) = (bbox.x1 as i64, bbox.y1 as i64, bbox.x2 as i64, bbox.y2 as i64);

    let hard: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_fn(w, h, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let inside = x >= x1 && x <= x2 && y >= y1 && y <= y2;
        Luma([if inside { 1.0 } else { 0.0 }])
    });
    let mask = image::imageops::blur(&hard, BOUNDARY_BLUR_SIGMA);

    RgbImage::from_fn(w, h, |x, y| {
        let m = mask.get_pixel(x, y)[0].clamp(0.0, 1.0);
        let r = result.get_pixel(x, y);
        let t = target.get_pixel(x, y);
        Rgb(std::array::from_fn(|c| {
            (r[c] as f32 * m + t[c] as f32 * (1.0 - m)).round().clamp(0.0, 255.0) as u8
        }))
    })
}
