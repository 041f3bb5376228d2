//! Orchestrator: load → locate → swap → enhance → save.

use crate::config::Config;
use crate::enhance::{ColorReference, Enhancer};
use crate::layout::{output_filename, OUTPUT_EXTENSION};
use crate::quality::QualityLevel;
use image::RgbImage;
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use swapface_core::{
    CascadeRegionDetector, FaceLocator, InSwapper, InsightLocator, LocatorError, SwapEngine, SwapError,
};
use swapface_imaging::{load_image, save_image, ImagingError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("image error: {0}")]
    Image(#[from] ImagingError),
    #[error("no face detected in the {0} image")]
    NoFace(&'static str),
    #[error("face locator unavailable: {0}")]
    Locator(#[from] LocatorError),
    #[error("swap model unavailable: {0}")]
    Swap(#[from] SwapError),
    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

/// One orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRequest {
    /// Image providing the identity.
    pub source: PathBuf,
    /// Image receiving the face.
    pub target: PathBuf,
    pub quality: QualityLevel,
}

/// Final image and where it was written.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    #[serde(skip)]
    pub image: RgbImage,
    pub path: PathBuf,
    pub quality: QualityLevel,
    pub source_faces: usize,
    pub target_faces: usize,
    pub width: u32,
    pub height: u32,
    pub elapsed_ms: u64,
}

/// Progress callback: percent in 0–100 and a short step description.
pub type ProgressFn<'a> = dyn FnMut(u8, &str) + 'a;

pub struct Pipeline {
    locator: Box<dyn FaceLocator>,
    swapper: Box<dyn SwapEngine>,
    enhancer: Enhancer,
    output_dir: PathBuf,
    jpeg_quality: u8,
}

impl Pipeline {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        swapper: Box<dyn SwapEngine>,
        enhancer: Enhancer,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            locator,
            swapper,
            enhancer,
            output_dir: output_dir.into(),
            jpeg_quality: swapface_imaging::io::DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Load every model named by `config`.
    ///
    /// The locator and swap models are required. A missing cascade model only
    /// disables the face-guided enhancement stages.
    pub fn load(config: &Config) -> Result<Self, PipelineError> {
        let locator = InsightLocator::load(
            &config.detector_model_path(),
            &config.recognizer_model_path(),
            config.intra_threads,
        )?;
        let emap = config.swap_emap_path();
        let swapper = InSwapper::load(&config.swap_model_path(), Some(emap.as_path()), config.intra_threads)?;
        let regions = CascadeRegionDetector::load_or_disabled(&config.cascade_model_path());

        Ok(Self::new(
            Box::new(locator),
            Box::new(swapper),
            Enhancer::new(Box::new(regions)),
            config.output_dir.clone(),
        )
        .with_jpeg_quality(config.jpeg_quality))
    }

    /// Detect faces in both images and swap the first source face onto the
    /// first target face. Returns the swapped image and the face counts.
    ///
    /// A failing swap yields the target unchanged.
    pub fn swap_stage(
        &mut self,
        source: &RgbImage,
        target: &RgbImage,
    ) -> Result<(RgbImage, usize, usize), PipelineError> {
        let source_faces = self.locator.detect(source);
        let target_faces = self.locator.detect(target);
        tracing::info!(
            source = source_faces.len(),
            target = target_faces.len(),
            "faces detected"
        );

        let source_face = source_faces.first().ok_or(PipelineError::NoFace("source"))?;
        let target_face = target_faces.first().ok_or(PipelineError::NoFace("target"))?;

        let swapped = self.swapper.swap(target, target_face, source, source_face);
        Ok((swapped, source_faces.len(), target_faces.len()))
    }

    pub fn try_process(&mut self, request: &PipelineRequest) -> Result<PipelineResult, PipelineError> {
        self.try_process_with(request, &mut |_, _| {})
    }

    /// Run the whole pipeline, reporting progress along the way.
    ///
    /// A panic inside a capability is caught and reported as
    /// [`PipelineError::Panicked`].
    pub fn try_process_with(
        &mut self,
        request: &PipelineRequest,
        progress: &mut ProgressFn<'_>,
    ) -> Result<PipelineResult, PipelineError> {
        catch_unwind(AssertUnwindSafe(|| self.run(request, progress)))
            .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload.as_ref()))))
    }

    fn run(
        &mut self,
        request: &PipelineRequest,
        progress: &mut ProgressFn<'_>,
    ) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        tracing::info!(
            source = %request.source.display(),
            target = %request.target.display(),
            quality = request.quality.level(),
            "starting face swap"
        );

        progress(10, "loading images");
        let source = load_image(&request.source)?;
        let target = load_image(&request.target)?;

        progress(30, "detecting faces");
        let (swapped, source_faces, target_faces) = self.swap_stage(&source, &target)?;

        progress(60, "enhancing");
        let reference = ColorReference { target: &target, source: &source };
        let enhanced = self.enhancer.apply(&swapped, request.quality, Some(&reference));

        progress(90, "saving");
        let name = output_filename(request.quality, &request.target, &request.source, OUTPUT_EXTENSION);
        let path = self.output_dir.join(name);
        save_image(&enhanced, &path, self.jpeg_quality)?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(path = %path.display(), elapsed_ms, "face swap completed");
        progress(100, "done");

        Ok(PipelineResult {
            width: enhanced.width(),
            height: enhanced.height(),
            image: enhanced,
            path,
            quality: request.quality,
            source_faces,
            target_faces,
            elapsed_ms,
        })
    }

    /// Sentinel form of [`try_process`](Self::try_process): errors are logged
    /// and surface as `None`.
    pub fn process(&mut self, source: &Path, target: &Path, quality: QualityLevel) -> Option<PipelineResult> {
        let request = PipelineRequest {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            quality,
        };
        match self.try_process(&request) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::error!(error = %e, "face swap failed");
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|m| m.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
