//! Headless orchestrator scenarios with in-memory capabilities.

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use swapface_core::{BoundingBox, CascadeRegionDetector, Face, FaceLocator, SwapEngine, SwapError};
use swapface_engine::{
    Enhancer, Pipeline, PipelineError, PipelineRequest, PipelineResult, ProgressSink, QualityLevel, Worker, WorkerError,
};
use swapface_imaging::save_image;

/// Finds one centered face in any image that is not a single flat color.
struct MockLocator {
    /// Blocks the first detection until signalled.
    gate: Option<std::sync::mpsc::Receiver<()>>,
}

impl MockLocator {
    fn new() -> Self {
        Self { gate: None }
    }
}

impl FaceLocator for MockLocator {
    fn detect(&mut self, image: &RgbImage) -> Vec<Face> {
        if let Some(gate) = self.gate.take() {
            let _ = gate.recv();
        }
        let first = image.pixels().next().copied();
        if image.pixels().all(|p| Some(*p) == first) {
            return Vec::new();
        }
        let (w, h) = (image.width() as f32, image.height() as f32);
        vec![Face {
            bbox: BoundingBox { x1: w * 0.25, y1: h * 0.25, x2: w * 0.75, y2: h * 0.75 },
            confidence: 0.99,
            landmarks: None,
            embedding: None,
        }]
    }
}

/// Panics on its first detection, then behaves like [`MockLocator`].
struct PanickingLocator {
    panicked: bool,
}

impl FaceLocator for PanickingLocator {
    fn detect(&mut self, image: &RgbImage) -> Vec<Face> {
        if !self.panicked {
            self.panicked = true;
            panic!("detector crashed");
        }
        MockLocator::new().detect(image)
    }
}

/// Paints the target face box with the source's top-left color.
struct PaintSwap;

impl SwapEngine for PaintSwap {
    fn try_swap(
        &mut self,
        target: &RgbImage,
        target_face: &Face,
        source: &RgbImage,
        _source_face: &Face,
    ) -> Result<RgbImage, SwapError> {
        let mut out = target.clone();
        let color = *source.get_pixel(0, 0);
        let b = target_face.bbox;
        for y in b.y1 as u32..b.y2 as u32 {
            for x in b.x1 as u32..b.x2 as u32 {
                out.put_pixel(x, y, color);
            }
        }
        Ok(out)
    }
}

struct FailingSwap;

impl SwapEngine for FailingSwap {
    fn try_swap(&mut self, _: &RgbImage, _: &Face, _: &RgbImage, _: &Face) -> Result<RgbImage, SwapError> {
        Err(SwapError::InferenceFailed("forced failure".into()))
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    percents: Arc<Mutex<Vec<u8>>>,
    finished: Arc<Mutex<Option<bool>>>,
}

impl ProgressSink for RecordingSink {
    fn progress(&self, percent: u8, _message: &str) {
        self.percents.lock().unwrap().push(percent);
    }

    fn finished(&self, result: &Result<PipelineResult, String>) {
        *self.finished.lock().unwrap() = Some(result.is_ok());
    }
}

fn portrait(seed: u8) -> RgbImage {
    RgbImage::from_fn(96, 80, |x, y| {
        Rgb([(x as u8).wrapping_mul(2).wrapping_add(seed), (y as u8).wrapping_mul(3), 140])
    })
}

fn write(dir: &Path, name: &str, image: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    save_image(image, &path, 95).unwrap();
    path
}

fn pipeline(locator: impl FaceLocator + 'static, swapper: Box<dyn SwapEngine>, output: &Path) -> Pipeline {
    Pipeline::new(
        Box::new(locator),
        swapper,
        Enhancer::new(Box::new(CascadeRegionDetector::disabled())),
        output,
    )
}

fn output_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default()
}

#[test]
fn test_hd_run_writes_tiered_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "me.png", &portrait(0));
    let target = write(dir.path(), "beach.png", &portrait(90));
    let output = dir.path().join("output");

    let mut p = pipeline(MockLocator::new(), Box::new(PaintSwap), &output);
    let result = p.process(&source, &target, QualityLevel::Hd).expect("pipeline result");

    assert!(result.path.exists());
    let name = result.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.contains("HD"));
    assert_eq!(name, "HD_beach_con_rostro_de_me.png");
    assert_eq!(result.image.dimensions(), (96, 80));
    assert_eq!((result.source_faces, result.target_faces), (1, 1));
}

#[test]
fn test_target_without_faces_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "me.png", &portrait(0));
    let target = write(dir.path(), "wall.png", &RgbImage::from_pixel(64, 64, Rgb([200, 200, 200])));
    let output = dir.path().join("output");

    let mut p = pipeline(MockLocator::new(), Box::new(PaintSwap), &output);
    assert!(p.process(&source, &target, QualityLevel::Hd).is_none());
    assert!(output_files(&output).is_empty());

    let request = PipelineRequest { source, target, quality: QualityLevel::Hd };
    assert!(matches!(p.try_process(&request), Err(PipelineError::NoFace("target"))));
}

#[test]
fn test_missing_input_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let target = write(dir.path(), "beach.png", &portrait(90));
    let mut p = pipeline(MockLocator::new(), Box::new(PaintSwap), dir.path());
    assert!(p.process(&dir.path().join("missing.png"), &target, QualityLevel::Basic).is_none());
}

#[test]
fn test_failing_swap_returns_target_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = pipeline(MockLocator::new(), Box::new(FailingSwap), dir.path());
    let source = portrait(0);
    let target = portrait(90);

    let (swapped, _, _) = p.swap_stage(&source, &target).unwrap();
    assert_eq!(swapped, target);
}

#[test]
fn test_basic_level_preserves_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "a.png", &portrait(0));
    let target = write(dir.path(), "b.png", &portrait(50));

    let mut p = pipeline(MockLocator::new(), Box::new(PaintSwap), dir.path());
    let result = p.process(&source, &target, QualityLevel::Basic).unwrap();
    assert_eq!((result.width, result.height), (96, 80));
    assert!(result.path.ends_with("BASICO_b_con_rostro_de_a.png"));
    let reloaded = swapface_imaging::load_image(&result.path).unwrap();
    assert_eq!(reloaded.dimensions(), (96, 80));
}

#[test]
fn test_result_serializes_without_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "a.png", &portrait(0));
    let target = write(dir.path(), "b.png", &portrait(50));
    let mut p = pipeline(MockLocator::new(), Box::new(PaintSwap), dir.path());
    let result = p.process(&source, &target, QualityLevel::UltraHd).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["quality"], "UltraHd");
    assert!(json.get("image").is_none());
    assert!(json["path"].as_str().unwrap().contains("ULTRA_HD"));
}

#[test]
fn test_worker_reports_progress_and_rejects_while_busy() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "a.png", &portrait(0));
    let target = write(dir.path(), "b.png", &portrait(50));

    let (open_gate, gate) = std::sync::mpsc::channel();
    let locator = MockLocator { gate: Some(gate) };
    let worker = Worker::spawn(pipeline(locator, Box::new(PaintSwap), dir.path())).unwrap();

    let request = PipelineRequest { source, target, quality: QualityLevel::Hd };
    let sink = RecordingSink::default();
    let first = worker.submit(request.clone(), Box::new(sink.clone())).unwrap();
    assert!(worker.is_busy());

    let second = worker.submit(request.clone(), Box::new(RecordingSink::default()));
    assert!(matches!(second, Err(WorkerError::Busy)));

    open_gate.send(()).unwrap();
    let result = first.blocking_wait().unwrap();
    assert!(result.path.exists());
    assert_eq!(*sink.finished.lock().unwrap(), Some(true));
    let percents = sink.percents.lock().unwrap().clone();
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));

    // Busy is cleared once the run completes.
    let third = worker.submit(request, Box::new(RecordingSink::default())).unwrap();
    assert!(third.blocking_wait().is_ok());
}

#[tokio::test]
async fn test_worker_failure_surfaces_message() {
    let dir = tempfile::tempdir().unwrap();
    let worker = Worker::spawn(pipeline(MockLocator::new(), Box::new(PaintSwap), dir.path())).unwrap();
    let request = PipelineRequest {
        source: dir.path().join("nope.png"),
        target: dir.path().join("nope2.png"),
        quality: QualityLevel::Basic,
    };
    let sink = RecordingSink::default();
    let err = worker.submit(request, Box::new(sink.clone())).unwrap().wait().await.unwrap_err();
    assert!(matches!(err, WorkerError::Failed(ref m) if m.contains("not found")));
    assert_eq!(*sink.finished.lock().unwrap(), Some(false));
}

#[test]
fn test_panicking_locator_surfaces_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "a.png", &portrait(0));
    let target = write(dir.path(), "b.png", &portrait(50));
    let output = dir.path().join("output");

    let mut p = pipeline(PanickingLocator { panicked: false }, Box::new(PaintSwap), &output);
    let request = PipelineRequest { source: source.clone(), target: target.clone(), quality: QualityLevel::Hd };
    assert!(matches!(p.try_process(&request), Err(PipelineError::Panicked(ref m)) if m.contains("detector crashed")));
    assert!(output_files(&output).is_empty());

    // The pipeline stays usable after the panic.
    assert!(p.process(&source, &target, QualityLevel::Hd).is_some());
}

#[test]
fn test_worker_survives_panicking_capability() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "a.png", &portrait(0));
    let target = write(dir.path(), "b.png", &portrait(50));

    let worker = Worker::spawn(pipeline(PanickingLocator { panicked: false }, Box::new(PaintSwap), dir.path())).unwrap();
    let request = PipelineRequest { source, target, quality: QualityLevel::Basic };

    let sink = RecordingSink::default();
    let err = worker.submit(request.clone(), Box::new(sink.clone())).unwrap().blocking_wait().unwrap_err();
    assert!(matches!(err, WorkerError::Failed(ref m) if m.contains("panicked")));
    assert_eq!(*sink.finished.lock().unwrap(), Some(false));
    assert!(!worker.is_busy());

    let second = worker.submit(request, Box::new(RecordingSink::default())).unwrap();
    assert!(second.blocking_wait().unwrap().path.exists());
}
