//! Background worker: runs the pipeline off the caller's event loop.
//!
//! The pipeline (and with it every model session) lives on one dedicated OS
//! thread. At most one run is in flight; a second request while busy is
//! rejected, never queued.

use crate::pipeline::{Pipeline, PipelineRequest, PipelineResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("a face swap is already in progress")]
    Busy,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker thread exited")]
    ChannelClosed,
    #[error("face swap failed: {0}")]
    Failed(String),
}

/// Receives progress and the terminal outcome of a run.
///
/// Called on the worker thread; a UI shell marshals the calls onto its own
/// event loop.
pub trait ProgressSink: Send {
    fn progress(&self, percent: u8, message: &str);
    fn finished(&self, result: &Result<PipelineResult, String>);
}

/// Sink that reports through `tracing`.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn progress(&self, percent: u8, message: &str) {
        tracing::info!(percent, message, "progress");
    }

    fn finished(&self, result: &Result<PipelineResult, String>) {
        match result {
            Ok(r) => tracing::info!(path = %r.path.display(), "run finished"),
            Err(e) => tracing::warn!(error = %e, "run failed"),
        }
    }
}

/// Clears the busy flag when a run ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Job {
    request: PipelineRequest,
    sink: Box<dyn ProgressSink>,
    reply: oneshot::Sender<Result<PipelineResult, String>>,
}

/// Pending result of a submitted run.
pub struct JobHandle {
    rx: oneshot::Receiver<Result<PipelineResult, String>>,
}

impl JobHandle {
    /// Await the run's outcome.
    pub async fn wait(self) -> Result<PipelineResult, WorkerError> {
        self.rx
            .await
            .map_err(|_| WorkerError::ChannelClosed)?
            .map_err(WorkerError::Failed)
    }

    /// Block the current (non-async) thread until the run finishes.
    pub fn blocking_wait(self) -> Result<PipelineResult, WorkerError> {
        self.rx
            .blocking_recv()
            .map_err(|_| WorkerError::ChannelClosed)?
            .map_err(WorkerError::Failed)
    }
}

/// Clone-safe handle to the worker thread.
#[derive(Clone)]
pub struct Worker {
    tx: mpsc::Sender<Job>,
    busy: Arc<AtomicBool>,
}

impl Worker {
    /// Move `pipeline` onto a dedicated thread and start serving requests.
    pub fn spawn(mut pipeline: Pipeline) -> Result<Self, WorkerError> {
        let (tx, mut rx) = mpsc::channel::<Job>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let thread_busy = Arc::clone(&busy);

        std::thread::Builder::new()
            .name("swapface-worker".into())
            .spawn(move || {
                tracing::info!("worker thread started");
                while let Some(job) = rx.blocking_recv() {
                    let Job { request, sink, reply } = job;
                    let guard = BusyGuard(Arc::clone(&thread_busy));
                    let result = pipeline
                        .try_process_with(&request, &mut |percent, message| sink.progress(percent, message))
                        .map_err(|e| {
                            tracing::error!(error = %e, "face swap failed");
                            e.to_string()
                        });
                    sink.finished(&result);
                    drop(guard);
                    let _ = reply.send(result);
                }
                tracing::info!("worker thread exiting");
            })
            .map_err(WorkerError::Spawn)?;

        Ok(Self { tx, busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a run. Fails with [`WorkerError::Busy`] while another is in flight.
    pub fn submit(&self, request: PipelineRequest, sink: Box<dyn ProgressSink>) -> Result<JobHandle, WorkerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("rejected request: worker busy");
            return Err(WorkerError::Busy);
        }

        let (reply, rx) = oneshot::channel();
        let job = Job { request, sink, reply };
        if self.tx.try_send(job).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(WorkerError::ChannelClosed);
        }
        Ok(JobHandle { rx })
    }
}
