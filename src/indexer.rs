// Full index rebuild: scan, embed, build, save. One cancellable job at a
// time per snapshot target, streaming progress events to whoever listens.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::embedding::{encode_file, EmbeddingGateway};
use crate::index::VectorIndex;
use crate::scanner::{self, ScanFilter};
use crate::store::IndexStore;

/// Cooperative cancellation flag shared between a running job and its
/// controller. Cancellation is a request, not preemption: an in-flight
/// embedding call finishes before the job halts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lifecycle of one build run. Transitions only move forward; a job value is
/// single-use, so a fresh run starts again from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum JobState {
    Idle,
    Scanning,
    Embedding,
    Building,
    Saving,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One progress notification. Within a run, `percent` never decreases.
#[derive(Debug, Clone)]
pub struct BuildProgress {
    pub state: JobState,
    pub message: String,
    pub percent: u8,
}

/// An image that could not be embedded. Recorded, never fatal on its own.
#[derive(Debug, Clone)]
pub struct BuildFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct BuildReport {
    pub indexed: usize,
    pub failures: Vec<BuildFailure>,
}

#[derive(Debug)]
pub enum BuildOutcome {
    Completed(BuildReport),
    Failed(String),
    Cancelled,
}

/// One full rebuild of the snapshot. Consumed by [`IndexBuildJob::run`].
pub struct IndexBuildJob {
    gateway: Arc<dyn EmbeddingGateway>,
    store: IndexStore,
    config: EngineConfig,
    roots: Vec<PathBuf>,
    cancel: CancelFlag,
    progress: mpsc::UnboundedSender<BuildProgress>,
    state: JobState,
}

impl IndexBuildJob {
    pub fn new(
        gateway: Arc<dyn EmbeddingGateway>,
        store: IndexStore,
        config: EngineConfig,
        roots: Vec<PathBuf>,
        cancel: CancelFlag,
        progress: mpsc::UnboundedSender<BuildProgress>,
    ) -> Self {
        Self {
            gateway,
            store,
            config,
            roots,
            cancel,
            progress,
            state: JobState::Idle,
        }
    }

    fn emit(&self, message: impl Into<String>, percent: u8) {
        let _ = self.progress.send(BuildProgress {
            state: self.state,
            message: message.into(),
            percent,
        });
    }

    fn transition(&mut self, state: JobState, message: impl Into<String>, percent: u8) {
        self.state = state;
        self.emit(message, percent);
    }

    /// Run the job to a terminal outcome. Blocking; callers wanting a
    /// background run use [`IndexBuilder::start`].
    pub fn run(mut self) -> BuildOutcome {
        self.transition(JobState::Scanning, "Scanning for images...", 0);
        let filter = ScanFilter::from_config(&self.config);
        let scan_progress = self.progress.clone();
        let candidates = scanner::scan(&self.roots, &filter, &self.cancel, |p| {
            let percent = (15 + p.directories / 100).min(40) as u8;
            let _ = scan_progress.send(BuildProgress {
                state: JobState::Scanning,
                message: format!(
                    "Scanned {} folders, found {} images...",
                    p.directories, p.files
                ),
                percent,
            });
        });

        if self.cancel.is_cancelled() {
            self.transition(JobState::Cancelled, "Indexing cancelled", 40);
            return BuildOutcome::Cancelled;
        }
        if candidates.is_empty() {
            self.transition(JobState::Failed, "No images found to index", 40);
            return BuildOutcome::Failed("no images found to index".to_string());
        }

        let total = candidates.len();
        let dim = self.gateway.dimension();
        self.transition(
            JobState::Embedding,
            format!("Embedding {total} images..."),
            40,
        );

        let mut embedded: Vec<Vec<f32>> = Vec::new();
        let mut paths: Vec<PathBuf> = Vec::new();
        let mut failures: Vec<BuildFailure> = Vec::new();
        let mut percent = 40u8;

        for (i, path) in candidates.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.transition(JobState::Cancelled, "Indexing cancelled", percent);
                return BuildOutcome::Cancelled;
            }

            match encode_file(self.gateway.as_ref(), &path, self.config.max_image_dim) {
                Ok(vector) => {
                    embedded.push(vector);
                    paths.push(path);
                }
                Err(err) => {
                    log::warn!("failed to embed {}: {err}", path.display());
                    failures.push(BuildFailure {
                        path,
                        reason: err.to_string(),
                    });
                }
            }

            let processed = i + 1;
            percent = 40 + ((processed * 50) / total) as u8;
            if processed % 10 == 0 || processed == total {
                self.emit(
                    format!(
                        "Embedded {}/{} images ({} failed)",
                        embedded.len(),
                        total,
                        failures.len()
                    ),
                    percent,
                );
            }
        }

        if embedded.is_empty() {
            self.transition(JobState::Failed, "No images could be embedded", percent);
            return BuildOutcome::Failed("no images could be embedded".to_string());
        }

        self.transition(JobState::Building, "Building search index...", 90);
        let mut index = VectorIndex::new(dim);
        for vector in &embedded {
            index.add(vector);
        }

        self.transition(JobState::Saving, "Saving index snapshot...", 95);
        if let Err(err) = self.store.persist(&index, &paths) {
            self.transition(JobState::Failed, format!("Failed to save index: {err}"), 95);
            return BuildOutcome::Failed(format!("failed to save index: {err}"));
        }

        let indexed = paths.len();
        self.transition(
            JobState::Completed,
            format!("Indexed {indexed} images"),
            100,
        );
        BuildOutcome::Completed(BuildReport { indexed, failures })
    }
}

/// Returned when a second build is requested while one is still running.
#[derive(Debug, Error)]
#[error("an index build is already running")]
pub struct BuildInProgress;

/// Handle to a spawned build: progress stream, cancellation, and the final
/// outcome.
pub struct BuildHandle {
    pub progress: mpsc::UnboundedReceiver<BuildProgress>,
    cancel: CancelFlag,
    handle: tokio::task::JoinHandle<BuildOutcome>,
}

impl BuildHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn wait(self) -> BuildOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => BuildOutcome::Failed(format!("index build worker panicked: {err}")),
        }
    }
}

struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Serializes builds against one snapshot target: at most one job runs at a
/// time, on a blocking worker off the async runtime.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    running: Arc<AtomicBool>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(
        &self,
        gateway: Arc<dyn EmbeddingGateway>,
        store: IndexStore,
        config: EngineConfig,
        roots: Vec<PathBuf>,
    ) -> Result<BuildHandle, BuildInProgress> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BuildInProgress);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let job = IndexBuildJob::new(gateway, store, config, roots, cancel.clone(), tx);

        let guard = RunningGuard(self.running.clone());
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            job.run()
        });

        Ok(BuildHandle {
            progress: rx,
            cancel,
            handle,
        })
    }
}
