//! The batch orchestrator: a bounded worker pool over every render job.
//!
//! ## Why a JoinSet and not `buffer_unordered`?
//!
//! Each job is CPU-bound and runs on the blocking pool. A [`JoinSet`] keeps
//! at most `concurrency` of them in flight, refilling as they finish, and on
//! a deadline it lets us abort the jobs that have not started and then
//! *drain* the ones that have. Draining matters: the caller deletes the
//! scratch directory right after a timeout, and no render may still be
//! writing into it at that point.
//!
//! A failed job never stops its siblings. Every outcome is collected, and
//! only a batch where nothing rendered is rejected.

use crate::config::BatchConfig;
use crate::error::{BatchError, RenderJobError};
use crate::output::{BatchState, JobOutcome, Manifest};
use crate::pipeline::render::{render_document, RenderJob};
use crate::progress::ProgressCallback;
use crate::workspace::Workspace;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Runs one batch of render jobs and tracks its [`BatchState`].
pub struct Orchestrator {
    concurrency: usize,
    font_size: f32,
    timeout: Option<Duration>,
    progress: Option<ProgressCallback>,
    state: BatchState,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("concurrency", &self.concurrency)
            .field("font_size", &self.font_size)
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            font_size: config.font_size,
            timeout: config.timeout,
            progress: config.progress_callback.clone(),
            state: BatchState::Pending,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Render every job into `workspace` and collect the outcomes.
    ///
    /// Waits for all jobs (join-all). Note `i` is written to
    /// `usuario_<i>.pdf` regardless of completion order.
    ///
    /// # Errors
    /// - [`BatchError::Timeout`] if `deadline` passes first. Jobs not yet
    ///   started are cancelled and running ones are awaited before returning.
    /// - [`BatchError::NoRenderableRecords`] if there were jobs and none
    ///   succeeded.
    pub async fn run(
        &mut self,
        jobs: Vec<RenderJob>,
        workspace: &Workspace,
        deadline: Option<Instant>,
    ) -> Result<Manifest, BatchError> {
        let total = jobs.len();
        self.state = BatchState::Rendering;
        info!("Rendering {} notes (concurrency={})", total, self.concurrency);
        if let Some(ref cb) = self.progress {
            cb.on_batch_start(total);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut pending = jobs.into_iter();
        let mut in_flight: JoinSet<JobOutcome> = JoinSet::new();
        let mut task_index: HashMap<tokio::task::Id, usize> = HashMap::new();
        let mut outcomes: Vec<JobOutcome> = Vec::with_capacity(total);

        loop {
            while in_flight.len() < self.concurrency {
                let Some(job) = pending.next() else {
                    break;
                };
                let index = job.index;
                let dest = workspace.artifact_path(index);
                let task = render_task(
                    job,
                    dest,
                    self.font_size,
                    total,
                    self.progress.clone(),
                    Arc::clone(&cancelled),
                );
                let handle = in_flight.spawn_blocking(task);
                task_index.insert(handle.id(), index);
            }

            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, in_flight.join_next_with_id()).await
                {
                    Ok(next) => next,
                    Err(_) => {
                        self.cancel(&mut in_flight, &cancelled).await;
                        if let Some(ref cb) = self.progress {
                            let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
                            cb.on_batch_complete(total, succeeded);
                        }
                        return Err(BatchError::Timeout {
                            after: self.timeout.unwrap_or_default(),
                        });
                    }
                },
                None => in_flight.join_next_with_id().await,
            };

            let Some(joined) = next else {
                break;
            };

            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(e) => {
                    let index = task_index.get(&e.id()).copied().unwrap_or(0);
                    JobOutcome {
                        index,
                        result: Err(RenderJobError::Panicked {
                            index,
                            detail: e.to_string(),
                        }),
                        duration_ms: 0,
                    }
                }
            };
            self.report(&outcome, total);
            outcomes.push(outcome);
        }

        let manifest = Manifest::from_outcomes(outcomes);
        self.state = manifest.state();

        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(total, manifest.succeeded());
        }
        info!(
            "Rendered {}/{} notes ({:?})",
            manifest.succeeded(),
            total,
            self.state
        );

        if total > 0 && manifest.succeeded() == 0 {
            let first_error = manifest
                .first_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(BatchError::NoRenderableRecords { total, first_error });
        }

        Ok(manifest)
    }

    fn report(&self, outcome: &JobOutcome, total: usize) {
        match &outcome.result {
            Ok(artifact) => {
                debug!(
                    "Note {} done in {}ms ({} bytes)",
                    outcome.index, outcome.duration_ms, artifact.bytes
                );
                if let Some(ref cb) = self.progress {
                    cb.on_job_complete(outcome.index, total, artifact.bytes);
                }
            }
            Err(e) => {
                warn!("{}", e);
                if let Some(ref cb) = self.progress {
                    cb.on_job_error(outcome.index, total, &e.to_string());
                }
            }
        }
    }

    /// Stop a batch past its deadline without leaving writers behind.
    async fn cancel(&mut self, in_flight: &mut JoinSet<JobOutcome>, cancelled: &AtomicBool) {
        warn!(
            "Deadline reached with {} notes in flight; cancelling",
            in_flight.len()
        );
        cancelled.store(true, Ordering::SeqCst);
        // Blocking tasks already running cannot be interrupted; abort only
        // removes queued ones, so wait for the rest.
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
        self.state = BatchState::CompletedWithFailures;
    }
}

/// The blocking body of one job. Never panics: a panic inside the render is
/// caught and reported as [`RenderJobError::Panicked`].
fn render_task(
    job: RenderJob,
    dest: PathBuf,
    font_size: f32,
    total: usize,
    progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
) -> impl FnOnce() -> JobOutcome + Send + 'static {
    move || {
        let index = job.index;
        if cancelled.load(Ordering::SeqCst) {
            return JobOutcome {
                index,
                result: Err(RenderJobError::Cancelled { index }),
                duration_ms: 0,
            };
        }

        if let Some(ref cb) = progress {
            cb.on_job_start(index, total);
        }

        let start = std::time::Instant::now();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            render_document(&job, &dest, font_size)
        }))
        .unwrap_or_else(|payload| {
            Err(RenderJobError::Panicked {
                index,
                detail: panic_message(payload.as_ref()),
            })
        });

        JobOutcome {
            index,
            result,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::normalize;
    use crate::pipeline::parse::RawRecord;
    use crate::pipeline::render::Template;
    use crate::progress::BatchProgressCallback;
    use crate::token::BatchToken;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::AtomicUsize;

    fn jobs(n: usize) -> Vec<RenderJob> {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let template = Arc::new(Template::from_image(&DynamicImage::ImageRgb8(img)).unwrap());
        (1..=n)
            .map(|index| RenderJob {
                index,
                record: normalize(&RawRecord::default()),
                template: Arc::clone(&template),
            })
            .collect()
    }

    fn config(concurrency: usize) -> BatchConfig {
        BatchConfig::builder().concurrency(concurrency).build().unwrap()
    }

    async fn workspace(root: &std::path::Path) -> Workspace {
        Workspace::acquire(root, BatchToken::new("orch").unwrap())
            .await
            .unwrap()
    }

    #[derive(Default)]
    struct Counter {
        completes: AtomicUsize,
        errors: AtomicUsize,
        batch_total: AtomicUsize,
        batches_completed: AtomicUsize,
    }

    impl BatchProgressCallback for Counter {
        fn on_batch_start(&self, total: usize) {
            self.batch_total.store(total, Ordering::SeqCst);
        }
        fn on_job_complete(&self, _index: usize, _total: usize, _bytes: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_job_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_batch_complete(&self, _total: usize, _succeeded: usize) {
            self.batches_completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn renders_every_job() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let mut orch = Orchestrator::new(&config(2));
        assert_eq!(orch.state(), BatchState::Pending);

        let manifest = orch.run(jobs(5), &ws, None).await.unwrap();

        assert_eq!(orch.state(), BatchState::Completed);
        assert_eq!(manifest.succeeded(), 5);
        let indices: Vec<usize> = manifest.entries().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        for i in 1..=5 {
            assert!(ws.artifact_path(i).is_file());
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_siblings() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        // A directory in the way makes note 2's final rename fail.
        std::fs::create_dir(ws.artifact_path(2)).unwrap();

        let counter = Arc::new(Counter::default());
        let config = BatchConfig::builder()
            .concurrency(3)
            .progress_callback(counter.clone())
            .build()
            .unwrap();
        let mut orch = Orchestrator::new(&config);
        let manifest = orch.run(jobs(3), &ws, None).await.unwrap();

        assert_eq!(orch.state(), BatchState::CompletedWithFailures);
        assert_eq!(manifest.succeeded(), 2);
        let entries: Vec<_> = manifest.entries().collect();
        assert!(entries[0].success && !entries[1].success && entries[2].success);
        assert!(matches!(
            manifest.first_error(),
            Some(RenderJobError::Write { index: 2, .. })
        ));
        assert_eq!(counter.completes.load(Ordering::SeqCst), 2);
        assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
        assert_eq!(counter.batch_total.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_successes_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        std::fs::create_dir(ws.artifact_path(1)).unwrap();

        let mut orch = Orchestrator::new(&config(1));
        let err = orch.run(jobs(1), &ws, None).await.unwrap_err();
        assert!(matches!(err, BatchError::NoRenderableRecords { total: 1, .. }));
        assert_eq!(err.status_code(), 422);
        assert_eq!(orch.state(), BatchState::CompletedWithFailures);
    }

    #[tokio::test]
    async fn empty_job_list_completes() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let mut orch = Orchestrator::new(&config(4));
        let manifest = orch.run(Vec::new(), &ws, None).await.unwrap();
        assert_eq!(manifest.total(), 0);
        assert_eq!(orch.state(), BatchState::Completed);
    }

    #[tokio::test]
    async fn expired_deadline_times_out_and_drains() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let counter = Arc::new(Counter::default());
        let config = BatchConfig::builder()
            .concurrency(1)
            .timeout(Some(Duration::from_secs(7)))
            .progress_callback(counter.clone())
            .build()
            .unwrap();
        let mut orch = Orchestrator::new(&config);

        let err = orch.run(jobs(50), &ws, Some(Instant::now())).await.unwrap_err();
        assert!(
            matches!(err, BatchError::Timeout { after } if after == Duration::from_secs(7))
        );

        // Nothing is left half-written once run() has returned.
        for entry in std::fs::read_dir(ws.scratch_dir()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            assert!(name.ends_with(".pdf"), "leftover temp file: {name}");
        }
        assert!(std::fs::read_dir(ws.scratch_dir()).unwrap().count() < 50);
        // Progress consumers still see the batch end.
        assert_eq!(counter.batches_completed.load(Ordering::SeqCst), 1);
        assert_eq!(orch.state(), BatchState::CompletedWithFailures);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
