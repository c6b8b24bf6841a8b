//! Progress-callback trait for per-note batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! events as the orchestrator renders each note.
//!
//! # Example
//!
//! ```rust
//! use promissoria::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_job_complete(&self, index: usize, total: usize, bytes: u64) {
//!         let done = self.rendered.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("note {index} ({bytes} bytes), {done}/{total} done");
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { rendered: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it renders each note.
///
/// Implementations must be `Send + Sync`: `on_job_start` runs on blocking
/// worker threads and may be called concurrently for different notes. All
/// methods have default no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any note is dispatched.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called on the worker thread just before a note is drawn.
    ///
    /// # Arguments
    /// * `index`: 1-based sequence index of the note
    /// * `total`: number of notes in the batch
    fn on_job_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a note has been written to scratch storage.
    ///
    /// `bytes` is the size of the finished PDF.
    fn on_job_complete(&self, index: usize, total: usize, bytes: u64) {
        let _ = (index, total, bytes);
    }

    /// Called when a note failed to render.
    fn on_job_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every note has resolved.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
