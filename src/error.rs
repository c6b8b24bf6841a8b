//! Error types for the promissoria library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`BatchError`]: **Fatal**. The batch cannot produce an archive at all
//!   (unreadable sheet, missing template, packaging fault, timeout). Returned
//!   as `Err(BatchError)` from the top-level `render_batch*` functions, after
//!   the batch workspace has been reclaimed.
//!
//! * [`RenderJobError`]: **Non-fatal**. A single note failed to render but
//!   its siblings are fine. Stored inside [`crate::output::JobOutcome`] so the
//!   orchestrator can still deliver the notes that did succeed.
//!
//! * [`CleanupError`]: **Logged only**. Reclaiming scratch storage failed
//!   after the response was already decided; it never reaches the caller.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`BatchError`], used by transports to pick a
/// response without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The input table is unreadable, empty, or yielded nothing renderable.
    InputFormat,
    /// The background template asset is absent or cannot be decoded.
    TemplateMissing,
    /// The archive could not be built or handed off.
    Packaging,
    /// The batch exceeded its overall deadline.
    Timeout,
    /// The configuration is invalid.
    Config,
    /// Anything else (scratch allocation, runtime failures).
    Internal,
}

/// All fatal errors returned by the promissoria library.
///
/// Per-note failures use [`RenderJobError`] and are collected in the
/// [`crate::output::Manifest`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Spreadsheet not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The bytes are not a spreadsheet calamine can decode.
    #[error("Input is not a readable spreadsheet: {detail}")]
    UnreadableTable { detail: String },

    /// The first sheet has a header row (or nothing) but no data rows.
    #[error("Spreadsheet has no data rows")]
    EmptyTable,

    /// Every note failed to render; the archive would be empty.
    #[error("None of the {total} records could be rendered.\nFirst error: {first_error}")]
    NoRenderableRecords { total: usize, first_error: String },

    // ── Template errors ───────────────────────────────────────────────────
    /// The background template image does not exist.
    #[error("Background template not found: '{path}'\nSet --template or PROMISSORIA_TEMPLATE.")]
    TemplateMissing { path: PathBuf },

    /// The background template exists but is not a decodable image.
    #[error("Background template '{path}' could not be decoded: {detail}")]
    TemplateUnreadable { path: PathBuf, detail: String },

    // ── Archive errors ────────────────────────────────────────────────────
    /// Building the ZIP archive failed.
    #[error("Failed to build archive '{path}': {detail}")]
    Packaging { path: PathBuf, detail: String },

    /// Copying the finished archive to the caller's sink failed.
    #[error("Failed to deliver archive: {source}")]
    DeliveryFailed {
        #[source]
        source: std::io::Error,
    },

    // ── Scheduling errors ─────────────────────────────────────────────────
    /// The batch exceeded its overall deadline.
    #[error("Batch timed out after {after:?}\nIncrease --timeout or lower the row count.")]
    Timeout { after: Duration },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The per-batch scratch directory could not be allocated.
    #[error("Failed to allocate scratch workspace '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output archive file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// The error class this variant belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::InputNotFound { .. }
            | BatchError::UnreadableTable { .. }
            | BatchError::EmptyTable
            | BatchError::NoRenderableRecords { .. } => ErrorKind::InputFormat,
            BatchError::TemplateMissing { .. } | BatchError::TemplateUnreadable { .. } => {
                ErrorKind::TemplateMissing
            }
            BatchError::Packaging { .. } | BatchError::DeliveryFailed { .. } => {
                ErrorKind::Packaging
            }
            BatchError::Timeout { .. } => ErrorKind::Timeout,
            BatchError::InvalidConfig(_) => ErrorKind::Config,
            BatchError::Workspace { .. }
            | BatchError::OutputWriteFailed { .. }
            | BatchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status a transport should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            BatchError::NoRenderableRecords { .. } => 422,
            _ => match self.kind() {
                ErrorKind::InputFormat => 400,
                ErrorKind::Timeout => 504,
                ErrorKind::TemplateMissing
                | ErrorKind::Packaging
                | ErrorKind::Config
                | ErrorKind::Internal => 500,
            },
        }
    }
}

/// A non-fatal error for a single note.
///
/// Stored in [`crate::output::JobOutcome`] when a render fails. The batch
/// continues unless ALL notes fail.
#[derive(Debug, Clone, Error, Serialize)]
pub enum RenderJobError {
    /// The content stream or document could not be serialised.
    #[error("Note {index}: PDF encoding failed: {detail}")]
    Encode { index: usize, detail: String },

    /// The document could not be written to scratch storage.
    #[error("Note {index}: failed to write '{path}': {detail}")]
    Write {
        index: usize,
        path: PathBuf,
        detail: String,
    },

    /// The render task panicked.
    #[error("Note {index}: render panicked: {detail}")]
    Panicked { index: usize, detail: String },

    /// The batch deadline expired before this note started.
    #[error("Note {index}: cancelled before rendering")]
    Cancelled { index: usize },
}

impl RenderJobError {
    /// The 1-based sequence index of the failed note.
    pub fn index(&self) -> usize {
        match self {
            RenderJobError::Encode { index, .. }
            | RenderJobError::Write { index, .. }
            | RenderJobError::Panicked { index, .. }
            | RenderJobError::Cancelled { index } => *index,
        }
    }
}

/// Failure to reclaim a scratch path. Logged, never returned to callers.
#[derive(Debug, Error)]
#[error("Failed to remove '{path}': {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_bad_request() {
        assert_eq!(BatchError::EmptyTable.status_code(), 400);
        assert_eq!(BatchError::EmptyTable.kind(), ErrorKind::InputFormat);
        let e = BatchError::UnreadableTable {
            detail: "zip header".into(),
        };
        assert_eq!(e.status_code(), 400);
    }

    #[test]
    fn no_renderable_records_display() {
        let e = BatchError::NoRenderableRecords {
            total: 3,
            first_error: "Note 1: cancelled before rendering".into(),
        };
        assert_eq!(e.kind(), ErrorKind::InputFormat);
        assert_eq!(e.status_code(), 422);
        assert!(e.to_string().contains("3 records"), "got: {e}");
    }

    #[test]
    fn template_and_timeout_statuses() {
        let e = BatchError::TemplateMissing {
            path: PathBuf::from("assets/x.png"),
        };
        assert_eq!(e.kind(), ErrorKind::TemplateMissing);
        assert_eq!(e.status_code(), 500);
        assert!(e.to_string().contains("assets/x.png"));

        let t = BatchError::Timeout {
            after: Duration::from_secs(30),
        };
        assert_eq!(t.status_code(), 504);
        assert!(t.to_string().contains("30s"));

        // Sub-second deadlines keep their unit.
        let t = BatchError::Timeout {
            after: Duration::from_millis(250),
        };
        assert!(t.to_string().contains("250ms"), "{t}");
    }

    #[test]
    fn render_job_error_index() {
        let e = RenderJobError::Write {
            index: 7,
            path: PathBuf::from("/tmp/usuario_7.pdf"),
            detail: "disk full".into(),
        };
        assert_eq!(e.index(), 7);
        assert!(e.to_string().starts_with("Note 7"));
        assert_eq!(RenderJobError::Cancelled { index: 2 }.index(), 2);
    }
}
