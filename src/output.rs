//! Result types: per-note outcomes, the batch manifest, and the delivered
//! archive.

use crate::error::{BatchError, RenderJobError};
use crate::workspace::Workspace;
use serde::Serialize;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

// ── Per-note results ─────────────────────────────────────────────────────────

/// One rendered note on scratch storage.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// 1-based sequence index; the file is `usuario_<index>.pdf`.
    pub index: usize,
    pub path: PathBuf,
    /// Size of the finished PDF.
    pub bytes: u64,
}

/// The outcome of rendering one note.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub index: usize,
    pub result: Result<Artifact, RenderJobError>,
    pub duration_ms: u64,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

// ── Manifest ─────────────────────────────────────────────────────────────────

/// Lifecycle of one batch inside the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    Pending,
    Rendering,
    /// Every note rendered.
    Completed,
    /// At least one note failed. With zero successes the batch is rejected.
    CompletedWithFailures,
}

/// One line of the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestEntry<'a> {
    pub index: usize,
    pub path: Option<&'a Path>,
    pub success: bool,
}

/// Every job outcome of a batch, ordered by sequence index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    outcomes: Vec<JobOutcome>,
}

impl Manifest {
    pub fn from_outcomes(mut outcomes: Vec<JobOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn entries(&self) -> impl Iterator<Item = ManifestEntry<'_>> {
        self.outcomes.iter().map(|o| ManifestEntry {
            index: o.index,
            path: o.result.as_ref().ok().map(|a| a.path.as_path()),
            success: o.is_success(),
        })
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// The first failure in index order, if any.
    pub fn first_error(&self) -> Option<&RenderJobError> {
        self.outcomes.iter().find_map(|o| o.result.as_ref().err())
    }

    /// `Completed` when nothing failed, `CompletedWithFailures` otherwise.
    pub fn state(&self) -> BatchState {
        if self.failed() == 0 {
            BatchState::Completed
        } else {
            BatchState::CompletedWithFailures
        }
    }
}

// ── Statistics ───────────────────────────────────────────────────────────────

/// Counters and timings of one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub total_records: usize,
    pub rendered: usize,
    pub failed: usize,
    /// Size of the finished ZIP.
    pub archive_bytes: u64,
    pub render_duration_ms: u64,
    pub package_duration_ms: u64,
    pub total_duration_ms: u64,
}

// ── Archive ──────────────────────────────────────────────────────────────────

/// A finished archive, still on scratch storage.
///
/// Delivering it with [`write_to`](Self::write_to), [`save`](Self::save) or
/// [`into_bytes`](Self::into_bytes) consumes it and reclaims the batch
/// workspace. Dropping it undelivered reclaims the workspace too.
#[derive(Debug)]
pub struct BatchArchive {
    // Declared before `workspace` so the handle closes before the files go.
    file: tokio::fs::File,
    name: String,
    entries: Vec<String>,
    stats: BatchStats,
    manifest: Manifest,
    workspace: Workspace,
}

impl BatchArchive {
    pub(crate) fn new(
        file: tokio::fs::File,
        name: String,
        entries: Vec<String>,
        stats: BatchStats,
        manifest: Manifest,
        workspace: Workspace,
    ) -> Self {
        Self {
            file,
            name,
            entries,
            stats,
            manifest,
            workspace,
        }
    }

    /// Suggested download name, e.g. `documentos.zip`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry names in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Current location of the archive file. Valid until delivery.
    pub fn path(&self) -> &Path {
        self.workspace.archive_path()
    }

    /// Stream the archive into `sink`, then reclaim the workspace.
    ///
    /// The workspace is reclaimed whether or not the copy succeeds.
    ///
    /// # Errors
    /// [`BatchError::DeliveryFailed`] if reading the archive or writing the
    /// sink fails.
    pub async fn write_to<W>(self, sink: &mut W) -> Result<u64, BatchError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let BatchArchive {
            mut file,
            mut workspace,
            ..
        } = self;

        let copied = async {
            file.seek(SeekFrom::Start(0)).await?;
            let n = tokio::io::copy(&mut file, sink).await?;
            sink.flush().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;

        drop(file);
        workspace.release().await;

        let n = copied.map_err(|e| BatchError::DeliveryFailed { source: e })?;
        debug!("Delivered {} archive bytes", n);
        Ok(n)
    }

    /// Write the archive to `dest` atomically (temp file + rename).
    pub async fn save(self, dest: impl AsRef<Path>) -> Result<BatchStats, BatchError> {
        let path = dest.as_ref();
        let stats = self.stats.clone();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BatchError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }

        let tmp_path = path.with_extension("zip.tmp");
        let mut out = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| BatchError::OutputWriteFailed {
                path: tmp_path.clone(),
                source: e,
            })?;

        if let Err(e) = self.write_to(&mut out).await {
            drop(out);
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        // Flush metadata before the rename makes the file visible.
        out.sync_all()
            .await
            .map_err(|e| BatchError::OutputWriteFailed {
                path: tmp_path.clone(),
                source: e,
            })?;
        drop(out);

        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| BatchError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        info!("Archive saved to {}", path.display());
        Ok(stats)
    }

    /// Read the whole archive into memory, then reclaim the workspace.
    pub async fn into_bytes(self) -> Result<Vec<u8>, BatchError> {
        let mut buf = Vec::with_capacity(self.stats.archive_bytes as usize);
        self.write_to(&mut buf).await?;
        Ok(buf)
    }

    /// Like [`into_bytes`](Self::into_bytes), keeping the metadata.
    pub async fn into_memory(self) -> Result<InMemoryArchive, BatchError> {
        let name = self.name.clone();
        let entries = self.entries.clone();
        let stats = self.stats.clone();
        let bytes = self.into_bytes().await?;
        Ok(InMemoryArchive {
            name,
            entries,
            stats,
            bytes,
        })
    }
}

/// A delivered archive held in memory. Returned by the blocking API.
#[derive(Debug, Clone)]
pub struct InMemoryArchive {
    pub name: String,
    pub entries: Vec<String>,
    pub stats: BatchStats,
    pub bytes: Vec<u8>,
}
