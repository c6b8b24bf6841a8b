//! Batch entry points: spreadsheet in, archive out.
//!
//! [`render_batch`] is the core operation. The other functions wrap it for
//! file paths, blocking callers, and dry runs.
//!
//! Every path through these functions either hands the caller a
//! [`BatchArchive`] (which owns the batch workspace until delivery) or
//! reclaims the workspace before returning the error.

use crate::batch::Orchestrator;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::{BatchArchive, BatchStats, InMemoryArchive, Manifest};
use crate::pipeline::archive::{self, PackagedArchive};
use crate::pipeline::normalize::{normalize, NormalizedRecord};
use crate::pipeline::parse::parse_table;
use crate::pipeline::render::{RenderJob, Template};
use crate::workspace::Workspace;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Render every row of a spreadsheet and package the notes into a ZIP.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `bytes`: Raw workbook bytes (xlsx, xls, xlsb or ods)
/// * `config`: Batch configuration
///
/// # Returns
/// `Ok(BatchArchive)` even if some notes failed (check
/// `archive.stats().failed`). Deliver it with `write_to`, `save` or
/// `into_bytes`.
///
/// # Errors
/// Returns `Err(BatchError)` only for fatal errors:
/// - Unreadable workbook, or a first sheet without data rows
/// - Background template missing or undecodable
/// - Every note failed
/// - Packaging failure or deadline exceeded
///
/// # Example
/// ```rust,no_run
/// use promissoria::{render_batch, BatchConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("notas.xlsx")?;
/// let archive = render_batch(&bytes, &BatchConfig::default()).await?;
/// println!("{} notes", archive.entries().len());
/// archive.save("documentos.zip").await?;
/// # Ok(())
/// # }
/// ```
pub async fn render_batch(
    bytes: &[u8],
    config: &BatchConfig,
) -> Result<BatchArchive, BatchError> {
    let total_start = Instant::now();
    let deadline = config.timeout.map(|t| tokio::time::Instant::now() + t);

    // ── Step 1: Parse and normalise ──────────────────────────────────────
    let records = read_records(bytes).await?;
    let total = records.len();
    info!("Starting batch: {} records", total);

    // ── Step 2: Template (checked before any scratch storage exists) ─────
    let template = load_template(&config.template_path).await?;

    // ── Step 3: Workspace ────────────────────────────────────────────────
    let token = config.token_source.next_token();
    let mut workspace = Workspace::acquire(&config.scratch_root, token).await?;

    let jobs: Vec<RenderJob> = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| RenderJob {
            index: i + 1,
            record,
            template: Arc::clone(&template),
        })
        .collect();

    // ── Step 4: Render and package ───────────────────────────────────────
    let produced = match produce(&workspace, jobs, config, deadline).await {
        Ok(p) => p,
        Err(e) => {
            workspace.release().await;
            return Err(e);
        }
    };

    let stats = BatchStats {
        total_records: total,
        rendered: produced.manifest.succeeded(),
        failed: produced.manifest.failed(),
        archive_bytes: produced.packaged.bytes,
        render_duration_ms: produced.render_duration_ms,
        package_duration_ms: produced.package_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch {} complete: {}/{} notes, {} bytes, {}ms total",
        workspace.token(),
        stats.rendered,
        total,
        stats.archive_bytes,
        stats.total_duration_ms
    );

    Ok(BatchArchive::new(
        produced.file,
        config.archive_name.clone(),
        produced.packaged.entries,
        stats,
        produced.manifest,
        workspace,
    ))
}

/// Render a spreadsheet read from `input`.
pub async fn render_batch_from_path(
    input: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchArchive, BatchError> {
    let path = input.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BatchError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            BatchError::UnreadableTable {
                detail: format!("{}: {}", path.display(), e),
            }
        }
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    render_batch(&bytes, config).await
}

/// Render a spreadsheet and write the archive directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn render_batch_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchStats, BatchError> {
    let archive = render_batch_from_path(input, config).await?;
    archive.save(output_path).await
}

/// Synchronous wrapper around [`render_batch`].
///
/// Creates a temporary tokio runtime internally and returns the archive
/// fully read into memory.
pub fn render_batch_sync(
    bytes: &[u8],
    config: &BatchConfig,
) -> Result<InMemoryArchive, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(async {
            let archive = render_batch(bytes, config).await?;
            archive.into_memory().await
        })
}

/// Parse and normalise a spreadsheet without rendering anything.
///
/// Does not need the background template.
pub async fn preview(bytes: &[u8]) -> Result<Vec<NormalizedRecord>, BatchError> {
    read_records(bytes).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Produced {
    manifest: Manifest,
    packaged: PackagedArchive,
    file: tokio::fs::File,
    render_duration_ms: u64,
    package_duration_ms: u64,
}

async fn read_records(bytes: &[u8]) -> Result<Vec<NormalizedRecord>, BatchError> {
    let owned = bytes.to_vec();
    let records = tokio::task::spawn_blocking(move || {
        parse_table(&owned).map(|raw| raw.iter().map(normalize).collect::<Vec<_>>())
    })
    .await
    .map_err(|e| BatchError::Internal(format!("Parse task panicked: {}", e)))??;

    if records.is_empty() {
        return Err(BatchError::EmptyTable);
    }
    Ok(records)
}

async fn load_template(path: &Path) -> Result<Arc<Template>, BatchError> {
    let path = path.to_path_buf();
    let template = tokio::task::spawn_blocking(move || Template::load(&path))
        .await
        .map_err(|e| BatchError::Internal(format!("Template task panicked: {}", e)))??;
    Ok(Arc::new(template))
}

/// Everything that happens inside the workspace. The caller releases the
/// workspace if this fails.
async fn produce(
    workspace: &Workspace,
    jobs: Vec<RenderJob>,
    config: &BatchConfig,
    deadline: Option<tokio::time::Instant>,
) -> Result<Produced, BatchError> {
    let render_start = Instant::now();
    let mut orchestrator = Orchestrator::new(config);
    let manifest = orchestrator.run(jobs, workspace, deadline).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let package_start = Instant::now();
    let archive_path = workspace.archive_path().to_path_buf();
    let packaging_err = |e: std::io::Error| BatchError::Packaging {
        path: archive_path.clone(),
        detail: e.to_string(),
    };

    let file = tokio::fs::File::create(&archive_path)
        .await
        .map_err(packaging_err)?
        .into_std()
        .await;

    let scratch = workspace.scratch_dir().to_path_buf();
    let target = archive_path.clone();
    let level = config.compression_level;
    let mut handle =
        tokio::task::spawn_blocking(move || archive::package(&scratch, file, &target, level));

    let joined = match deadline {
        Some(at) => match tokio::time::timeout_at(at, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                // Let the writer finish before the caller deletes its files.
                let _ = handle.await;
                return Err(BatchError::Timeout {
                    after: config.timeout.unwrap_or_default(),
                });
            }
        },
        None => handle.await,
    };
    let packaged = joined
        .map_err(|e| BatchError::Internal(format!("Packaging task panicked: {}", e)))??;
    let package_duration_ms = package_start.elapsed().as_millis() as u64;

    debug!(
        "Packaged {} entries into {} ({} bytes)",
        packaged.entries.len(),
        archive_path.display(),
        packaged.bytes
    );

    let file = tokio::fs::File::open(&archive_path)
        .await
        .map_err(packaging_err)?;

    Ok(Produced {
        manifest,
        packaged,
        file,
        render_duration_ms,
        package_duration_ms,
    })
}
