//! Scratch directory → ZIP archive.
//!
//! The packager trusts the filesystem rather than the manifest: whatever
//! finished `*.pdf` files sit in the scratch directory are the notes that
//! rendered. Renders write through temp files, so a failed note never
//! contributes a partial entry.
//!
//! Entries stream file-by-file into the archive; neither the notes nor the
//! ZIP are held in memory as a whole.

use crate::error::BatchError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

static RE_ARTIFACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^usuario_(\d+)\.pdf$").unwrap());

/// Summary of a written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    /// Entry names in archive order.
    pub entries: Vec<String>,
    /// Size of the archive file.
    pub bytes: u64,
}

/// List the finished PDFs in `dir`, in note order.
///
/// `usuario_N.pdf` files sort by N; any other `*.pdf` sorts after them by
/// name. Directories and non-PDF files (temp files included) are skipped.
pub fn collect_artifacts(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found: Vec<(usize, String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.ends_with(".pdf") {
            continue;
        }
        let order = RE_ARTIFACT
            .captures(&name)
            .and_then(|c| c[1].parse::<usize>().ok())
            .unwrap_or(usize::MAX);
        found.push((order, name, entry.path()));
    }
    found.sort();
    Ok(found.into_iter().map(|(_, _, path)| path).collect())
}

/// Write `files` into a ZIP on `writer`, each under its bare file name.
///
/// Returns the entry names and the finished writer.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    files: &[PathBuf],
    level: i64,
) -> zip::result::ZipResult<(Vec<String>, W)> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    let mut zip = ZipWriter::new(writer);
    let mut entries = Vec::with_capacity(files.len());

    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("non UTF-8 file name: {}", path.display()),
                )
            })?
            .to_string();

        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
        entries.push(name);
    }

    let writer = zip.finish()?;
    Ok((entries, writer))
}

/// Package every finished PDF in `scratch_dir` into `archive`.
///
/// `archive` is the already created file at `archive_path`; it is flushed,
/// synced and closed before this returns.
///
/// This is blocking; call it from `spawn_blocking`.
///
/// # Errors
/// [`BatchError::Packaging`] on any read, compression or write fault.
pub fn package(
    scratch_dir: &Path,
    archive: File,
    archive_path: &Path,
    level: i64,
) -> Result<PackagedArchive, BatchError> {
    let fail = |detail: String| BatchError::Packaging {
        path: archive_path.to_path_buf(),
        detail,
    };

    let files = collect_artifacts(scratch_dir).map_err(|e| fail(e.to_string()))?;
    debug!(
        "Packaging {} files from {}",
        files.len(),
        scratch_dir.display()
    );

    let (entries, writer) =
        write_archive(BufWriter::new(archive), &files, level).map_err(|e| fail(e.to_string()))?;

    let file = writer.into_inner().map_err(|e| fail(e.error().to_string()))?;
    file.sync_all().map_err(|e| fail(e.to_string()))?;
    let bytes = file.metadata().map_err(|e| fail(e.to_string()))?.len();

    Ok(PackagedArchive { entries, bytes })
}
