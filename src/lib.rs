//! # promissoria
//!
//! Render promissory notes (*notas promissórias*) in bulk: one spreadsheet
//! row becomes one fixed-layout PDF drawn over a scanned form, and the whole
//! batch comes back as a single ZIP.
//!
//! ## Pipeline Overview
//!
//! ```text
//! workbook bytes
//!  │
//!  ├─ 1. Parse      first sheet → raw records (calamine)
//!  ├─ 2. Normalise  placeholders + amount in words (extenso)
//!  ├─ 3. Workspace  per-batch scratch dir scoped to a batch token
//!  ├─ 4. Render     bounded pool of blocking lopdf renders, join-all
//!  ├─ 5. Package    scratch dir → ZIP, streamed file by file
//!  └─ 6. Deliver    archive handed to the caller, workspace reclaimed
//! ```
//!
//! A note that fails to render is left out of the archive; its siblings
//! still ship. A batch where nothing renders is an error. Scratch storage is
//! reclaimed on every path, including timeouts and panics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use promissoria::{render_batch_from_path, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .template_path("assets/nota-promissoria.png")
//!         .concurrency(4)
//!         .build()?;
//!     let archive = render_batch_from_path("notas.xlsx", &config).await?;
//!     eprintln!("{} notes, {} failed", archive.stats().rendered, archive.stats().failed);
//!     archive.save("documentos.zip").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `promissoria` binary (clap + anyhow + indicatif + tracing-subscriber + serde_json) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! promissoria = { version = "0.1", default-features = false }
//! ```
//!
//! ## Input Columns
//!
//! All optional and case-sensitive: `id`, `Vencimento`, `Valor`,
//! `NomeRecebedor`, `CPFRecebedor`, `Cidade`, `NomeEmitente`, `Emissao`,
//! `CPFEmitente`, `Endereco`. Anything else is ignored.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod token;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::Orchestrator;
pub use config::{BatchConfig, BatchConfigBuilder};
pub use error::{BatchError, CleanupError, ErrorKind, RenderJobError};
pub use generate::{
    preview, render_batch, render_batch_from_path, render_batch_sync, render_batch_to_file,
};
pub use output::{
    Artifact, BatchArchive, BatchState, BatchStats, InMemoryArchive, JobOutcome, Manifest,
    ManifestEntry,
};
pub use pipeline::normalize::NormalizedRecord;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use token::{BatchToken, BatchTokenSource, SequentialTokenSource, TimestampTokenSource};
pub use workspace::Workspace;
