//! Configuration types for batch note rendering.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. One struct holds every knob so a config can be
//! shared across concurrent batches and logged as a unit.

use crate::error::BatchError;
use crate::progress::ProgressCallback;
use crate::token::{BatchTokenSource, TimestampTokenSource};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default location of the background template image.
pub const DEFAULT_TEMPLATE_PATH: &str = "assets/nota-promissoria.png";

/// Suggested file name for the delivered archive.
pub const DEFAULT_ARCHIVE_NAME: &str = "documentos.zip";

/// Configuration for one or more batch runs.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use promissoria::BatchConfig;
/// use std::time::Duration;
///
/// let config = BatchConfig::builder()
///     .template_path("assets/nota-promissoria.png")
///     .concurrency(4)
///     .timeout(Some(Duration::from_secs(60)))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Background template image drawn under every note. Default:
    /// [`DEFAULT_TEMPLATE_PATH`].
    ///
    /// Its absence fails the batch before any rendering starts.
    pub template_path: PathBuf,

    /// Directory in which per-batch scratch directories and archives are
    /// created. Default: the OS temp dir.
    pub scratch_root: PathBuf,

    /// Maximum number of notes rendered at once. Default: 8.
    ///
    /// Each in-flight note holds an open file and a copy of the compressed
    /// template, so this bounds descriptor and memory use on large sheets.
    pub concurrency: usize,

    /// Overall deadline for rendering plus packaging. Default: 300 s.
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,

    /// Deflate level for archive entries, 1–9. Default: 9.
    pub compression_level: i64,

    /// Font size in points for every text placement. Default: 12.
    pub font_size: f32,

    /// Suggested download name for the archive. Default: [`DEFAULT_ARCHIVE_NAME`].
    pub archive_name: String,

    /// Source of batch tokens. Default: [`TimestampTokenSource`].
    pub token_source: Arc<dyn BatchTokenSource>,

    /// Optional per-note progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            scratch_root: std::env::temp_dir(),
            concurrency: 8,
            timeout: Some(Duration::from_secs(300)),
            compression_level: 9,
            font_size: 12.0,
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            token_source: Arc::new(TimestampTokenSource),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("template_path", &self.template_path)
            .field("scratch_root", &self.scratch_root)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("compression_level", &self.compression_level)
            .field("font_size", &self.font_size)
            .field("archive_name", &self.archive_name)
            .field("token_source", &"<dyn BatchTokenSource>")
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_path = path.into();
        self
    }

    pub fn scratch_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = path.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn compression_level(mut self, level: i64) -> Self {
        self.config.compression_level = level.clamp(1, 9);
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.config.font_size = size.clamp(4.0, 72.0);
        self
    }

    pub fn archive_name(mut self, name: impl Into<String>) -> Self {
        self.config.archive_name = name.into();
        self
    }

    pub fn token_source(mut self, source: Arc<dyn BatchTokenSource>) -> Self {
        self.config.token_source = source;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(BatchError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if !(1..=9).contains(&c.compression_level) {
            return Err(BatchError::InvalidConfig(format!(
                "Compression level must be 1–9, got {}",
                c.compression_level
            )));
        }
        if !c.font_size.is_finite() || c.font_size <= 0.0 {
            return Err(BatchError::InvalidConfig(format!(
                "Font size must be positive, got {}",
                c.font_size
            )));
        }
        if c.timeout == Some(Duration::ZERO) {
            return Err(BatchError::InvalidConfig(
                "Timeout must be non-zero; use None to disable it".into(),
            ));
        }
        if c.archive_name.trim().is_empty() {
            return Err(BatchError::InvalidConfig("Archive name must not be empty".into()));
        }
        Ok(self.config)
    }
}
