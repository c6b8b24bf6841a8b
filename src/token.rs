//! Batch tokens: unique, path-safe names for one batch's scratch storage.
//!
//! Every filesystem allocation of a batch is namespaced by its token, so
//! concurrent batches never share a path. Tokens come from an injected
//! [`BatchTokenSource`]; production code uses [`TimestampTokenSource`],
//! tests use [`SequentialTokenSource`] to get predictable paths.

use crate::error::BatchError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

/// A validated batch token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchToken(String);

impl BatchToken {
    /// Validate `raw` as a token: 1–64 chars of `[A-Za-z0-9_-]`.
    pub fn new(raw: impl Into<String>) -> Result<Self, BatchError> {
        let raw = raw.into();
        if !RE_TOKEN.is_match(&raw) {
            return Err(BatchError::InvalidConfig(format!(
                "batch token '{raw}' must be 1-64 characters of [A-Za-z0-9_-]"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces a fresh token per batch.
pub trait BatchTokenSource: Send + Sync {
    fn next_token(&self) -> BatchToken;
}

/// `<unix-millis>_<8 hex>`: wall-clock time plus a random suffix.
#[derive(Debug, Default)]
pub struct TimestampTokenSource;

impl BatchTokenSource for TimestampTokenSource {
    fn next_token(&self) -> BatchToken {
        let millis = chrono::Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4().simple().to_string();
        BatchToken(format!("{}_{}", millis, &random[..8]))
    }
}

/// `<prefix>_<n>` with `n` counting up from 1.
#[derive(Debug)]
pub struct SequentialTokenSource {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialTokenSource {
    /// # Errors
    /// [`BatchError::InvalidConfig`] if `prefix` is not token-safe.
    pub fn new(prefix: impl Into<String>) -> Result<Self, BatchError> {
        let prefix = BatchToken::new(prefix)?.0;
        Ok(Self {
            prefix,
            counter: AtomicU64::new(0),
        })
    }
}

impl BatchTokenSource for SequentialTokenSource {
    fn next_token(&self) -> BatchToken {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        BatchToken(format!("{}_{}", self.prefix, n))
    }
}
