//! Per-batch scratch storage with guaranteed release.
//!
//! A [`Workspace`] owns two paths under the scratch root, both namespaced by
//! the batch token:
//!
//! ```text
//! <root>/pdfs_<token>/        rendered notes (usuario_N.pdf)
//! <root>/pdfs_<token>.zip     the packaged archive
//! ```
//!
//! Release removes both. It is idempotent, tolerates either path already
//! being gone, and runs from `Drop` if the owner never awaited
//! [`Workspace::release`], so early returns and panics still reclaim storage.

use crate::error::{BatchError, CleanupError};
use crate::token::BatchToken;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scratch directory plus archive path for one batch.
#[derive(Debug)]
pub struct Workspace {
    token: BatchToken,
    scratch_dir: PathBuf,
    archive_path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Allocate the scratch directory for `token` under `root`.
    ///
    /// `root` is created if needed. The scratch directory itself is created
    /// exclusively: an existing directory means two batches drew the same
    /// token, which is reported rather than shared.
    ///
    /// # Errors
    /// [`BatchError::Workspace`] if either directory cannot be created.
    pub async fn acquire(root: &Path, token: BatchToken) -> Result<Self, BatchError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| BatchError::Workspace {
                path: root.to_path_buf(),
                source: e,
            })?;

        let scratch_dir = root.join(format!("pdfs_{token}"));
        let archive_path = root.join(format!("pdfs_{token}.zip"));

        tokio::fs::create_dir(&scratch_dir)
            .await
            .map_err(|e| BatchError::Workspace {
                path: scratch_dir.clone(),
                source: e,
            })?;

        debug!("Workspace acquired: {}", scratch_dir.display());
        Ok(Self {
            token,
            scratch_dir,
            archive_path,
            released: false,
        })
    }

    pub fn token(&self) -> &BatchToken {
        &self.token
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Destination of note `index` (1-based) inside the scratch directory.
    pub fn artifact_path(&self, index: usize) -> PathBuf {
        self.scratch_dir.join(artifact_file_name(index))
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the scratch directory and the archive file.
    ///
    /// Safe to call any number of times. Failures are logged as
    /// [`CleanupError`] and never returned.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        log_cleanup(
            &self.scratch_dir,
            tokio::fs::remove_dir_all(&self.scratch_dir).await,
        );
        log_cleanup(
            &self.archive_path,
            tokio::fs::remove_file(&self.archive_path).await,
        );
        debug!("Workspace released: {}", self.token);
    }

    fn release_blocking(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        log_cleanup(&self.scratch_dir, std::fs::remove_dir_all(&self.scratch_dir));
        log_cleanup(&self.archive_path, std::fs::remove_file(&self.archive_path));
        debug!("Workspace released on drop: {}", self.token);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release_blocking();
    }
}

/// `usuario_<index>.pdf`
pub fn artifact_file_name(index: usize) -> String {
    format!("usuario_{index}.pdf")
}

fn log_cleanup(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            let err = CleanupError {
                path: path.to_path_buf(),
                source: e,
            };
            warn!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{BatchTokenSource, SequentialTokenSource};

    fn token(name: &str) -> BatchToken {
        BatchToken::new(name).unwrap()
    }

    #[tokio::test]
    async fn acquire_creates_scratch_dir_scoped_to_token() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::acquire(root.path(), token("abc_1")).await.unwrap();

        assert!(ws.scratch_dir().is_dir());
        assert_eq!(ws.scratch_dir(), root.path().join("pdfs_abc_1"));
        assert_eq!(ws.archive_path(), root.path().join("pdfs_abc_1.zip"));
        assert!(!ws.archive_path().exists());
        assert_eq!(ws.artifact_path(3), root.path().join("pdfs_abc_1/usuario_3.pdf"));
    }

    #[tokio::test]
    async fn acquire_creates_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let ws = Workspace::acquire(&nested, token("t")).await.unwrap();
        assert!(ws.scratch_dir().starts_with(&nested));
    }

    #[tokio::test]
    async fn token_collision_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let _first = Workspace::acquire(root.path(), token("same")).await.unwrap();
        let err = Workspace::acquire(root.path(), token("same"))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Workspace { .. }));
    }

    #[tokio::test]
    async fn release_removes_everything_and_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let source = SequentialTokenSource::new("rel").unwrap();
        let mut ws = Workspace::acquire(root.path(), source.next_token())
            .await
            .unwrap();

        std::fs::write(ws.artifact_path(1), b"%PDF-1.5").unwrap();
        std::fs::write(ws.archive_path(), b"PK").unwrap();

        ws.release().await;
        assert!(ws.is_released());
        assert!(!ws.scratch_dir().exists());
        assert!(!ws.archive_path().exists());

        ws.release().await;
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn release_tolerates_paths_already_gone() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::acquire(root.path(), token("gone")).await.unwrap();
        std::fs::remove_dir(ws.scratch_dir()).unwrap();
        ws.release().await;
        assert!(ws.is_released());
    }

    #[tokio::test]
    async fn drop_releases_when_never_awaited() {
        let root = tempfile::tempdir().unwrap();
        let scratch;
        {
            let ws = Workspace::acquire(root.path(), token("dropped")).await.unwrap();
            std::fs::write(ws.artifact_path(1), b"x").unwrap();
            scratch = ws.scratch_dir().to_path_buf();
        }
        assert!(!scratch.exists());
    }
}
