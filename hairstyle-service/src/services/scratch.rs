//! Per-request on-disk copy of an uploaded image.
//!
//! The file is deleted when the guard is released (on the blocking pool) or
//! dropped, so every exit path of a request cleans up. Deletion failures are
//! logged and swallowed.

use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("Scratch storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scratch storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
pub struct ScratchImage {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl ScratchImage {
    /// Write `bytes` to a fresh file under `dir`.
    pub async fn stage(dir: &Path, bytes: Vec<u8>) -> Result<Self, ScratchError> {
        let dir = dir.to_path_buf();

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            use std::io::Write;

            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await??;

        let path = file.path().to_path_buf();
        tracing::debug!(path = %path.display(), "Staged upload in scratch storage");

        Ok(Self {
            file: Some(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>, ScratchError> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    /// Delete the file on the blocking pool instead of waiting for drop.
    pub async fn release(mut self) {
        let Some(file) = self.file.take() else {
            return;
        };

        let result = tokio::task::spawn_blocking(move || file.close())
            .await
            .map_err(ScratchError::from)
            .and_then(|closed| closed.map_err(ScratchError::from));
        log_removal(&self.path, result);
    }
}

fn log_removal(path: &Path, result: Result<(), ScratchError>) {
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "Released scratch file"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to delete scratch file"
        ),
    }
}

impl Drop for ScratchImage {
    /// Early-return fallback. Unlinks inline so the file is gone with the guard.
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            log_removal(&self.path, file.close().map_err(ScratchError::from));
        }
    }
}
