//! File helpers for generated configuration.
//!
//! Removal is idempotent: a missing file or directory is not an error.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::ControlResult;

/// Write `contents`, creating parent directories as needed.
pub async fn save(path: &Path, contents: &str) -> ControlResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

pub async fn remove_file(path: &Path) -> ControlResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub async fn remove_dir(path: &Path) -> ControlResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn exists(path: &Path) -> ControlResult<bool> {
    Ok(tokio::fs::try_exists(path).await?)
}

pub async fn rename(from: &Path, to: &Path) -> ControlResult<()> {
    tokio::fs::rename(from, to).await?;
    Ok(())
}
