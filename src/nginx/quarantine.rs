//! Sweep for quarantined files.
//!
//! Quarantined files are never restored automatically: the next successful
//! build of the same resource clears them. The sweep makes them visible.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ControlResult;
use crate::nginx::layout::{ConfLayout, QUARANTINE_SUFFIX};
use crate::observability::metrics;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuarantineReport {
    pub files: Vec<PathBuf>,
}

impl QuarantineReport {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// List every quarantined file under the generated roots, log each one and
/// publish the count.
pub async fn sweep(layout: &ConfLayout) -> ControlResult<QuarantineReport> {
    let mut files = Vec::new();
    for root in layout.roots() {
        collect(root, &mut files).await?;
    }
    files.sort();

    for file in &files {
        tracing::error!(file = %file.display(), "Quarantined configuration file outstanding");
    }
    metrics::record_quarantined_files(files.len());

    Ok(QuarantineReport { files })
}

/// Quarantined files directly in `root` and one level below it.
async fn collect(root: &Path, out: &mut Vec<PathBuf>) -> ControlResult<()> {
    let mut pending = vec![(root.to_path_buf(), 0u8)];

    while let Some((dir, depth)) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                if depth == 0 {
                    pending.push((path, depth + 1));
                }
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(QUARANTINE_SUFFIX))
            {
                out.push(path);
            }
        }
    }
    Ok(())
}
