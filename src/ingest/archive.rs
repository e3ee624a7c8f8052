//! Archive extraction.
//!
//! Accepts one uploaded ZIP, extracts it into scratch space, and reports
//! the content root. Extraction is the trust boundary for uploads: size and
//! entry caps are enforced here and entry paths are validated so an archive
//! can never write outside its scratch directory.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::core::config::IngestConfig;
use crate::core::errors::{CodefolioError, Result};

/// An archive extracted into scratch space. Dropping this removes the
/// scratch directory, so keep it alive for the duration of ingest and
/// any same-pass analysis.
#[derive(Debug)]
pub struct ExtractedArchive {
    scratch: TempDir,
    /// Relative path of the content root inside the archive ("" when files
    /// sit at the top level)
    pub content_root: String,
    /// Cumulative uncompressed size of extracted files
    pub uncompressed_bytes: u64,
    /// Number of files extracted
    pub file_count: usize,
    /// Per-path extraction problems that were skipped over
    pub diagnostics: Vec<String>,
}

impl ExtractedArchive {
    /// Absolute path of the content root on disk.
    pub fn content_path(&self) -> PathBuf {
        if self.content_root.is_empty() {
            self.scratch.path().to_path_buf()
        } else {
            self.scratch.path().join(&self.content_root)
        }
    }

    /// Scratch directory root (above the content root).
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

/// Extract a ZIP archive under the configured limits.
///
/// Fails with `InvalidArchive` when the file is not a well-formed ZIP and
/// `ArchiveTooLarge` when the cumulative uncompressed size exceeds the
/// cap. Both are fatal for the upload.
pub async fn extract_archive(
    archive_path: impl Into<PathBuf>,
    limits: &IngestConfig,
) -> Result<ExtractedArchive> {
    let archive_path = archive_path.into();
    let limits = limits.clone();

    tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &limits))
        .await
        .map_err(|e| CodefolioError::internal(format!("extraction task panicked: {e}")))?
}

fn extract_blocking(archive_path: &Path, limits: &IngestConfig) -> Result<ExtractedArchive> {
    let file = File::open(archive_path).map_err(|e| {
        CodefolioError::io(format!("opening archive {}", archive_path.display()), e)
    })?;

    let mut archive = ZipArchive::new(file)?;

    if archive.len() > limits.max_entries {
        return Err(CodefolioError::invalid_archive(format!(
            "archive has {} entries, limit is {}",
            archive.len(),
            limits.max_entries
        )));
    }

    let scratch = TempDir::new()
        .map_err(|e| CodefolioError::io("creating extraction scratch directory", e))?;

    let mut uncompressed_bytes: u64 = 0;
    let mut file_count = 0usize;
    let mut diagnostics = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;

        // enclosed_name rejects absolute paths and `..` traversal.
        let Some(rel_path) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(name = entry.name(), "skipping archive entry with unsafe path");
            diagnostics.push(format!("unsafe entry path skipped: {}", entry.name()));
            continue;
        };

        if entry.is_dir() {
            continue;
        }

        uncompressed_bytes = uncompressed_bytes.saturating_add(entry.size());
        if uncompressed_bytes > limits.max_archive_bytes {
            return Err(CodefolioError::ArchiveTooLarge {
                actual_bytes: uncompressed_bytes,
                limit_bytes: limits.max_archive_bytes,
            });
        }

        let target = scratch.path().join(&rel_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CodefolioError::io("creating extraction directory", e))?;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        match entry.read_to_end(&mut bytes) {
            Ok(_) => {
                std::fs::write(&target, &bytes).map_err(|e| {
                    CodefolioError::io(format!("writing {}", target.display()), e)
                })?;
                file_count += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(path = %rel_path.display(), "permission denied reading entry, skipping");
                diagnostics.push(format!("permission denied: {}", rel_path.display()));
            }
            Err(e) => {
                return Err(CodefolioError::invalid_archive(format!(
                    "failed to read entry {}: {e}",
                    rel_path.display()
                )));
            }
        }
    }

    let content_root = detect_content_root(scratch.path())?;
    info!(
        files = file_count,
        bytes = uncompressed_bytes,
        content_root = %content_root,
        "archive extracted"
    );

    Ok(ExtractedArchive {
        scratch,
        content_root,
        uncompressed_bytes,
        file_count,
        diagnostics,
    })
}

/// A single wrapping top-level directory is the content root; anything
/// else means the archive's own top level is the root.
fn detect_content_root(scratch: &Path) -> Result<String> {
    let mut top_level = std::fs::read_dir(scratch)
        .map_err(|e| CodefolioError::io("reading extraction root", e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| CodefolioError::io("reading extraction root entries", e))?;

    if top_level.len() == 1 {
        let only = top_level.remove(0);
        if only.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            let name = only.file_name().to_string_lossy().into_owned();
            debug!(root = %name, "archive wraps a single top-level directory");
            return Ok(name);
        }
    }

    Ok(String::new())
}
