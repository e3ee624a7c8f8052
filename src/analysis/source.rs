//! Project source loading for the analysis stages.
//!
//! The aggregator walks a project's materialised tree exactly once and
//! hands the resulting [`SourceFile`] set to every downstream stage, so no
//! stage re-walks the filesystem. Oversized files are sampled to a head
//! window; binary files keep their metadata but carry no text.

use std::path::Path;

use globset::GlobSet;
use tracing::warn;
use walkdir::WalkDir;

use crate::core::config::AnalysisConfig;
use crate::core::errors::Result;
use crate::ingest::discovery::is_ignored;

/// One project file as seen by the analysers.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the project root, `/`-separated
    pub rel_path: String,
    /// Size on disk in bytes
    pub size: u64,
    /// Decoded text content; `None` for binary payloads
    pub text: Option<String>,
    /// Whether only a head window of the file was loaded
    pub sampled: bool,
    /// Filesystem modification time, when available
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

impl SourceFile {
    /// Lowercased extension, without the dot.
    pub fn extension(&self) -> String {
        Path::new(&self.rel_path)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Basename of the file.
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    /// Whether the path looks like test code for any supported language.
    pub fn looks_like_test(&self) -> bool {
        let name = self.file_name().to_ascii_lowercase();
        let path = self.rel_path.to_ascii_lowercase();
        path.starts_with("test/")
            || path.starts_with("tests/")
            || path.contains("/test/")
            || path.contains("/tests/")
            || path.contains("/__tests__/")
            || name.starts_with("test_")
            || name.ends_with("_test.py")
            || name.ends_with(".test.js")
            || name.ends_with(".spec.js")
            || name.ends_with(".test.ts")
            || name.ends_with(".spec.ts")
            || name.ends_with(".test.tsx")
            || name.ends_with(".spec.tsx")
            || name.ends_with("test.java")
            || name.ends_with("tests.java")
            || name.ends_with("_test.cc")
            || name.ends_with("_test.cpp")
            || name.ends_with("test.cpp")
    }
}

/// Load every ingestable file under `root`, applying ignore patterns and
/// the configured size caps. Unreadable files are skipped with a
/// diagnostic rather than failing the project.
pub fn load_project_files(
    root: &Path,
    ignore: &GlobSet,
    limits: &AnalysisConfig,
    diagnostics: &mut Vec<String>,
) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable path during source load");
                diagnostics.push(format!("unreadable path: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if is_ignored(rel, ignore) {
            continue;
        }
        let rel_path = rel.to_string_lossy().replace('\\', "/");

        let metadata = entry.metadata().ok();
        let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
        let modified = metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(chrono::DateTime::<chrono::Utc>::from);
        let sampled = size > limits.max_file_bytes;
        let read_len = if sampled {
            limits.sample_bytes as usize
        } else {
            size as usize
        };

        let bytes = match read_head(entry.path(), read_len) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %rel_path, error = %err, "skipping unreadable file");
                diagnostics.push(format!("unreadable file {rel_path}: {err}"));
                continue;
            }
        };

        // Binary payloads keep metadata only; the analysers skip them.
        // Lossy decoding keeps sampled files that were cut mid-character.
        let text = if bytes.contains(&0) {
            None
        } else {
            Some(String::from_utf8_lossy(&bytes).into_owned())
        };

        files.push(SourceFile {
            rel_path,
            size,
            text,
            sampled,
            modified,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn read_head(path: &Path, len: usize) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut buf = Vec::with_capacity(len.min(1 << 20));
    let mut handle = file.by_ref().take(len as u64);
    handle.read_to_end(&mut buf)?;
    Ok(buf)
}
