//! Project-root discovery inside an extracted workspace.
//!
//! Walks the content root top-down looking for version-control metadata or
//! recognised manifests. A discovered root shadows its descendants, so
//! nested projects (vendored checkouts, example apps with their own
//! manifests) are not emitted separately.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::errors::{CodefolioError, Result};

/// Version-control metadata directories that mark a project root.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Manifest filenames that mark a project root, across the supported
/// language ecosystems.
const MANIFEST_FILES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "setup.py",
    "requirements.txt",
    "Pipfile",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "CMakeLists.txt",
    "Makefile",
    "composer.json",
    "Gemfile",
];

/// A discovered sub-project candidate, before merge resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCandidate {
    /// Display name derived from the root directory basename
    pub name: String,
    /// Path relative to the workspace content root ("" for the root itself)
    pub rel_path: String,
    /// Files under the root, ignore patterns applied
    pub file_count: usize,
    /// Whether the root carries version-control metadata
    pub has_git: bool,
}

/// Compile ignore globs into a matcher. Invalid patterns are
/// configuration errors.
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|err| {
                CodefolioError::config(format!("Invalid ignore pattern '{pattern}': {err}"))
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| CodefolioError::config(format!("Failed to build ignore set: {err}")))
}

/// Whether a relative path is excluded by the active ignore set. VCS
/// internals are always excluded from artifact ingestion.
pub fn is_ignored(rel_path: &Path, ignore: &GlobSet) -> bool {
    if rel_path
        .components()
        .any(|c| VCS_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
    {
        return true;
    }
    ignore.is_match(rel_path)
}

/// Discover project roots under `content_path`.
///
/// A directory is a project root when it carries VCS metadata or a
/// recognised manifest. Discovered roots prune their subtrees. When
/// nothing qualifies, the content root itself is the single project.
pub fn discover_projects(content_path: &Path, ignore: &GlobSet) -> Result<Vec<ProjectCandidate>> {
    let mut roots: Vec<PathBuf> = Vec::new();

    let mut walker = WalkDir::new(content_path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // Unreadable paths are skipped, not fatal.
                warn!(error = %err, "skipping unreadable path during discovery");
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.path();
        let rel = dir.strip_prefix(content_path).unwrap_or(dir);

        // Never descend into VCS internals or ignored trees.
        if rel.components().count() > 0 && is_ignored(rel, ignore) {
            walker.skip_current_dir();
            continue;
        }

        if is_project_root(dir) {
            debug!(root = %rel.display(), "discovered project root");
            roots.push(dir.to_path_buf());
            // Shadow descendants: nested roots are not emitted.
            walker.skip_current_dir();
        }
    }

    if roots.is_empty() {
        roots.push(content_path.to_path_buf());
    }

    let mut candidates = Vec::with_capacity(roots.len());
    for root in roots {
        candidates.push(candidate_for_root(content_path, &root, ignore));
    }
    candidates.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(candidates)
}

fn is_project_root(dir: &Path) -> bool {
    VCS_DIRS.iter().any(|vcs| dir.join(vcs).is_dir())
        || MANIFEST_FILES
            .iter()
            .any(|manifest| dir.join(manifest).is_file())
}

fn candidate_for_root(content_path: &Path, root: &Path, ignore: &GlobSet) -> ProjectCandidate {
    let rel_path = root
        .strip_prefix(content_path)
        .unwrap_or_else(|_| Path::new(""))
        .to_string_lossy()
        .replace('\\', "/");

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());

    let has_git = VCS_DIRS.iter().any(|vcs| root.join(vcs).is_dir());

    let mut file_count = 0usize;
    for entry in WalkDir::new(root).follow_links(false) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if !is_ignored(rel, ignore) {
            file_count += 1;
        }
    }

    ProjectCandidate {
        name,
        rel_path,
        file_count,
        has_git,
    }
}

/// Enumerate the ingestable files under a project root: relative path plus
/// absolute path, ignore patterns applied, sorted by relative path.
pub fn project_files(root: &Path, ignore: &GlobSet) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if is_ignored(rel, ignore) {
            continue;
        }
        files.push((
            rel.to_string_lossy().replace('\\', "/"),
            entry.path().to_path_buf(),
        ));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn empty_ignore() -> GlobSet {
        build_ignore_set(&[]).unwrap()
    }

    #[test]
    fn test_manifest_marks_project_root() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "api/package.json");
        touch(dir.path(), "api/index.js");
        touch(dir.path(), "worker/pyproject.toml");
        touch(dir.path(), "worker/main.py");

        let candidates = discover_projects(dir.path(), &empty_ignore()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "api");
        assert_eq!(candidates[0].file_count, 2);
        assert_eq!(candidates[1].name, "worker");
    }

    #[test]
    fn test_nested_roots_are_shadowed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app/Cargo.toml");
        touch(dir.path(), "app/src/main.rs");
        touch(dir.path(), "app/vendor/dep/Cargo.toml");

        let candidates = discover_projects(dir.path(), &empty_ignore()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "app");
    }

    #[test]
    fn test_no_roots_falls_back_to_content_root() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "scratch/ideas.md");

        let candidates = discover_projects(dir.path(), &empty_ignore()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rel_path, "");
        assert_eq!(candidates[0].file_count, 2);
    }

    #[test]
    fn test_git_dir_marks_root_and_sets_flag() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("legacy/.git")).unwrap();
        touch(dir.path(), "legacy/.git/HEAD");
        touch(dir.path(), "legacy/main.c");

        let candidates = discover_projects(dir.path(), &empty_ignore()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].has_git);
        // VCS internals never count as artifacts.
        assert_eq!(candidates[0].file_count, 1);
    }

    #[test]
    fn test_ignore_patterns_excluded_from_file_count() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app/package.json");
        touch(dir.path(), "app/index.js");
        touch(dir.path(), "app/node_modules/left-pad/index.js");

        let ignore = build_ignore_set(&["**/node_modules/**".to_string()]).unwrap();
        let candidates = discover_projects(dir.path(), &ignore).unwrap();
        assert_eq!(candidates[0].file_count, 2);
    }

    #[test]
    fn test_project_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.py");
        touch(dir.path(), "a.py");
        touch(dir.path(), "__pycache__/a.pyc");

        let ignore = build_ignore_set(&["**/__pycache__/**".to_string()]).unwrap();
        let files = project_files(dir.path(), &ignore);
        let names: Vec<&str> = files.iter().map(|(rel, _)| rel.as_str()).collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
    }
}
