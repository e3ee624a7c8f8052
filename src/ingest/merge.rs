//! Incremental merge engine.
//!
//! Associates discovered candidates with existing projects (via the
//! caller-supplied mapping) or creates new ones, then merges file sets
//! into the content store with latest-wins semantics per
//! `(project, rel_path)`. Replaying the same upload is a no-op.

use std::collections::HashMap;

use chrono::Utc;
use globset::GlobSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::errors::{CodefolioError, Result};
use crate::core::model::{ArtifactSource, ContentCategory, ContentMeta, FileEntry, Project, Upload};
use crate::ingest::archive::ExtractedArchive;
use crate::ingest::discovery::{discover_projects, project_files, ProjectCandidate};
use crate::store::content::ContentStore;
use crate::store::repository::Repository;

/// Result of ingesting one archive.
#[derive(Debug)]
pub struct IngestOutcome {
    /// The upload row recorded for this archive
    pub upload: Upload,
    /// Per-project merge results, in discovery order
    pub projects: Vec<MergedProject>,
    /// Non-fatal problems encountered during the merge
    pub diagnostics: Vec<String>,
}

/// One project's view of an ingest.
#[derive(Debug)]
pub struct MergedProject {
    /// The created or updated project row
    pub project: Project,
    /// Files added or modified by this upload
    pub added_or_modified: usize,
    /// Total files now in the project
    pub total_files: usize,
    /// Whether this upload created the project
    pub created: bool,
}

/// Ingest an extracted archive: discover candidates, resolve the mapping,
/// and merge each candidate's files.
pub async fn ingest_archive<R: Repository>(
    repo: &R,
    content: &ContentStore,
    extracted: &ExtractedArchive,
    filename: &str,
    archive_byte_size: u64,
    project_mapping: &HashMap<String, Uuid>,
    ignore: &GlobSet,
) -> Result<IngestOutcome> {
    let content_path = extracted.content_path();
    let candidates = discover_projects(&content_path, ignore)?;

    validate_mapping(&candidates, project_mapping)?;

    let upload = repo
        .create_upload(Upload {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            byte_size: archive_byte_size,
            content_root: extracted.content_root.clone(),
            uploaded_at: Utc::now(),
        })
        .await?;

    let mut diagnostics: Vec<String> = extracted.diagnostics.clone();
    let mut merged = Vec::with_capacity(candidates.len());

    for candidate in &candidates {
        let outcome = merge_candidate(
            repo,
            content,
            &content_path,
            candidate,
            project_mapping,
            &upload,
            ignore,
            &mut diagnostics,
        )
        .await?;
        merged.push(outcome);
    }

    info!(
        upload = %upload.id,
        projects = merged.len(),
        "archive ingest complete"
    );

    Ok(IngestOutcome {
        upload,
        projects: merged,
        diagnostics,
    })
}

/// A mapped name must resolve to exactly one candidate.
fn validate_mapping(
    candidates: &[ProjectCandidate],
    mapping: &HashMap<String, Uuid>,
) -> Result<()> {
    for name in mapping.keys() {
        let hits: Vec<&ProjectCandidate> =
            candidates.iter().filter(|c| &c.name == name).collect();
        if hits.len() > 1 {
            return Err(CodefolioError::ambiguous_mapping(
                format!(
                    "mapping target '{name}' matches {} discovered candidates",
                    hits.len()
                ),
                hits.iter().map(|c| c.rel_path.clone()).collect(),
            ));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn merge_candidate<R: Repository>(
    repo: &R,
    content: &ContentStore,
    content_path: &std::path::Path,
    candidate: &ProjectCandidate,
    mapping: &HashMap<String, Uuid>,
    upload: &Upload,
    ignore: &GlobSet,
    diagnostics: &mut Vec<String>,
) -> Result<MergedProject> {
    let (mut project, created) = match mapping.get(&candidate.name) {
        Some(existing_id) => {
            let project = repo.get_project(*existing_id).await?;
            debug!(project = %project.id, candidate = %candidate.name, "appending to mapped project");
            (project, false)
        }
        None => {
            let project = repo
                .create_project(Project::new(&candidate.name, &candidate.rel_path))
                .await?;
            debug!(project = %project.id, "created project for candidate");
            (project, true)
        }
    };

    let root = if candidate.rel_path.is_empty() {
        content_path.to_path_buf()
    } else {
        content_path.join(&candidate.rel_path)
    };

    let existing: HashMap<String, String> = repo
        .file_entries(project.id)
        .await?
        .into_iter()
        .map(|e| (e.rel_path, e.content_hash))
        .collect();

    let mut added_or_modified = 0usize;
    for (rel_path, abs_path) in project_files(&root, ignore) {
        let bytes = match std::fs::read(&abs_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                warn!(path = %abs_path.display(), "permission denied, skipping file");
                diagnostics.push(format!("permission denied: {rel_path}"));
                continue;
            }
            Err(e) => {
                warn!(path = %abs_path.display(), error = %e, "unreadable file, skipping");
                diagnostics.push(format!("unreadable file {rel_path}: {e}"));
                continue;
            }
        };

        let hash = content.put(&bytes).await?;
        repo.record_content(ContentMeta {
            hash: hash.clone(),
            byte_size: bytes.len() as u64,
            category: ContentCategory::from_path(&rel_path),
        })
        .await?;

        match existing.get(&rel_path) {
            // Unchanged file under the same path: dedup, no-op.
            Some(prior) if prior == &hash => {}
            _ => {
                repo.upsert_file_entry(FileEntry {
                    project_id: project.id,
                    rel_path: rel_path.clone(),
                    content_hash: hash,
                })
                .await?;
                added_or_modified += 1;
            }
        }
    }

    repo.record_artifact_source(ArtifactSource {
        project_id: project.id,
        upload_id: upload.id,
        artifact_count: added_or_modified,
    })
    .await?;

    let total_files = repo.file_entries(project.id).await?.len();
    if !created {
        project = repo.get_project(project.id).await?;
    }

    Ok(MergedProject {
        project,
        added_or_modified,
        total_files,
        created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::IngestConfig;
    use crate::ingest::archive::extract_archive;
    use crate::ingest::discovery::build_ignore_set;
    use crate::store::memory::MemoryRepository;
    use crate::store::repository::{FileStore, ProjectStore};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_zip(files: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut writer = zip::ZipWriter::new(tmp.reopen().unwrap());
        for (name, bytes) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
        tmp
    }

    async fn ingest(
        repo: &MemoryRepository,
        content: &ContentStore,
        files: &[(&str, &[u8])],
        mapping: HashMap<String, Uuid>,
    ) -> IngestOutcome {
        let zip = write_zip(files);
        let extracted = extract_archive(zip.path(), &IngestConfig::default())
            .await
            .unwrap();
        let ignore = build_ignore_set(&[]).unwrap();
        ingest_archive(repo, content, &extracted, "upload.zip", 0, &mapping, &ignore)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_project_ingest() {
        let repo = MemoryRepository::new();
        let dir = TempDir::new().unwrap();
        let content = ContentStore::new(dir.path());

        let outcome = ingest(
            &repo,
            &content,
            &[
                ("demo/main.py", b"print('hello')\n" as &[u8]),
                ("demo/README.md", b"# Demo\n"),
            ],
            HashMap::new(),
        )
        .await;

        assert_eq!(outcome.projects.len(), 1);
        let merged = &outcome.projects[0];
        assert!(merged.created);
        assert_eq!(merged.project.name, "demo");
        assert_eq!(merged.total_files, 2);
        assert_eq!(merged.added_or_modified, 2);
    }

    #[tokio::test]
    async fn test_incremental_merge_dedupes_unchanged() {
        let repo = MemoryRepository::new();
        let dir = TempDir::new().unwrap();
        let content = ContentStore::new(dir.path());

        let first = ingest(
            &repo,
            &content,
            &[
                ("demo/main.py", b"print('hello')\n" as &[u8]),
                ("demo/util.py", b"def util(): pass\n"),
            ],
            HashMap::new(),
        )
        .await;
        let project_id = first.projects[0].project.id;

        let mapping: HashMap<String, Uuid> =
            [("demo".to_string(), project_id)].into_iter().collect();
        let second = ingest(
            &repo,
            &content,
            &[
                ("demo/main.py", b"print('hello')\n" as &[u8]),
                ("demo/api.py", b"def api(): pass\n"),
            ],
            mapping,
        )
        .await;

        let merged = &second.projects[0];
        assert!(!merged.created);
        assert_eq!(merged.total_files, 3);
        // Only api.py is new; main.py was byte-identical.
        assert_eq!(merged.added_or_modified, 1);

        let sources = repo.artifact_sources(project_id).await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].artifact_count, 1);
    }

    #[tokio::test]
    async fn test_double_ingest_is_idempotent() {
        let repo = MemoryRepository::new();
        let dir = TempDir::new().unwrap();
        let content = ContentStore::new(dir.path());

        let files: &[(&str, &[u8])] = &[("demo/a.py", b"a = 1\n"), ("demo/b.py", b"b = 2\n")];
        let first = ingest(&repo, &content, files, HashMap::new()).await;
        let project_id = first.projects[0].project.id;

        let mapping: HashMap<String, Uuid> =
            [("demo".to_string(), project_id)].into_iter().collect();
        let second = ingest(&repo, &content, files, mapping).await;

        assert_eq!(second.projects[0].added_or_modified, 0);
        assert_eq!(
            repo.file_entries(project_id).await.unwrap().len(),
            2,
            "replay must not change the file set"
        );
    }

    #[tokio::test]
    async fn test_modified_file_is_overwritten() {
        let repo = MemoryRepository::new();
        let dir = TempDir::new().unwrap();
        let content = ContentStore::new(dir.path());

        let first = ingest(
            &repo,
            &content,
            &[("demo/main.py", b"v1\n" as &[u8])],
            HashMap::new(),
        )
        .await;
        let project_id = first.projects[0].project.id;

        let mapping: HashMap<String, Uuid> =
            [("demo".to_string(), project_id)].into_iter().collect();
        let second = ingest(
            &repo,
            &content,
            &[("demo/main.py", b"v2\n" as &[u8])],
            mapping,
        )
        .await;

        assert_eq!(second.projects[0].added_or_modified, 1);
        let entries = repo.file_entries(project_id).await.unwrap();
        assert_eq!(entries.len(), 1);

        // Latest wins: entry now references the v2 payload.
        let stored = content.get(&entries[0].content_hash).await.unwrap();
        assert_eq!(stored, b"v2\n");
    }

    #[tokio::test]
    async fn test_ambiguous_mapping_rejected() {
        let repo = MemoryRepository::new();
        let dir = TempDir::new().unwrap();
        let content = ContentStore::new(dir.path());

        // Two candidates share the basename "app".
        let zip = write_zip(&[
            ("work/a/app/package.json", b"{}" as &[u8]),
            ("work/b/app/Cargo.toml", b"[package]"),
        ]);
        let extracted = extract_archive(zip.path(), &IngestConfig::default())
            .await
            .unwrap();
        let ignore = build_ignore_set(&[]).unwrap();
        let mapping: HashMap<String, Uuid> =
            [("app".to_string(), Uuid::new_v4())].into_iter().collect();

        let err = ingest_archive(&repo, &content, &extracted, "u.zip", 0, &mapping, &ignore)
            .await
            .unwrap_err();
        assert!(matches!(err, CodefolioError::AmbiguousMapping { .. }));

        // Pre-check runs before any rows are created.
        assert!(repo.list_projects().await.unwrap().is_empty());
    }
}
