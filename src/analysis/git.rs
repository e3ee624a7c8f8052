//! Git history capability.
//!
//! The pipeline consumes the [`GitLogSource`] trait; the bundled
//! implementation walks the repository with git2. Damaged or unreadable
//! git metadata is reported as an error by the source and mapped to
//! "no history" (plus a diagnostic) by the caller, never a project
//! failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use git2::Repository;
use tracing::debug;

use crate::core::errors::{CodefolioError, Result};
use crate::core::model::GitSummary;

/// One commit as seen by the role detector and metrics stage.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    /// Commit sha, full hex
    pub sha: String,
    /// Author name as recorded
    pub author_name: String,
    /// Author email as recorded
    pub author_email: String,
    /// Author timestamp
    pub timestamp: DateTime<Utc>,
    /// First line of the commit message
    pub summary: String,
    /// Line churn (added + removed) when the source computes it
    pub churn: Option<usize>,
}

/// Capability trait for reading a project's commit history.
///
/// Implementations may shell out, use a library, or replay a fixture; the
/// pipeline is indifferent.
#[async_trait]
pub trait GitLogSource: Send + Sync {
    /// Full commit log for the repository at `root`, newest first.
    async fn log(&self, root: &Path) -> Result<Vec<CommitRecord>>;
}

/// Whether a project root carries git metadata at all. Used to skip log
/// I/O entirely for non-git projects.
pub fn has_git_metadata(root: &Path) -> bool {
    root.join(".git").exists()
}

/// git2-backed log source.
#[derive(Debug, Default, Clone)]
pub struct Git2LogSource;

impl Git2LogSource {
    /// Create a new git2-backed source.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GitLogSource for Git2LogSource {
    async fn log(&self, root: &Path) -> Result<Vec<CommitRecord>> {
        let root: PathBuf = root.to_path_buf();
        tokio::task::spawn_blocking(move || log_blocking(&root))
            .await
            .map_err(|e| CodefolioError::internal(format!("git log task panicked: {e}")))?
    }
}

fn log_blocking(root: &Path) -> Result<Vec<CommitRecord>> {
    let repo = Repository::open(root)?;

    let mut walker = repo.revwalk()?;
    walker.push_head()?;

    let mut commits = Vec::new();
    for oid in walker {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;
        let author = commit.author();

        commits.push(CommitRecord {
            sha: oid.to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            timestamp: to_datetime(commit.time()),
            summary: commit.summary().unwrap_or("").to_string(),
            churn: None,
        });
    }

    debug!(root = %root.display(), commits = commits.len(), "collected git log");
    Ok(commits)
}

/// Convert git2 time to a UTC timestamp.
fn to_datetime(time: git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default())
}

/// Aggregate a commit log into the summary record stored on the project.
pub fn summarize_commits(
    commits: &[CommitRecord],
    user_matcher: impl Fn(&str, &str) -> bool,
) -> GitSummary {
    use std::collections::BTreeSet;

    let mut authors: BTreeSet<(String, String)> = BTreeSet::new();
    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;
    let mut user_commits = 0usize;

    for commit in commits {
        authors.insert((
            commit.author_name.to_ascii_lowercase(),
            commit.author_email.to_ascii_lowercase(),
        ));
        first = Some(match first {
            Some(existing) => existing.min(commit.timestamp),
            None => commit.timestamp,
        });
        last = Some(match last {
            Some(existing) => existing.max(commit.timestamp),
            None => commit.timestamp,
        });
        if user_matcher(&commit.author_name, &commit.author_email) {
            user_commits += 1;
        }
    }

    GitSummary {
        commit_count: commits.len(),
        author_count: authors.len(),
        first_commit: first,
        last_commit: last,
        user_commits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn commit(name: &str, email: &str, offset_hours: i64) -> CommitRecord {
        CommitRecord {
            sha: format!("{name}-{offset_hours}"),
            author_name: name.to_string(),
            author_email: email.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
                + Duration::hours(offset_hours),
            summary: "update".to_string(),
            churn: None,
        }
    }

    #[test]
    fn test_summarize_counts_authors_and_range() {
        let commits = vec![
            commit("Ada", "ada@example.com", 0),
            commit("Ada", "ada@example.com", 5),
            commit("Bob", "bob@example.com", 10),
        ];

        let summary = summarize_commits(&commits, |_, email| email == "ada@example.com");
        assert_eq!(summary.commit_count, 3);
        assert_eq!(summary.author_count, 2);
        assert_eq!(summary.user_commits, 2);
        assert!(summary.first_commit.unwrap() < summary.last_commit.unwrap());
    }

    #[test]
    fn test_summarize_empty_log() {
        let summary = summarize_commits(&[], |_, _| true);
        assert_eq!(summary.commit_count, 0);
        assert_eq!(summary.first_commit, None);
    }

    #[tokio::test]
    async fn test_git2_source_reads_real_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        std::fs::write(dir.path().join("main.py"), "x = 1\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("main.py")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Ada", "ada@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let source = Git2LogSource::new();
        let commits = source.log(dir.path()).await.unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].author_email, "ada@example.com");
        assert!(has_git_metadata(dir.path()));
    }

    #[tokio::test]
    async fn test_damaged_metadata_surfaces_as_error() {
        let dir = tempfile::TempDir::new().unwrap();
        // A .git directory with no repository structure inside.
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();

        let source = Git2LogSource::new();
        let err = source.log(dir.path()).await.unwrap_err();
        assert!(matches!(err, CodefolioError::Git { .. }));
        assert!(has_git_metadata(dir.path()));
    }
}
