//! Persistence interface consumed by the pipeline.
//!
//! The core never talks to a database directly. It consumes these traits;
//! the serving layer supplies an implementation (relational, in-memory,
//! whatever). [`crate::store::memory::MemoryRepository`] is the reference
//! implementation used by tests and the CLI.

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::config::ScoreWeights;
use crate::core::errors::Result;
use crate::core::model::{
    ArtifactSource, CodeAnalysis, ConsentRecord, ContentMeta, FileEntry, GeneratedItem, Project,
    Skill, Upload,
};

/// Project CRUD, upload lineage, ranking, and score-weight configuration.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a new project row.
    async fn create_project(&self, project: Project) -> Result<Project>;

    /// Fetch one project by id.
    async fn get_project(&self, id: Uuid) -> Result<Project>;

    /// Find a project by display name, if unique. Returns `None` when no
    /// project carries the name.
    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>>;

    /// All projects, ordered by creation time.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Overwrite a project row; bumps `updated_at`.
    async fn update_project(&self, project: Project) -> Result<Project>;

    /// Delete a project and cascade to its dependents (file entries,
    /// skills, analyses, lineage, generated items, fingerprint).
    async fn delete_project(&self, id: Uuid) -> Result<()>;

    /// Record one archive ingest.
    async fn create_upload(&self, upload: Upload) -> Result<Upload>;

    /// Record the (project × upload) lineage edge.
    async fn record_artifact_source(&self, source: ArtifactSource) -> Result<()>;

    /// Lineage edges for one project, in upload-timestamp order.
    async fn artifact_sources(&self, project_id: Uuid) -> Result<Vec<ArtifactSource>>;

    /// Reassign importance ranks. The submitted pairs must cover every
    /// project exactly once with ranks forming `{1..n}`; violations are
    /// validation errors and nothing is persisted. Idempotent.
    async fn rerank(&self, ranks: &[(Uuid, u32)]) -> Result<()>;

    /// Persist the score-weight configuration.
    async fn set_score_weights(&self, weights: ScoreWeights) -> Result<()>;

    /// Current score-weight configuration (defaults when never set).
    async fn get_score_weights(&self) -> Result<ScoreWeights>;
}

/// File-entry and content-object bookkeeping.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Record metadata for a content object. Idempotent on hash.
    async fn record_content(&self, meta: ContentMeta) -> Result<()>;

    /// Metadata for one content object.
    async fn get_content_meta(&self, hash: &str) -> Result<ContentMeta>;

    /// Insert or overwrite the entry for `(project, rel_path)`.
    async fn upsert_file_entry(&self, entry: FileEntry) -> Result<()>;

    /// Remove one entry.
    async fn delete_file_entry(&self, project_id: Uuid, rel_path: &str) -> Result<()>;

    /// All entries for a project, sorted by `rel_path`.
    async fn file_entries(&self, project_id: Uuid) -> Result<Vec<FileEntry>>;
}

/// Skill rows and project↔skill edges.
#[async_trait]
pub trait SkillStore: Send + Sync {
    /// Upsert a skill by `(name, kind)`. Idempotent.
    async fn upsert_skill(&self, skill: Skill) -> Result<()>;

    /// Replace a project's skill set with the desired set, applying the
    /// difference rather than truncating.
    async fn set_project_skills(&self, project_id: Uuid, desired: BTreeSet<Skill>) -> Result<()>;

    /// Current skill set for a project.
    async fn project_skills(&self, project_id: Uuid) -> Result<BTreeSet<Skill>>;
}

/// Code-analysis blobs and the analyser's fingerprint gate.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Upsert the latest analysis for `(project, language)`.
    async fn upsert_code_analysis(&self, analysis: CodeAnalysis) -> Result<()>;

    /// All analyses for a project (one per language).
    async fn code_analyses(&self, project_id: Uuid) -> Result<Vec<CodeAnalysis>>;

    /// Delete all analyses for a project.
    async fn delete_code_analyses(&self, project_id: Uuid) -> Result<()>;

    /// Fingerprint recorded at the project's last completed analysis.
    async fn last_fingerprint(&self, project_id: Uuid) -> Result<Option<String>>;

    /// Record the fingerprint of a completed analysis.
    async fn set_last_fingerprint(&self, project_id: Uuid, fingerprint: &str) -> Result<()>;
}

/// Consent policy storage; the latest record wins, absence means deny.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Record a new policy.
    async fn upsert_consent(&self, record: ConsentRecord) -> Result<()>;

    /// The most recent policy, if any was ever recorded.
    async fn latest_consent(&self) -> Result<Option<ConsentRecord>>;
}

/// Downstream artefact rows keyed by `(kind, project_id)`.
#[async_trait]
pub trait GeneratedItemStore: Send + Sync {
    /// Insert or update an artefact row.
    async fn upsert_generated_item(&self, item: GeneratedItem) -> Result<()>;

    /// Fetch an artefact row.
    async fn get_generated_item(&self, kind: &str, project_id: Uuid)
        -> Result<Option<GeneratedItem>>;
}

/// The full persistence surface the pipeline consumes.
pub trait Repository:
    ProjectStore + FileStore + SkillStore + AnalysisStore + ConsentStore + GeneratedItemStore
{
}

impl<T> Repository for T where
    T: ProjectStore + FileStore + SkillStore + AnalysisStore + ConsentStore + GeneratedItemStore
{
}
