//! In-memory repository implementation.
//!
//! Reference implementation of the persistence traits, used by the test
//! suites and the CLI. Semantics that matter to the pipeline (cascade
//! delete, latest-wins consent, rerank pre-checks) are enforced here
//! exactly as a relational implementation would.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::core::config::ScoreWeights;
use crate::core::errors::{CodefolioError, Result};
use crate::core::model::{
    ArtifactSource, CodeAnalysis, ConsentRecord, ContentMeta, FileEntry, GeneratedItem, Project,
    Skill, Upload,
};
use crate::store::repository::{
    AnalysisStore, ConsentStore, FileStore, GeneratedItemStore, ProjectStore, SkillStore,
};

#[derive(Default)]
struct Inner {
    projects: HashMap<Uuid, Project>,
    uploads: HashMap<Uuid, Upload>,
    artifact_sources: Vec<ArtifactSource>,
    content: HashMap<String, ContentMeta>,
    file_entries: HashMap<Uuid, BTreeMap<String, String>>,
    skills: BTreeSet<Skill>,
    project_skills: HashMap<Uuid, BTreeSet<Skill>>,
    analyses: HashMap<(Uuid, String), CodeAnalysis>,
    fingerprints: HashMap<Uuid, String>,
    consent: Option<ConsentRecord>,
    generated: HashMap<(String, Uuid), GeneratedItem>,
    weights: Option<ScoreWeights>,
}

/// Thread-safe in-memory repository.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryRepository {
    async fn create_project(&self, project: Project) -> Result<Project> {
        let mut inner = self.inner.write();
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Project> {
        self.inner
            .read()
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| CodefolioError::not_found("project", id.to_string()))
    }

    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let inner = self.inner.read();
        let matches: Vec<&Project> = inner
            .projects
            .values()
            .filter(|p| p.name == name)
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some((*matches[0]).clone())),
            _ => Err(CodefolioError::ambiguous_mapping(
                format!("project name '{name}' matches {} projects", matches.len()),
                matches.iter().map(|p| p.id.to_string()).collect(),
            )),
        }
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let inner = self.inner.read();
        let mut projects: Vec<Project> = inner.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(projects)
    }

    async fn update_project(&self, mut project: Project) -> Result<Project> {
        let mut inner = self.inner.write();
        if !inner.projects.contains_key(&project.id) {
            return Err(CodefolioError::not_found("project", project.id.to_string()));
        }
        project.updated_at = Utc::now();
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.projects.remove(&id).is_none() {
            return Err(CodefolioError::not_found("project", id.to_string()));
        }

        // Cascade to every dependent table.
        inner.file_entries.remove(&id);
        inner.project_skills.remove(&id);
        inner.fingerprints.remove(&id);
        inner.artifact_sources.retain(|s| s.project_id != id);
        inner.analyses.retain(|(pid, _), _| *pid != id);
        inner.generated.retain(|(_, pid), _| *pid != id);
        Ok(())
    }

    async fn create_upload(&self, upload: Upload) -> Result<Upload> {
        let mut inner = self.inner.write();
        inner.uploads.insert(upload.id, upload.clone());
        Ok(upload)
    }

    async fn record_artifact_source(&self, source: ArtifactSource) -> Result<()> {
        let mut inner = self.inner.write();
        inner.artifact_sources.push(source);
        Ok(())
    }

    async fn artifact_sources(&self, project_id: Uuid) -> Result<Vec<ArtifactSource>> {
        let inner = self.inner.read();
        let mut sources: Vec<ArtifactSource> = inner
            .artifact_sources
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        sources.sort_by_key(|s| {
            inner
                .uploads
                .get(&s.upload_id)
                .map(|u| u.uploaded_at)
                .unwrap_or_default()
        });
        Ok(sources)
    }

    async fn rerank(&self, ranks: &[(Uuid, u32)]) -> Result<()> {
        let mut inner = self.inner.write();

        let mut seen_ids = BTreeSet::new();
        let mut seen_ranks = BTreeSet::new();
        for (id, rank) in ranks {
            if !inner.projects.contains_key(id) {
                return Err(CodefolioError::not_found("project", id.to_string()));
            }
            if !seen_ids.insert(*id) {
                return Err(CodefolioError::validation(format!(
                    "project {id} listed more than once in rerank"
                )));
            }
            if !seen_ranks.insert(*rank) {
                return Err(CodefolioError::validation(format!(
                    "duplicate rank {rank} in rerank"
                )));
            }
        }

        let n = inner.projects.len();
        if ranks.len() != n {
            return Err(CodefolioError::validation(format!(
                "rerank must cover all {n} projects, got {}",
                ranks.len()
            )));
        }
        let expected: BTreeSet<u32> = (1..=n as u32).collect();
        if seen_ranks != expected {
            return Err(CodefolioError::validation(
                "ranks must form the exact set 1..=n",
            ));
        }

        // Pre-checks passed; apply atomically.
        for (id, rank) in ranks {
            if let Some(project) = inner.projects.get_mut(id) {
                project.importance_rank = Some(*rank);
                project.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn set_score_weights(&self, weights: ScoreWeights) -> Result<()> {
        self.inner.write().weights = Some(weights);
        Ok(())
    }

    async fn get_score_weights(&self) -> Result<ScoreWeights> {
        Ok(self.inner.read().weights.unwrap_or_default())
    }
}

#[async_trait]
impl FileStore for MemoryRepository {
    async fn record_content(&self, meta: ContentMeta) -> Result<()> {
        let mut inner = self.inner.write();
        inner.content.entry(meta.hash.clone()).or_insert(meta);
        Ok(())
    }

    async fn get_content_meta(&self, hash: &str) -> Result<ContentMeta> {
        self.inner
            .read()
            .content
            .get(hash)
            .cloned()
            .ok_or_else(|| CodefolioError::not_found("content object", hash))
    }

    async fn upsert_file_entry(&self, entry: FileEntry) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .file_entries
            .entry(entry.project_id)
            .or_default()
            .insert(entry.rel_path, entry.content_hash);
        Ok(())
    }

    async fn delete_file_entry(&self, project_id: Uuid, rel_path: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(entries) = inner.file_entries.get_mut(&project_id) {
            entries.remove(rel_path);
        }
        Ok(())
    }

    async fn file_entries(&self, project_id: Uuid) -> Result<Vec<FileEntry>> {
        let inner = self.inner.read();
        Ok(inner
            .file_entries
            .get(&project_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(rel_path, hash)| FileEntry {
                        project_id,
                        rel_path: rel_path.clone(),
                        content_hash: hash.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl SkillStore for MemoryRepository {
    async fn upsert_skill(&self, skill: Skill) -> Result<()> {
        self.inner.write().skills.insert(skill);
        Ok(())
    }

    async fn set_project_skills(&self, project_id: Uuid, desired: BTreeSet<Skill>) -> Result<()> {
        let mut inner = self.inner.write();
        for skill in &desired {
            inner.skills.insert(skill.clone());
        }

        let current = inner.project_skills.entry(project_id).or_default();
        // Apply the difference rather than truncating, so unchanged edges
        // keep their identity in implementations that track them.
        let stale: Vec<Skill> = current.difference(&desired).cloned().collect();
        for skill in stale {
            current.remove(&skill);
        }
        for skill in desired {
            current.insert(skill);
        }
        Ok(())
    }

    async fn project_skills(&self, project_id: Uuid) -> Result<BTreeSet<Skill>> {
        Ok(self
            .inner
            .read()
            .project_skills
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AnalysisStore for MemoryRepository {
    async fn upsert_code_analysis(&self, analysis: CodeAnalysis) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .analyses
            .insert((analysis.project_id, analysis.language.clone()), analysis);
        Ok(())
    }

    async fn code_analyses(&self, project_id: Uuid) -> Result<Vec<CodeAnalysis>> {
        let inner = self.inner.read();
        let mut analyses: Vec<CodeAnalysis> = inner
            .analyses
            .iter()
            .filter(|((pid, _), _)| *pid == project_id)
            .map(|(_, a)| a.clone())
            .collect();
        analyses.sort_by(|a, b| a.language.cmp(&b.language));
        Ok(analyses)
    }

    async fn delete_code_analyses(&self, project_id: Uuid) -> Result<()> {
        self.inner
            .write()
            .analyses
            .retain(|(pid, _), _| *pid != project_id);
        Ok(())
    }

    async fn last_fingerprint(&self, project_id: Uuid) -> Result<Option<String>> {
        Ok(self.inner.read().fingerprints.get(&project_id).cloned())
    }

    async fn set_last_fingerprint(&self, project_id: Uuid, fingerprint: &str) -> Result<()> {
        self.inner
            .write()
            .fingerprints
            .insert(project_id, fingerprint.to_string());
        Ok(())
    }
}

#[async_trait]
impl ConsentStore for MemoryRepository {
    async fn upsert_consent(&self, record: ConsentRecord) -> Result<()> {
        let mut inner = self.inner.write();
        let newer = inner
            .consent
            .as_ref()
            .map(|existing| record.recorded_at >= existing.recorded_at)
            .unwrap_or(true);
        if newer {
            inner.consent = Some(record);
        }
        Ok(())
    }

    async fn latest_consent(&self) -> Result<Option<ConsentRecord>> {
        Ok(self.inner.read().consent.clone())
    }
}

#[async_trait]
impl GeneratedItemStore for MemoryRepository {
    async fn upsert_generated_item(&self, item: GeneratedItem) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .generated
            .insert((item.kind.clone(), item.project_id), item);
        Ok(())
    }

    async fn get_generated_item(
        &self,
        kind: &str,
        project_id: Uuid,
    ) -> Result<Option<GeneratedItem>> {
        Ok(self
            .inner
            .read()
            .generated
            .get(&(kind.to_string(), project_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::SkillKind;

    fn skill(name: &str, kind: SkillKind) -> Skill {
        Skill {
            name: name.to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_project_round_trip() {
        let repo = MemoryRepository::new();
        let project = repo
            .create_project(Project::new("demo", "demo"))
            .await
            .unwrap();

        let fetched = repo.get_project(project.id).await.unwrap();
        assert_eq!(fetched.name, "demo");

        let by_name = repo.find_project_by_name("demo").await.unwrap();
        assert_eq!(by_name.unwrap().id, project.id);
    }

    #[tokio::test]
    async fn test_duplicate_name_lookup_is_ambiguous() {
        let repo = MemoryRepository::new();
        repo.create_project(Project::new("demo", "a/demo"))
            .await
            .unwrap();
        repo.create_project(Project::new("demo", "b/demo"))
            .await
            .unwrap();

        let err = repo.find_project_by_name("demo").await.unwrap_err();
        assert!(matches!(err, CodefolioError::AmbiguousMapping { .. }));
    }

    #[tokio::test]
    async fn test_rerank_rejects_duplicate_ranks() {
        let repo = MemoryRepository::new();
        let a = repo
            .create_project(Project::new("a", "a"))
            .await
            .unwrap();
        let b = repo
            .create_project(Project::new("b", "b"))
            .await
            .unwrap();

        let err = repo.rerank(&[(a.id, 1), (b.id, 1)]).await.unwrap_err();
        assert!(matches!(err, CodefolioError::Validation { .. }));

        // No partial mutation.
        assert_eq!(repo.get_project(a.id).await.unwrap().importance_rank, None);
        assert_eq!(repo.get_project(b.id).await.unwrap().importance_rank, None);
    }

    #[tokio::test]
    async fn test_rerank_is_idempotent() {
        let repo = MemoryRepository::new();
        let a = repo
            .create_project(Project::new("a", "a"))
            .await
            .unwrap();
        let b = repo
            .create_project(Project::new("b", "b"))
            .await
            .unwrap();

        let ranks = vec![(a.id, 2), (b.id, 1)];
        repo.rerank(&ranks).await.unwrap();
        repo.rerank(&ranks).await.unwrap();

        assert_eq!(
            repo.get_project(a.id).await.unwrap().importance_rank,
            Some(2)
        );
        assert_eq!(
            repo.get_project(b.id).await.unwrap().importance_rank,
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_cascade_delete() {
        let repo = MemoryRepository::new();
        let project = repo
            .create_project(Project::new("demo", "demo"))
            .await
            .unwrap();

        repo.upsert_file_entry(FileEntry {
            project_id: project.id,
            rel_path: "main.py".to_string(),
            content_hash: "h1".to_string(),
        })
        .await
        .unwrap();
        repo.set_project_skills(
            project.id,
            [skill("Docker", SkillKind::Tool)].into_iter().collect(),
        )
        .await
        .unwrap();
        repo.set_last_fingerprint(project.id, "f1").await.unwrap();

        repo.delete_project(project.id).await.unwrap();

        assert!(repo.file_entries(project.id).await.unwrap().is_empty());
        assert!(repo.project_skills(project.id).await.unwrap().is_empty());
        assert_eq!(repo.last_fingerprint(project.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_skill_upsert_is_idempotent() {
        let repo = MemoryRepository::new();
        repo.upsert_skill(skill("Docker", SkillKind::Tool))
            .await
            .unwrap();
        repo.upsert_skill(skill("Docker", SkillKind::Tool))
            .await
            .unwrap();

        // Same name under a different kind is a distinct skill.
        repo.upsert_skill(skill("Docker", SkillKind::Practice))
            .await
            .unwrap();
        assert_eq!(self::count_skills(&repo), 2);
    }

    fn count_skills(repo: &MemoryRepository) -> usize {
        repo.inner.read().skills.len()
    }

    #[tokio::test]
    async fn test_consent_latest_wins() {
        let repo = MemoryRepository::new();
        let older = ConsentRecord {
            allow_llm: true,
            allowed_models: BTreeSet::new(),
            ignore_patterns: Vec::new(),
            recorded_at: Utc::now() - chrono::Duration::hours(1),
        };
        let newer = ConsentRecord {
            allow_llm: false,
            allowed_models: BTreeSet::new(),
            ignore_patterns: Vec::new(),
            recorded_at: Utc::now(),
        };

        repo.upsert_consent(newer.clone()).await.unwrap();
        repo.upsert_consent(older).await.unwrap();

        let latest = repo.latest_consent().await.unwrap().unwrap();
        assert!(!latest.allow_llm);
        assert_eq!(latest.recorded_at, newer.recorded_at);
    }
}
