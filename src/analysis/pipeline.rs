//! Unified analysis pipeline.
//!
//! Orchestrates one project end to end: fingerprint gate, language
//! detection, skill extraction, code analysis, git metrics and role
//! detection, then batch-wide scoring, bullet generation, and
//! persistence. Per-project work is serialised by an advisory lock;
//! batches continue past individual failures.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::analyzers::{analyze_with_fallback, AnalyzerOutput};
use crate::analysis::detect::detect_stack;
use crate::analysis::git::{has_git_metadata, summarize_commits, CommitRecord, GitLogSource};
use crate::analysis::roles::{detect_role, RoleDetection};
use crate::analysis::scoring::{score_batch, ScoreInput};
use crate::analysis::skills::extract_skills;
use crate::analysis::source::{load_project_files, SourceFile};
use crate::core::config::CodefolioConfig;
use crate::core::errors::{CodefolioError, Result};
use crate::core::model::{
    BulletSource, CodeAnalysis, CodeMetrics, GeneratedItem, Project, ProjectAnalysis, Role,
};
use crate::generate::bullets;
use crate::generate::consent::ConsentGate;
use crate::generate::llm::CompletionModel;
use crate::store::content::{project_fingerprint, ContentStore};
use crate::store::repository::Repository;

/// Generated-item kind under which bullet sets are persisted.
pub const RESUME_BULLETS_KIND: &str = "resume_bullets";

/// One project to analyse in a batch.
#[derive(Debug)]
pub struct AnalysisRequest {
    /// Project to analyse
    pub project_id: Uuid,
    /// Materialised project tree on disk; `None` re-materialises from the
    /// content store (without git history)
    pub root: Option<PathBuf>,
    /// Skip the fingerprint gate
    pub force: bool,
}

impl AnalysisRequest {
    /// Request analysis of a project at a known on-disk root.
    pub fn at_root(project_id: Uuid, root: impl Into<PathBuf>) -> Self {
        Self {
            project_id,
            root: Some(root.into()),
            force: false,
        }
    }

    /// Request re-analysis from stored content only.
    pub fn from_store(project_id: Uuid) -> Self {
        Self {
            project_id,
            root: None,
            force: false,
        }
    }

    /// Bypass the fingerprint gate.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// The unified pipeline over a repository, a content store, a git
/// capability, and an optional LLM capability.
pub struct ProjectPipeline<R: Repository> {
    repo: Arc<R>,
    content: ContentStore,
    config: CodefolioConfig,
    git: Arc<dyn GitLogSource>,
    model: Option<Arc<dyn CompletionModel>>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

struct StagedProject {
    project: Project,
    analysis: ProjectAnalysis,
    output: Option<AnalyzerOutput>,
    skills: crate::analysis::skills::SkillReport,
    fingerprint: Option<String>,
    fresh: bool,
    // Keeps a materialised scratch tree alive through persistence.
    _scratch: Option<TempDir>,
    // Advisory lock held from staging through persistence.
    _lock: tokio::sync::OwnedMutexGuard<()>,
}

impl<R: Repository> ProjectPipeline<R> {
    /// Build a pipeline.
    pub fn new(
        repo: Arc<R>,
        content: ContentStore,
        config: CodefolioConfig,
        git: Arc<dyn GitLogSource>,
        model: Option<Arc<dyn CompletionModel>>,
    ) -> Self {
        Self {
            repo,
            content,
            config,
            git,
            model,
            locks: DashMap::new(),
        }
    }

    /// Analyse a single project and return its aggregated analysis.
    pub async fn analyze_project(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<ProjectAnalysis> {
        let mut results = self.analyze_batch(vec![request], cancel).await?;
        results
            .pop()
            .ok_or_else(|| CodefolioError::internal("batch returned no analysis"))
    }

    /// Analyse a batch of projects. Individual failures degrade that
    /// project and the batch continues; scoring and ranking run across
    /// every project that survived.
    pub async fn analyze_batch(
        &self,
        requests: Vec<AnalysisRequest>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProjectAnalysis>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let gate = ConsentGate::load(self.repo.as_ref(), &self.config.ingest.ignore_patterns).await?;
        let ignore = gate.ignore_set()?;
        let weights = self.repo.get_score_weights().await?;

        let pool = self.config.analysis.worker_pool_size.max(1);
        let mut staged: Vec<StagedProject> = stream::iter(requests)
            .map(|request| {
                let gate = gate.clone();
                let ignore = ignore.clone();
                async move { self.stage_project(request, &gate, &ignore, cancel).await }
            })
            .buffered(pool)
            .filter_map(|result| async move {
                match result {
                    Ok(staged) => Some(staged),
                    Err(err) => {
                        warn!(error = %err, "project analysis failed; continuing batch");
                        None
                    }
                }
            })
            .collect()
            .await;

        if staged.is_empty() {
            return Ok(Vec::new());
        }

        // C8 runs across the whole batch.
        let inputs: Vec<ScoreInput> = staged.iter().map(score_input).collect();
        let outcomes = score_batch(&inputs, &weights);
        for outcome in &outcomes {
            if let Some(entry) = staged
                .iter_mut()
                .find(|s| s.project.id == outcome.project_id)
            {
                entry.analysis.score = outcome.score;
                entry.analysis.score_breakdown = outcome.breakdown;
                entry.project.importance_score = Some(outcome.score);
                entry.project.importance_rank = Some(outcome.rank);
            }
        }

        // Bullet generation, then persistence, per project.
        let use_ai = self
            .model
            .as_deref()
            .map(|model| gate.model_allowed(model.model_id()))
            .unwrap_or(false);
        let deadline = Duration::from_secs(self.config.llm.deadline_secs);

        for entry in &mut staged {
            if cancel.is_cancelled() {
                return Err(CodefolioError::internal("analysis cancelled"));
            }
            if entry.fresh {
                let (generated, source) = bullets::generate(
                    &entry.analysis,
                    self.config.generation.max_bullets,
                    use_ai,
                    self.model.as_deref(),
                    deadline,
                )
                .await;
                entry.analysis.resume_bullets = generated;
                entry.analysis.resume_bullet_source = source;
            }
            self.persist(entry).await?;
        }

        info!(projects = staged.len(), "batch analysis complete");
        Ok(staged.into_iter().map(|s| s.analysis).collect())
    }

    /// Run C4–C7 for one project behind its advisory lock.
    async fn stage_project(
        &self,
        request: AnalysisRequest,
        gate: &ConsentGate,
        ignore: &globset::GlobSet,
        cancel: &CancellationToken,
    ) -> Result<StagedProject> {
        let lock = self
            .locks
            .entry(request.project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let guard = lock.try_lock_owned().map_err(|_| {
            CodefolioError::conflict(format!(
                "project {} is already being analysed",
                request.project_id
            ))
        })?;

        let project = self.repo.get_project(request.project_id).await?;
        let entries = self.repo.file_entries(project.id).await?;
        let fingerprint = project_fingerprint(
            entries
                .iter()
                .map(|e| (e.rel_path.as_str(), e.content_hash.as_str())),
        );

        // Fingerprint gate: unchanged file set short-circuits to the
        // persisted analysis with no git or LLM I/O.
        if !request.force {
            if let Some(last) = self.repo.last_fingerprint(project.id).await? {
                if last == fingerprint {
                    debug!(project = %project.id, "fingerprint unchanged; emitting cached analysis");
                    let analysis = self.cached_analysis(&project).await?;
                    return Ok(StagedProject {
                        project,
                        analysis,
                        output: None,
                        skills: Default::default(),
                        fingerprint: None,
                        fresh: false,
                        _scratch: None,
                        _lock: guard,
                    });
                }
            }
        }

        let (root, scratch) = match &request.root {
            Some(root) => (root.clone(), None),
            None => {
                let scratch = self.materialize(&project).await?;
                (scratch.path().to_path_buf(), Some(scratch))
            }
        };

        let mut analysis = ProjectAnalysis::new(&project.rel_path);
        let mut diagnostics = Vec::new();

        self.check_cancelled(cancel)?;
        let files = load_project_files(&root, ignore, &self.config.analysis, &mut diagnostics)?;

        // C4: language and framework.
        let stack = detect_stack(&files);
        analysis.language = stack.language.clone();
        analysis.framework = stack.framework.clone();

        // Git log feeds both skill extraction and role detection; damaged
        // metadata degrades to "no history".
        self.check_cancelled(cancel)?;
        let commits = self.collect_commits(&root, &mut diagnostics).await;

        // C5: tools and practices.
        self.check_cancelled(cancel)?;
        let deadline = Duration::from_secs(self.config.llm.deadline_secs);
        let skills = extract_skills(
            &files,
            &commits,
            gate,
            self.model.as_deref(),
            deadline,
        )
        .await;
        analysis.tools = skills.tools.clone();
        analysis.practices = skills.practices.clone();

        // C6: language-specific code analysis with generic fallback.
        self.check_cancelled(cancel)?;
        let output = analyze_with_fallback(analysis.language.as_deref(), &files, &mut diagnostics);
        analysis.code_metrics = CodeMetrics {
            file_count: output.file_count.max(files.len()),
            loc: output.total_loc,
            function_count: output.function_count,
            class_count: output.class_count,
            test_count: output.test_count(),
        };
        if let Some(language) = &analysis.language {
            analysis.language_specific = serde_json::json!({
                language.clone(): output.features.clone(),
            });
        }

        // C7: git metrics and role classification.
        self.check_cancelled(cancel)?;
        let detection = if commits.is_empty() {
            RoleDetection::unknown()
        } else {
            detect_role(&commits, &self.config.user)
        };
        let git_summary = if commits.is_empty() {
            None
        } else {
            let identity = &self.config.user;
            Some(summarize_commits(&commits, |name, email| {
                identity.matches(name, email)
            }))
        };

        analysis.git = git_summary;
        analysis.contribution_pct = detection.contribution_pct;
        analysis.role = detection.role;
        analysis.role_justification = detection.justification;
        analysis.is_collaborative = detection.is_collaborative;
        analysis.diagnostics = diagnostics;

        let mut project = project;
        apply_dates(&mut project, &analysis, &files);

        Ok(StagedProject {
            project,
            analysis,
            output: Some(output),
            skills,
            fingerprint: Some(fingerprint),
            fresh: true,
            _scratch: scratch,
            _lock: guard,
        })
    }

    async fn collect_commits(
        &self,
        root: &Path,
        diagnostics: &mut Vec<String>,
    ) -> Vec<CommitRecord> {
        if !has_git_metadata(root) {
            return Vec::new();
        }

        let deadline = Duration::from_secs(self.config.analysis.stage_timeout_secs);
        match tokio::time::timeout(deadline, self.git.log(root)).await {
            Ok(Ok(commits)) => commits,
            Ok(Err(err)) => {
                warn!(error = %err, "git metadata unreadable; treating as no history");
                diagnostics.push(format!("git metadata unreadable: {err}"));
                Vec::new()
            }
            Err(_) => {
                warn!("git log timed out; treating as no history");
                diagnostics.push(format!(
                    "git log exceeded {}s deadline",
                    deadline.as_secs()
                ));
                Vec::new()
            }
        }
    }

    /// Write a project's stored file set into a scratch directory.
    async fn materialize(&self, project: &Project) -> Result<TempDir> {
        let scratch = TempDir::new()
            .map_err(|e| CodefolioError::io("creating materialisation scratch", e))?;

        for entry in self.repo.file_entries(project.id).await? {
            let bytes = self.content.get(&entry.content_hash).await?;
            let target = scratch.path().join(&entry.rel_path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| CodefolioError::io("creating materialisation directory", e))?;
            }
            tokio::fs::write(&target, bytes)
                .await
                .map_err(|e| CodefolioError::io(format!("writing {}", entry.rel_path), e))?;
        }

        Ok(scratch)
    }

    /// Rebuild the analysis record from persisted rows, for the
    /// fingerprint-gate short circuit.
    async fn cached_analysis(&self, project: &Project) -> Result<ProjectAnalysis> {
        let mut analysis = ProjectAnalysis::new(&project.rel_path);
        analysis.language = project.language.clone();
        analysis.framework = project.framework.clone();
        analysis.is_collaborative = project.is_collaborative;
        analysis.role = project.role;
        analysis.contribution_pct = project.contribution_pct;
        analysis.role_justification = project.role_justification.clone();
        analysis.score = project.importance_score.unwrap_or(0.0);

        let skills = self.repo.project_skills(project.id).await?;
        for skill in skills {
            match skill.kind {
                crate::core::model::SkillKind::Tool => analysis.tools.push(skill.name),
                crate::core::model::SkillKind::Practice => analysis.practices.push(skill.name),
            }
        }

        for stored in self.repo.code_analyses(project.id).await? {
            if let Ok(output) = serde_json::from_value::<AnalyzerOutput>(stored.metrics.clone()) {
                analysis.code_metrics = CodeMetrics {
                    file_count: output.file_count,
                    loc: output.total_loc,
                    function_count: output.function_count,
                    class_count: output.class_count,
                    test_count: output.test_count(),
                };
                analysis.language_specific =
                    serde_json::json!({ stored.language.clone(): output.features });
            }
        }

        if let Some(item) = self
            .repo
            .get_generated_item(RESUME_BULLETS_KIND, project.id)
            .await?
        {
            if let Some(bullets) = item.payload.get("bullets").and_then(|v| v.as_array()) {
                analysis.resume_bullets = bullets
                    .iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect();
            }
            if item.payload.get("source").and_then(|v| v.as_str()) == Some("ai") {
                analysis.resume_bullet_source = BulletSource::Ai;
            }
        }

        Ok(analysis)
    }

    /// Persist a staged project: project columns, code analysis, skill
    /// edges, fingerprint, and the generated bullet set.
    async fn persist(&self, staged: &StagedProject) -> Result<()> {
        let mut project = staged.project.clone();

        if staged.fresh {
            project.language = staged.analysis.language.clone();
            project.framework = staged.analysis.framework.clone();
            project.is_collaborative = staged.analysis.is_collaborative;
            project.role = staged.analysis.role;
            project.contribution_pct = staged.analysis.contribution_pct;
            project.role_justification = staged.analysis.role_justification.clone();
        }
        let project = self.repo.update_project(project).await?;

        if !staged.fresh {
            return Ok(());
        }

        if let (Some(language), Some(output)) = (&staged.analysis.language, &staged.output) {
            self.repo
                .upsert_code_analysis(CodeAnalysis {
                    project_id: project.id,
                    language: language.clone(),
                    metrics: serde_json::to_value(output)?,
                    summary: output.summary_text.clone(),
                    analyzed_at: Utc::now(),
                })
                .await?;
        }

        self.repo
            .set_project_skills(project.id, staged.skills.as_skills())
            .await?;

        if let Some(fingerprint) = &staged.fingerprint {
            self.repo
                .set_last_fingerprint(project.id, fingerprint)
                .await?;
        }

        self.repo
            .upsert_generated_item(GeneratedItem {
                kind: RESUME_BULLETS_KIND.to_string(),
                project_id: project.id,
                payload: serde_json::json!({
                    "bullets": staged.analysis.resume_bullets,
                    "source": staged.analysis.resume_bullet_source,
                }),
                updated_at: Utc::now(),
            })
            .await?;

        Ok(())
    }

    fn check_cancelled(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            Err(CodefolioError::internal("analysis cancelled"))
        } else {
            Ok(())
        }
    }
}

/// Scoring signals for one staged project.
fn score_input(staged: &StagedProject) -> ScoreInput {
    let analysis = &staged.analysis;

    // Solo projects with no other contributors count as full ownership.
    let contribution = if analysis.role == Role::SoloDeveloper {
        100.0
    } else {
        analysis.contribution_pct
    };

    let (duration_days, last_commit) = match &analysis.git {
        Some(git) => {
            let days = match (git.first_commit, git.last_commit) {
                (Some(first), Some(last)) => (last - first).num_days().max(0) as f64,
                _ => 0.0,
            };
            (days, git.last_commit)
        }
        // Cached entries carry no rebuilt git summary; the persisted
        // project dates keep their duration signal alive.
        None => {
            let days = match (staged.project.started_at, staged.project.ended_at) {
                (Some(start), Some(end)) if staged.project.is_collaborative
                    || staged.project.role != Role::Unknown =>
                {
                    (end - start).num_days().max(0) as f64
                }
                _ => 0.0,
            };
            (days, staged.project.ended_at)
        }
    };

    ScoreInput {
        project_id: staged.project.id,
        name: staged.project.name.clone(),
        contribution_pct: contribution,
        diversity: analysis.tools.len() + analysis.practices.len(),
        duration_days,
        file_count: analysis.code_metrics.file_count,
        last_commit,
    }
}

/// Project start/end dates from git, falling back to the file mtime
/// range.
fn apply_dates(project: &mut Project, analysis: &ProjectAnalysis, files: &[SourceFile]) {
    let (start, end) = match &analysis.git {
        Some(git) if git.first_commit.is_some() => (git.first_commit, git.last_commit),
        _ => {
            let mut min: Option<DateTime<Utc>> = None;
            let mut max: Option<DateTime<Utc>> = None;
            for file in files {
                if let Some(modified) = file.modified {
                    min = Some(min.map_or(modified, |m: DateTime<Utc>| m.min(modified)));
                    max = Some(max.map_or(modified, |m: DateTime<Utc>| m.max(modified)));
                }
            }
            (min, max)
        }
    };
    project.started_at = start;
    project.ended_at = end;
}
