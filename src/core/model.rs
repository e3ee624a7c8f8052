//! Core data model for the ingest and analysis pipeline.
//!
//! These records are the language-neutral entities shared between the
//! ingest layer, the analysers, and the repository. Field names on
//! [`ProjectAnalysis`] are a wire contract consumed downstream; do not
//! rename them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::CodefolioError;

/// Immutable record of one archive ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    /// Opaque upload id
    pub id: Uuid,
    /// Original archive filename
    pub filename: String,
    /// Archive size in bytes as received
    pub byte_size: u64,
    /// Relative path of the content root inside the archive
    pub content_root: String,
    /// Ingest timestamp
    pub uploaded_at: DateTime<Utc>,
}

/// A discovered logical unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project id
    pub id: Uuid,
    /// Display name, derived from the root directory basename
    pub name: String,
    /// Relative path under its workspace
    pub rel_path: String,
    /// Primary language, if detected
    pub language: Option<String>,
    /// Framework, only ever present alongside a language
    pub framework: Option<String>,
    /// Earliest activity (git or file mtime range)
    pub started_at: Option<DateTime<Utc>>,
    /// Latest activity
    pub ended_at: Option<DateTime<Utc>>,
    /// Two or more distinct git authors
    pub is_collaborative: bool,
    /// Classified user role
    pub role: Role,
    /// User contribution percentage, 0..=100
    pub contribution_pct: f64,
    /// One-sentence justification for the role classification
    pub role_justification: String,
    /// Rank assigned by the ranker, 1-based
    pub importance_rank: Option<u32>,
    /// Composite importance score, 0..=100
    pub importance_score: Option<f64>,
    /// Flagged for prominent portfolio display
    pub showcase: bool,
    /// Thumbnail reference
    pub thumbnail: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a fresh project record with analysis fields at their resting
    /// state.
    pub fn new(name: impl Into<String>, rel_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rel_path: rel_path.into(),
            language: None,
            framework: None,
            started_at: None,
            ended_at: None,
            is_collaborative: false,
            role: Role::Unknown,
            contribution_pct: 0.0,
            role_justification: String::new(),
            importance_rank: None,
            importance_score: None,
            showcase: false,
            thumbnail: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The (project × upload) lineage edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSource {
    /// Project the upload contributed to
    pub project_id: Uuid,
    /// Contributing upload
    pub upload_id: Uuid,
    /// Files added or modified by that upload
    pub artifact_count: usize,
}

/// Metadata for one content-addressed object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMeta {
    /// SHA-256 of the raw bytes, 64-char lowercase hex
    pub hash: String,
    /// Payload size in bytes
    pub byte_size: u64,
    /// Coarse mime category
    pub category: ContentCategory,
}

/// Coarse content classification used for doc-density and media counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Code,
    Doc,
    Design,
    Media,
    Other,
}

impl ContentCategory {
    /// Classify a relative path by its extension.
    pub fn from_path(rel_path: &str) -> Self {
        let ext = rel_path
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "py" | "pyi" | "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "java" | "c" | "h"
            | "cpp" | "cc" | "cxx" | "hpp" | "hh" | "rs" | "go" | "rb" | "php" | "cs" | "swift"
            | "kt" | "kts" | "scala" | "sh" | "bash" | "sql" | "pl" | "lua" | "r" | "m" => {
                Self::Code
            }
            "md" | "rst" | "txt" | "adoc" | "org" | "tex" | "pdf" => Self::Doc,
            "fig" | "sketch" | "xd" | "psd" | "ai" | "drawio" => Self::Design,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" | "mp4" | "mov" | "mp3"
            | "wav" | "ttf" | "otf" | "woff" | "woff2" => Self::Media,
            _ => Self::Other,
        }
    }
}

/// `(project, rel_path) → content_hash`: the project's current file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Owning project
    pub project_id: Uuid,
    /// Path relative to the project root; unique per project
    pub rel_path: String,
    /// Content address of the payload
    pub content_hash: String,
}

/// A detected tool or practice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Skill {
    /// Skill name, e.g. "Docker" or "Continuous Integration"
    pub name: String,
    /// Tool vs practice
    pub kind: SkillKind,
}

/// Skill classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillKind {
    Tool,
    Practice,
}

/// Most-recent analyser output for one (project, language) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAnalysis {
    /// Analysed project
    pub project_id: Uuid,
    /// Language variant that produced this record
    pub language: String,
    /// Structured metrics blob
    pub metrics: serde_json::Value,
    /// Human-readable summary
    pub summary: String,
    /// When the analysis ran
    pub analyzed_at: DateTime<Utc>,
}

/// Latest user policy for external services. Absence means deny.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Whether outbound LLM calls are permitted at all
    pub allow_llm: bool,
    /// Model allowlist; empty means any model
    pub allowed_models: BTreeSet<String>,
    /// Ignore globs layered over the configured defaults
    pub ignore_patterns: Vec<String>,
    /// When this policy was recorded; the most recent record wins
    pub recorded_at: DateTime<Utc>,
}

/// Unified row for downstream artefacts (portfolio items, bullet sets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedItem {
    /// Artefact kind, e.g. "portfolio" or "resume_bullets"
    pub kind: String,
    /// Project the artefact belongs to
    pub project_id: Uuid,
    /// JSON-encoded payload
    pub payload: serde_json::Value,
    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

/// The user's classified contribution posture on a project.
///
/// Serialised with the exact wire strings below; storage and transport both
/// rely on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Solo Developer")]
    SoloDeveloper,
    #[serde(rename = "Lead Developer")]
    LeadDeveloper,
    #[serde(rename = "Co-Lead")]
    CoLead,
    #[serde(rename = "Contributor")]
    Contributor,
    #[serde(rename = "Minor Contributor")]
    MinorContributor,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Role {
    /// Wire string for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoloDeveloper => "Solo Developer",
            Self::LeadDeveloper => "Lead Developer",
            Self::CoLead => "Co-Lead",
            Self::Contributor => "Contributor",
            Self::MinorContributor => "Minor Contributor",
            Self::Unknown => "Unknown",
        }
    }

    /// Seniority ordering used for boundary tie-breaks; higher wins.
    pub fn seniority(self) -> u8 {
        match self {
            Self::SoloDeveloper => 5,
            Self::LeadDeveloper => 4,
            Self::CoLead => 3,
            Self::Contributor => 2,
            Self::MinorContributor => 1,
            Self::Unknown => 0,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CodefolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Solo Developer" => Ok(Self::SoloDeveloper),
            "Lead Developer" => Ok(Self::LeadDeveloper),
            "Co-Lead" => Ok(Self::CoLead),
            "Contributor" => Ok(Self::Contributor),
            "Minor Contributor" => Ok(Self::MinorContributor),
            "Unknown" => Ok(Self::Unknown),
            other => Err(CodefolioError::validation(format!(
                "unknown role string: '{other}'"
            ))),
        }
    }
}

/// Aggregate code metrics shared by all analyser variants.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CodeMetrics {
    /// Files considered by the analyser
    pub file_count: usize,
    /// Total lines of code
    pub loc: usize,
    /// Functions found
    pub function_count: usize,
    /// Classes/types found
    pub class_count: usize,
    /// Total tests found
    pub test_count: usize,
}

/// Git history summary for one project. All fields optional-bearing so
/// non-git projects flow through the scorer unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitSummary {
    /// Total commits reachable from HEAD
    pub commit_count: usize,
    /// Distinct authors by (name, email)
    pub author_count: usize,
    /// Earliest commit timestamp
    pub first_commit: Option<DateTime<Utc>>,
    /// Latest commit timestamp
    pub last_commit: Option<DateTime<Utc>>,
    /// Commits matched to the configured user identity
    pub user_commits: usize,
}

/// The four weighted components of the importance score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Contribution component after weighting
    pub contribution: f64,
    /// Tool/practice diversity component after weighting
    pub diversity: f64,
    /// Duration component after weighting
    pub duration: f64,
    /// File-count component after weighting
    pub file_count: f64,
}

impl ScoreBreakdown {
    /// Composite score on the 0..=100 scale.
    pub fn total(&self) -> f64 {
        (self.contribution + self.diversity + self.duration + self.file_count) * 100.0
    }
}

/// Where the résumé bullets came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulletSource {
    Ai,
    Local,
}

/// The canonical aggregated view of one analysed project.
///
/// Assembled by the pipeline and handed to bullet generation and
/// persistence. Field names are a consumer contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    /// Relative path of the project under its workspace
    pub project_path: String,
    /// Detected primary language
    pub language: Option<String>,
    /// Detected framework
    pub framework: Option<String>,
    /// Detected tools
    pub tools: Vec<String>,
    /// Detected practices
    pub practices: Vec<String>,
    /// Aggregate code metrics
    pub code_metrics: CodeMetrics,
    /// Language-specific feature bags keyed by language
    pub language_specific: serde_json::Value,
    /// Git history summary, when history exists
    pub git: Option<GitSummary>,
    /// User contribution percentage, 0..=100
    pub contribution_pct: f64,
    /// Classified role
    pub role: Role,
    /// One-sentence role justification
    pub role_justification: String,
    /// Two or more distinct authors
    pub is_collaborative: bool,
    /// Composite importance score, 0..=100
    pub score: f64,
    /// Weighted score components
    pub score_breakdown: ScoreBreakdown,
    /// Generated résumé bullets
    pub resume_bullets: Vec<String>,
    /// Bullet provenance
    pub resume_bullet_source: BulletSource,
    /// Accumulated per-file and per-stage diagnostics
    pub diagnostics: Vec<String>,
}

impl ProjectAnalysis {
    /// Empty analysis scaffold for a project path.
    pub fn new(project_path: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            language: None,
            framework: None,
            tools: Vec::new(),
            practices: Vec::new(),
            code_metrics: CodeMetrics::default(),
            language_specific: serde_json::Value::Object(serde_json::Map::new()),
            git: None,
            contribution_pct: 0.0,
            role: Role::Unknown,
            role_justification: String::new(),
            is_collaborative: false,
            score: 0.0,
            score_breakdown: ScoreBreakdown::default(),
            resume_bullets: Vec::new(),
            resume_bullet_source: BulletSource::Local,
            diagnostics: Vec::new(),
        }
    }
}
