//! Configuration types and management for codefolio-rs.
//!
//! All tunables for the ingest and analysis pipeline live here. The
//! structure is YAML-loadable with serde defaults per section so partial
//! config files stay valid as new knobs are added.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CodefolioError, Result};

/// Main configuration for the codefolio pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodefolioConfig {
    /// Identity used to match the current user against git authors
    #[serde(default)]
    pub user: UserIdentity,

    /// Archive ingestion limits and defaults
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Per-project analysis limits
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Importance score weights
    #[serde(default)]
    pub scoring: ScoreWeights,

    /// Bullet generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// External LLM provider settings
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Author names and emails that identify "the user" in git history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Author names to match (case-insensitive)
    #[serde(default)]
    pub names: Vec<String>,

    /// Author emails to match (case-insensitive)
    #[serde(default)]
    pub emails: Vec<String>,
}

impl UserIdentity {
    /// Whether a commit author matches this identity.
    pub fn matches(&self, author_name: &str, author_email: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(author_name))
            || self
                .emails
                .iter()
                .any(|e| e.eq_ignore_ascii_case(author_email))
    }
}

/// Archive ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum cumulative uncompressed size accepted per archive
    #[serde(default = "IngestConfig::default_max_archive_bytes")]
    pub max_archive_bytes: u64,

    /// Maximum number of entries accepted per archive
    #[serde(default = "IngestConfig::default_max_entries")]
    pub max_entries: usize,

    /// Default ignore globs applied when no consent record overrides them
    #[serde(default = "IngestConfig::default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_archive_bytes: Self::default_max_archive_bytes(),
            max_entries: Self::default_max_entries(),
            ignore_patterns: Self::default_ignore_patterns(),
        }
    }
}

impl IngestConfig {
    /// Default uncompressed size cap (1 GiB).
    const fn default_max_archive_bytes() -> u64 {
        1024 * 1024 * 1024
    }

    /// Default archive entry cap.
    const fn default_max_entries() -> usize {
        100_000
    }

    /// Default ignore globs for dependency and build output trees.
    fn default_ignore_patterns() -> Vec<String> {
        [
            "**/node_modules/**",
            "**/target/**",
            "**/__pycache__/**",
            "**/.venv/**",
            "**/venv/**",
            "**/dist/**",
            "**/build/**",
            "**/.idea/**",
            "**/.vscode/**",
            "**/*.min.js",
            "**/.DS_Store",
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }
}

/// Per-project analysis limits and deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Files larger than this are sampled instead of fully scanned
    #[serde(default = "AnalysisConfig::default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Size of the head window scanned for oversized files
    #[serde(default = "AnalysisConfig::default_sample_bytes")]
    pub sample_bytes: u64,

    /// Bounded worker pool size for batch analysis
    #[serde(default = "AnalysisConfig::default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Deadline applied to each pipeline stage, in seconds
    #[serde(default = "AnalysisConfig::default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: Self::default_max_file_bytes(),
            sample_bytes: Self::default_sample_bytes(),
            worker_pool_size: Self::default_worker_pool_size(),
            stage_timeout_secs: Self::default_stage_timeout_secs(),
        }
    }
}

impl AnalysisConfig {
    /// Default per-file size cap (1 MiB).
    const fn default_max_file_bytes() -> u64 {
        1024 * 1024
    }

    /// Default sampling window for oversized files (64 KiB).
    const fn default_sample_bytes() -> u64 {
        64 * 1024
    }

    /// Batch analyses are sequential unless the caller opts into more.
    const fn default_worker_pool_size() -> usize {
        1
    }

    /// Default stage deadline.
    const fn default_stage_timeout_secs() -> u64 {
        60
    }
}

/// Weights for the composite importance score.
///
/// Weights need not sum to 1; the scorer normalises internally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreWeights {
    /// Weight of the user-contribution component
    #[serde(default = "ScoreWeights::default_contribution")]
    pub contribution: f64,

    /// Weight of the tool/practice diversity component
    #[serde(default = "ScoreWeights::default_diversity")]
    pub diversity: f64,

    /// Weight of the project-duration component
    #[serde(default = "ScoreWeights::default_duration")]
    pub duration: f64,

    /// Weight of the file-count component
    #[serde(default = "ScoreWeights::default_file_count")]
    pub file_count: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            contribution: Self::default_contribution(),
            diversity: Self::default_diversity(),
            duration: Self::default_duration(),
            file_count: Self::default_file_count(),
        }
    }
}

impl ScoreWeights {
    const fn default_contribution() -> f64 {
        0.35
    }

    const fn default_diversity() -> f64 {
        0.25
    }

    const fn default_duration() -> f64 {
        0.20
    }

    const fn default_file_count() -> f64 {
        0.20
    }

    /// Total of all weights; zero means scoring degenerates to zero.
    pub fn total(&self) -> f64 {
        self.contribution + self.diversity + self.duration + self.file_count
    }
}

/// Bullet generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum bullets returned per project
    #[serde(default = "GenerationConfig::default_max_bullets")]
    pub max_bullets: usize,

    /// Character cap per bullet
    #[serde(default = "GenerationConfig::default_bullet_char_limit")]
    pub bullet_char_limit: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_bullets: Self::default_max_bullets(),
            bullet_char_limit: Self::default_bullet_char_limit(),
        }
    }
}

impl GenerationConfig {
    const fn default_max_bullets() -> usize {
        5
    }

    const fn default_bullet_char_limit() -> usize {
        220
    }
}

/// External LLM provider settings. The key itself is never stored in
/// config files; only the environment variable holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint URL
    #[serde(default = "LlmConfig::default_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with each request
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "LlmConfig::default_api_key_env")]
    pub api_key_env: String,

    /// Deadline for a single completion call, in seconds
    #[serde(default = "LlmConfig::default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            model: Self::default_model(),
            api_key_env: Self::default_api_key_env(),
            deadline_secs: Self::default_deadline_secs(),
        }
    }
}

impl LlmConfig {
    fn default_endpoint() -> String {
        "https://api.openai.com/v1/chat/completions".to_string()
    }

    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }

    fn default_api_key_env() -> String {
        "CODEFOLIO_LLM_API_KEY".to_string()
    }

    const fn default_deadline_secs() -> u64 {
        30
    }
}

impl CodefolioConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CodefolioError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            CodefolioError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        validate_non_negative(self.scoring.contribution, "scoring.contribution")?;
        validate_non_negative(self.scoring.diversity, "scoring.diversity")?;
        validate_non_negative(self.scoring.duration, "scoring.duration")?;
        validate_non_negative(self.scoring.file_count, "scoring.file_count")?;

        if self.ingest.max_archive_bytes == 0 {
            return Err(CodefolioError::config_field(
                "archive size limit must be positive",
                "ingest.max_archive_bytes",
            ));
        }

        if self.analysis.worker_pool_size == 0 {
            return Err(CodefolioError::config_field(
                "worker pool size must be at least 1",
                "analysis.worker_pool_size",
            ));
        }

        if self.generation.max_bullets == 0 {
            return Err(CodefolioError::config_field(
                "max bullets must be at least 1",
                "generation.max_bullets",
            ));
        }

        Ok(())
    }
}

/// Validate that a weight or limit is finite and non-negative.
pub fn validate_non_negative(value: f64, field: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CodefolioError::config_field(
            format!("value must be a non-negative number, got {value}"),
            field,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CodefolioConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.scoring.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "scoring:\n  contribution: 0.5\n";
        let config: CodefolioConfig = serde_yaml::from_str(yaml).unwrap();
        assert!((config.scoring.contribution - 0.5).abs() < 1e-9);
        assert!((config.scoring.diversity - 0.25).abs() < 1e-9);
        assert_eq!(config.generation.max_bullets, 5);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = CodefolioConfig::default();
        config.scoring.duration = -0.1;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CodefolioError::Config { .. }));
    }

    #[test]
    fn test_user_identity_matching() {
        let identity = UserIdentity {
            names: vec!["Ada Lovelace".to_string()],
            emails: vec!["ada@example.com".to_string()],
        };
        assert!(identity.matches("ada lovelace", "other@example.com"));
        assert!(identity.matches("Someone Else", "ADA@EXAMPLE.COM"));
        assert!(!identity.matches("Charles Babbage", "cb@example.com"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = CodefolioConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: CodefolioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.scoring, config.scoring);
        assert_eq!(parsed.ingest.ignore_patterns, config.ingest.ignore_patterns);
    }
}
