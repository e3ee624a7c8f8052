//! Consent and capability gate.
//!
//! Sole authority on outbound LLM calls. Reads the latest consent record
//! through the repository; absence of a record means deny. Every component
//! that contemplates an external call goes through this gate.

use globset::GlobSet;
use tracing::debug;

use crate::core::errors::Result;
use crate::core::model::ConsentRecord;
use crate::ingest::discovery::build_ignore_set;
use crate::store::repository::ConsentStore;

/// Snapshot of the consent policy for one pipeline invocation.
///
/// Loaded fresh per invocation; never cached across runs.
#[derive(Debug, Clone)]
pub struct ConsentGate {
    record: Option<ConsentRecord>,
    default_ignore_patterns: Vec<String>,
}

impl ConsentGate {
    /// Load the latest consent record from the repository.
    pub async fn load<S: ConsentStore + ?Sized>(
        store: &S,
        default_ignore_patterns: &[String],
    ) -> Result<Self> {
        let record = store.latest_consent().await?;
        debug!(present = record.is_some(), "loaded consent record");
        Ok(Self {
            record,
            default_ignore_patterns: default_ignore_patterns.to_vec(),
        })
    }

    /// Gate construction for contexts that already hold a record.
    pub fn from_record(record: Option<ConsentRecord>, default_ignore_patterns: Vec<String>) -> Self {
        Self {
            record,
            default_ignore_patterns,
        }
    }

    /// Whether the pipeline may call an external LLM at all.
    /// No record means deny.
    pub fn can_use_llm(&self) -> bool {
        self.record.as_ref().map(|r| r.allow_llm).unwrap_or(false)
    }

    /// Whether a specific model id is permitted. An empty allowlist
    /// permits any model; a non-empty one is exact-match.
    pub fn model_allowed(&self, model: &str) -> bool {
        if !self.can_use_llm() {
            return false;
        }
        match &self.record {
            Some(record) if !record.allowed_models.is_empty() => {
                record.allowed_models.contains(model)
            }
            _ => true,
        }
    }

    /// Active ignore patterns: user patterns layered over the defaults.
    pub fn ignore_patterns(&self) -> Vec<String> {
        let mut patterns = self.default_ignore_patterns.clone();
        if let Some(record) = &self.record {
            for pattern in &record.ignore_patterns {
                if !patterns.contains(pattern) {
                    patterns.push(pattern.clone());
                }
            }
        }
        patterns
    }

    /// Compiled matcher over the active ignore patterns.
    pub fn ignore_set(&self) -> Result<GlobSet> {
        build_ignore_set(&self.ignore_patterns())
    }
}
