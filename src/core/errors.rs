//! Error types for the codefolio-rs library.
//!
//! This module provides structured error handling for the whole ingest and
//! analysis pipeline. Variants map one-to-one onto the externally visible
//! error kinds (invalid archive, ambiguous mapping, conflict, …) so callers
//! can translate them into transport-level responses without string matching.

use std::io;

use thiserror::Error;

/// Main result type for codefolio operations.
pub type Result<T> = std::result::Result<T, CodefolioError>;

/// Comprehensive error type for all codefolio operations.
#[derive(Error, Debug)]
pub enum CodefolioError {
    /// I/O related errors (file operations, extraction, subprocesses)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// The uploaded archive is not a well-formed ZIP. Fatal for the upload.
    #[error("Invalid archive: {message}")]
    InvalidArchive {
        /// Error description
        message: String,
    },

    /// The archive exceeds the configured uncompressed size limit.
    #[error("Archive too large: {actual_bytes} bytes exceeds limit of {limit_bytes}")]
    ArchiveTooLarge {
        /// Uncompressed size encountered
        actual_bytes: u64,
        /// Configured maximum
        limit_bytes: u64,
    },

    /// A path inside the archive or workspace could not be read.
    /// Non-fatal per path; callers skip, log, and continue.
    #[error("Permission denied: {path}")]
    PermissionDenied {
        /// Path that could not be accessed
        path: String,
    },

    /// A project mapping matched more than one discovered candidate.
    #[error("Ambiguous mapping: {message}")]
    AmbiguousMapping {
        /// Error description
        message: String,
        /// Candidate names in conflict
        candidates: Vec<String>,
    },

    /// Per-project lock contention during analysis or merge.
    #[error("Conflict: {message}")]
    Conflict {
        /// Error description
        message: String,
    },

    /// A language-specific analyser failed as a whole; the pipeline degrades
    /// to the generic path for that project.
    #[error("Analyser failed for {language}: {message}")]
    AnalyserFailed {
        /// Language variant that failed
        language: String,
        /// Error description
        message: String,
    },

    /// Entity lookup failure
    #[error("Not found: {entity} '{key}'")]
    NotFound {
        /// Entity kind (project, upload, content object, …)
        entity: String,
        /// Lookup key
        key: String,
    },

    /// A subprocess or outbound call exceeded its deadline.
    #[error("Timeout after {seconds}s: {operation}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Deadline that was exceeded
        seconds: u64,
    },

    /// The caller requested the LLM path but the consent gate refused.
    /// Surfaced to users as "degraded to local", never as a failure.
    #[error("Consent denied: {message}")]
    ConsentDenied {
        /// Error description
        message: String,
    },

    /// The LLM returned a response the parser could not use.
    /// Internal; triggers the local fallback.
    #[error("Malformed LLM response: {message}")]
    MalformedLlmResponse {
        /// Error description
        message: String,
    },

    /// Git operations that could not be mapped to "no history"
    #[error("Git error: {message}")]
    Git {
        /// Error description
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl CodefolioError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new invalid-archive error
    pub fn invalid_archive(message: impl Into<String>) -> Self {
        Self::InvalidArchive {
            message: message.into(),
        }
    }

    /// Create a new permission-denied error for a path
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    /// Create a new ambiguous-mapping error
    pub fn ambiguous_mapping(message: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::AmbiguousMapping {
            message: message.into(),
            candidates,
        }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new analyser failure for a language variant
    pub fn analyser_failed(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AnalyserFailed {
            language: language.into(),
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Create a new consent-denied error
    pub fn consent_denied(message: impl Into<String>) -> Self {
        Self::ConsentDenied {
            message: message.into(),
        }
    }

    /// Create a new malformed-LLM-response error
    pub fn malformed_llm(message: impl Into<String>) -> Self {
        Self::MalformedLlmResponse {
            message: message.into(),
        }
    }

    /// Create a new git error
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error with field context
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let Self::Internal { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }

    /// Whether this error leaves the current batch item degraded rather
    /// than failing the batch.
    pub fn is_degradation(&self) -> bool {
        matches!(
            self,
            Self::AnalyserFailed { .. }
                | Self::Timeout { .. }
                | Self::ConsentDenied { .. }
                | Self::MalformedLlmResponse { .. }
                | Self::PermissionDenied { .. }
        )
    }
}

// Implement From traits for common error types
impl From<io::Error> for CodefolioError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for CodefolioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for CodefolioError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<zip::result::ZipError> for CodefolioError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => Self::io("archive I/O failed", io_err),
            other => Self::invalid_archive(other.to_string()),
        }
    }
}

impl From<git2::Error> for CodefolioError {
    fn from(err: git2::Error) -> Self {
        Self::git(err.message().to_string())
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CodefolioError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}
