//! # Codefolio-RS: Coding-History Ingest & Analysis Engine
//!
//! The core pipeline behind a résumé/portfolio builder: it ingests
//! compressed archives of historical coding work, discovers the projects
//! inside, analyses each project's code and git history, and emits the
//! structured artefacts (ranked projects, skills, résumé bullets) that
//! downstream surfaces consume.
//!
//! ## Pipeline
//!
//! ```text
//! Archive → Ingest → Project Discovery → Content Store
//!        → Fingerprint Cache gate
//!        → Per-project Analysis (language → skills → code → git → role)
//!        → Scoring & Ranking
//!        → Bullet Generation (LLM-first, local fallback)
//!        → Persistence via Repository
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use codefolio_rs::analysis::git::Git2LogSource;
//! use codefolio_rs::analysis::pipeline::{AnalysisRequest, ProjectPipeline};
//! use codefolio_rs::core::config::CodefolioConfig;
//! use codefolio_rs::store::content::ContentStore;
//! use codefolio_rs::store::memory::MemoryRepository;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = Arc::new(MemoryRepository::new());
//!     let pipeline = ProjectPipeline::new(
//!         repo,
//!         ContentStore::new(".codefolio/objects"),
//!         CodefolioConfig::default(),
//!         Arc::new(Git2LogSource::new()),
//!         None,
//!     );
//!
//!     // ... ingest an archive, then:
//!     let project_id = uuid::Uuid::new_v4();
//!     let analysis = pipeline
//!         .analyze_project(AnalysisRequest::from_store(project_id), &CancellationToken::new())
//!         .await?;
//!     println!("{} bullets generated", analysis.resume_bullets.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

// Core types and configuration
pub mod core {
    //! Errors, configuration, and the shared data model.

    pub mod config;
    pub mod errors;
    pub mod model;
}

// Content addressing and persistence interfaces
pub mod store {
    //! Content-addressed storage and the repository traits.

    pub mod content;
    pub mod memory;
    pub mod repository;
}

// Archive ingestion and incremental merge
pub mod ingest {
    //! Archive extraction, project discovery, and incremental merge.

    pub mod archive;
    pub mod discovery;
    pub mod merge;
}

// Per-project analysis stages
pub mod analysis {
    //! Language detection, skills, code analysers, git metrics, scoring,
    //! and the unified pipeline.

    pub mod analyzers;
    pub mod detect;
    pub mod git;
    pub mod pipeline;
    pub mod roles;
    pub mod scoring;
    pub mod skills;
    pub mod source;
}

// Bullet generation and the consent gate
pub mod generate {
    //! Résumé-bullet generation, the LLM capability, and consent.

    pub mod bullets;
    pub mod consent;
    pub mod llm;
    pub mod local;
}

// Re-export primary types for convenience
pub use crate::analysis::pipeline::{AnalysisRequest, ProjectPipeline};
pub use crate::core::config::CodefolioConfig;
pub use crate::core::errors::{CodefolioError, Result, ResultExt};
pub use crate::core::model::ProjectAnalysis;
pub use crate::store::content::ContentStore;
pub use crate::store::memory::MemoryRepository;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
