//! Codefolio CLI - drive the ingest-and-analysis pipeline end to end.
//!
//! Wires the in-memory repository and a filesystem content store so the
//! pipeline can be exercised without the hosted API surface: extract an
//! archive, discover and merge projects, analyse the batch, and write a
//! JSON report.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use tokio_util::sync::CancellationToken;

use codefolio_rs::analysis::git::Git2LogSource;
use codefolio_rs::analysis::pipeline::{AnalysisRequest, ProjectPipeline};
use codefolio_rs::core::config::CodefolioConfig;
use codefolio_rs::generate::llm::HttpCompletionClient;
use codefolio_rs::ingest::archive::extract_archive;
use codefolio_rs::ingest::discovery::build_ignore_set;
use codefolio_rs::ingest::merge::ingest_archive;
use codefolio_rs::store::content::ContentStore;
use codefolio_rs::store::memory::MemoryRepository;

#[derive(Parser)]
#[command(name = "codefolio", version, about = "Coding-history ingest and analysis")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract an archive and list the projects discovered inside it
    Ingest {
        /// Path to the ZIP archive
        archive: PathBuf,
    },

    /// Ingest an archive, analyse every discovered project, and write a
    /// JSON report
    Analyze {
        /// Path to the ZIP archive
        archive: PathBuf,

        /// Report output path
        #[arg(short, long, default_value = "codefolio-report.json")]
        out: PathBuf,

        /// Object-store directory
        #[arg(long, default_value = ".codefolio/objects")]
        store: PathBuf,

        /// Re-analyse even when fingerprints are unchanged
        #[arg(long)]
        force: bool,
    },

    /// Print the default configuration as YAML
    PrintDefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => CodefolioConfig::from_yaml_file(path)?,
        None => CodefolioConfig::default(),
    };

    match cli.command {
        Commands::Ingest { archive } => ingest_command(archive, config).await?,
        Commands::Analyze {
            archive,
            out,
            store,
            force,
        } => analyze_command(archive, out, store, force, config).await?,
        Commands::PrintDefaultConfig => {
            print!("{}", serde_yaml::to_string(&CodefolioConfig::default())?);
        }
    }

    Ok(())
}

async fn ingest_command(archive: PathBuf, config: CodefolioConfig) -> anyhow::Result<()> {
    let extracted = extract_archive(&archive, &config.ingest).await?;
    let ignore = build_ignore_set(&config.ingest.ignore_patterns)?;
    let candidates =
        codefolio_rs::ingest::discovery::discover_projects(&extracted.content_path(), &ignore)?;

    println!(
        "{} {} project(s) in {}",
        style("Discovered").green().bold(),
        candidates.len(),
        archive.display()
    );
    for candidate in candidates {
        println!(
            "  {:<24} {:<24} {:>6} files  git: {}",
            style(&candidate.name).cyan(),
            if candidate.rel_path.is_empty() {
                "."
            } else {
                &candidate.rel_path
            },
            candidate.file_count,
            if candidate.has_git { "yes" } else { "no" }
        );
    }
    Ok(())
}

async fn analyze_command(
    archive: PathBuf,
    out: PathBuf,
    store: PathBuf,
    force: bool,
    config: CodefolioConfig,
) -> anyhow::Result<()> {
    let repo = Arc::new(MemoryRepository::new());
    let content = ContentStore::new(&store);

    let extracted = extract_archive(&archive, &config.ingest).await?;
    let ignore = build_ignore_set(&config.ingest.ignore_patterns)?;
    let byte_size = std::fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
    let filename = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.zip".to_string());

    let outcome = ingest_archive(
        repo.as_ref(),
        &content,
        &extracted,
        &filename,
        byte_size,
        &HashMap::new(),
        &ignore,
    )
    .await?;

    // The LLM provider is optional: missing key means local-only bullets.
    let model = HttpCompletionClient::from_config(&config.llm)
        .ok()
        .map(|client| Arc::new(client) as Arc<dyn codefolio_rs::generate::llm::CompletionModel>);

    let content_path = extracted.content_path();
    let requests: Vec<AnalysisRequest> = outcome
        .projects
        .iter()
        .map(|merged| {
            let root = if merged.project.rel_path.is_empty() {
                content_path.clone()
            } else {
                content_path.join(&merged.project.rel_path)
            };
            let request = AnalysisRequest::at_root(merged.project.id, root);
            if force {
                request.forced()
            } else {
                request
            }
        })
        .collect();

    let pipeline = ProjectPipeline::new(
        repo,
        content,
        config,
        Arc::new(Git2LogSource::new()),
        model,
    );
    let analyses = pipeline
        .analyze_batch(requests, &CancellationToken::new())
        .await?;

    for analysis in &analyses {
        println!(
            "{} {:<24} {:<12} score {:>5.1}  {} bullets ({})",
            style("Analysed").green().bold(),
            analysis.project_path,
            analysis.language.as_deref().unwrap_or("-"),
            analysis.score,
            analysis.resume_bullets.len(),
            match analysis.resume_bullet_source {
                codefolio_rs::core::model::BulletSource::Ai => "ai",
                codefolio_rs::core::model::BulletSource::Local => "local",
            }
        );
    }

    std::fs::write(&out, serde_json::to_vec_pretty(&analyses)?)?;
    println!("{} {}", style("Report written to").bold(), out.display());
    Ok(())
}
