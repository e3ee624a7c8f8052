//! Skill extraction.
//!
//! The baseline pass is always offline: curated pattern tables over
//! manifests, lockfiles, CI configs, container descriptors, and import
//! lines, plus evidence-based practice detection from the file tree and
//! git log. LLM augmentation runs only behind the consent gate and is
//! discarded silently on any failure.

use std::collections::BTreeSet;
use std::time::Duration;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::analysis::git::CommitRecord;
use crate::analysis::source::SourceFile;
use crate::core::model::{ContentCategory, Skill, SkillKind};
use crate::generate::consent::ConsentGate;
use crate::generate::llm::{extract_json_object, CompletionModel};

/// Conventional-commit share above which the practice is credited.
const CONVENTIONAL_COMMIT_FLOOR: f64 = 0.3;

/// Doc-density floor for the documentation practice.
const DOC_DENSITY_FLOOR: f64 = 0.1;

/// Deduplicated tool and practice names for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillReport {
    /// Detected tools, sorted
    pub tools: Vec<String>,
    /// Detected practices, sorted
    pub practices: Vec<String>,
}

impl SkillReport {
    /// Distinct skill count across both kinds.
    pub fn diversity(&self) -> usize {
        self.tools.len() + self.practices.len()
    }

    /// The report as repository skill rows.
    pub fn as_skills(&self) -> BTreeSet<Skill> {
        self.tools
            .iter()
            .map(|name| Skill {
                name: name.clone(),
                kind: SkillKind::Tool,
            })
            .chain(self.practices.iter().map(|name| Skill {
                name: name.clone(),
                kind: SkillKind::Practice,
            }))
            .collect()
    }
}

/// Tools recognised by filename alone.
const FILENAME_TOOLS: &[(&str, &str)] = &[
    ("Dockerfile", "Docker"),
    ("docker-compose.yml", "Docker Compose"),
    ("docker-compose.yaml", "Docker Compose"),
    (".gitlab-ci.yml", "GitLab CI"),
    ("Jenkinsfile", "Jenkins"),
    ("Makefile", "Make"),
    ("CMakeLists.txt", "CMake"),
    ("package.json", "npm"),
    ("yarn.lock", "Yarn"),
    ("pnpm-lock.yaml", "pnpm"),
    ("tsconfig.json", "TypeScript"),
    ("pyproject.toml", "Python Packaging"),
    ("requirements.txt", "pip"),
    ("Pipfile", "Pipenv"),
    ("Cargo.toml", "Cargo"),
    ("go.mod", "Go Modules"),
    ("pom.xml", "Maven"),
    ("build.gradle", "Gradle"),
    ("build.gradle.kts", "Gradle"),
    (".eslintrc", "ESLint"),
    (".eslintrc.js", "ESLint"),
    (".eslintrc.json", "ESLint"),
    (".prettierrc", "Prettier"),
    ("ruff.toml", "Ruff"),
    (".flake8", "Flake8"),
    ("mypy.ini", "mypy"),
];

/// Tools recognised from manifest/lockfile/config contents.
const CONTENT_TOOLS: &[(&str, &str)] = &[
    ("postgres", "PostgreSQL"),
    ("psycopg", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("sqlite", "SQLite"),
    ("mongodb", "MongoDB"),
    ("mongoose", "MongoDB"),
    ("redis", "Redis"),
    ("graphql", "GraphQL"),
    ("grpc", "gRPC"),
    ("kafka", "Kafka"),
    ("rabbitmq", "RabbitMQ"),
    ("elasticsearch", "Elasticsearch"),
    ("boto3", "AWS"),
    ("aws-sdk", "AWS"),
    ("google-cloud", "Google Cloud"),
    ("azure-", "Azure"),
    ("terraform", "Terraform"),
    ("ansible", "Ansible"),
    ("kubernetes", "Kubernetes"),
    ("pytest", "pytest"),
    ("jest", "Jest"),
    ("junit", "JUnit"),
    ("gtest", "GoogleTest"),
    ("webpack", "webpack"),
    ("vite", "Vite"),
    ("babel", "Babel"),
];

/// Filenames whose contents are scanned for [`CONTENT_TOOLS`].
const SCANNED_MANIFESTS: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "requirements.txt",
    "pyproject.toml",
    "Pipfile",
    "setup.py",
    "Cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "CMakeLists.txt",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
];

/// Commit-message prefixes that count as conventional commits.
const CONVENTIONAL_PREFIXES: &[&str] = &[
    "feat", "fix", "chore", "docs", "refactor", "test", "ci", "build", "perf", "style",
];

static CONTENT_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(CONTENT_TOOLS.iter().map(|(needle, _)| *needle))
        .expect("static pattern set")
});

/// Offline baseline extraction. Always runs.
pub fn extract_baseline(files: &[SourceFile], commits: &[CommitRecord]) -> SkillReport {
    let mut tools: BTreeSet<String> = BTreeSet::new();
    let mut practices: BTreeSet<String> = BTreeSet::new();

    let mut has_tests = false;
    let mut has_ci = false;
    let mut has_linter = false;
    let mut has_formatter = false;
    let mut doc_files = 0usize;

    for file in files {
        let name = file.file_name();

        for (filename, tool) in FILENAME_TOOLS {
            if name == *filename || name.starts_with(&format!("{filename}.")) {
                tools.insert((*tool).to_string());
            }
        }

        if file.rel_path.starts_with(".github/workflows/") {
            tools.insert("GitHub Actions".to_string());
            has_ci = true;
        }
        if name == ".gitlab-ci.yml" || name == "Jenkinsfile" {
            has_ci = true;
        }
        if name.starts_with(".eslintrc") || name == "ruff.toml" || name == ".flake8"
            || name == "mypy.ini"
        {
            has_linter = true;
        }
        if name.starts_with(".prettierrc") || name == "rustfmt.toml" || name == ".clang-format" {
            has_formatter = true;
        }
        if file.looks_like_test() {
            has_tests = true;
        }
        if ContentCategory::from_path(&file.rel_path) == ContentCategory::Doc {
            doc_files += 1;
        }

        if SCANNED_MANIFESTS.contains(&name) {
            if let Some(text) = &file.text {
                let lower = text.to_ascii_lowercase();
                for hit in CONTENT_MATCHER.find_iter(&lower) {
                    tools.insert(CONTENT_TOOLS[hit.pattern().as_usize()].1.to_string());
                }
            }
        }
    }

    if has_tests {
        practices.insert("Automated Testing".to_string());
    }
    if has_ci {
        practices.insert("Continuous Integration".to_string());
    }
    if has_linter {
        practices.insert("Code Linting".to_string());
    }
    if has_formatter {
        practices.insert("Code Formatting".to_string());
    }
    if !files.is_empty() && doc_files as f64 / files.len() as f64 >= DOC_DENSITY_FLOOR {
        practices.insert("Documentation".to_string());
    }

    if !commits.is_empty() {
        let conventional = commits
            .iter()
            .filter(|commit| is_conventional_commit(&commit.summary))
            .count();
        if conventional as f64 / commits.len() as f64 >= CONVENTIONAL_COMMIT_FLOOR {
            practices.insert("Conventional Commits".to_string());
        }
        if commits.iter().any(|commit| {
            commit.summary.starts_with("Merge pull request")
                || commit.summary.contains("See merge request")
                || commit.summary.starts_with("Merged in ")
        }) {
            practices.insert("Code Review".to_string());
        }
    }

    SkillReport {
        tools: tools.into_iter().collect(),
        practices: practices.into_iter().collect(),
    }
}

fn is_conventional_commit(message: &str) -> bool {
    let head = message.split(':').next().unwrap_or("");
    let head = head.split('(').next().unwrap_or("").trim();
    CONVENTIONAL_PREFIXES.contains(&head) && message.contains(':')
}

#[derive(Deserialize)]
struct LlmSkillPayload {
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    practices: Vec<String>,
}

/// Full extraction: baseline plus optional LLM augmentation.
///
/// Augmentation runs only when the consent gate admits the model; any
/// failure or malformed payload is discarded and the baseline returned.
pub async fn extract_skills(
    files: &[SourceFile],
    commits: &[CommitRecord],
    gate: &ConsentGate,
    model: Option<&dyn CompletionModel>,
    deadline: Duration,
) -> SkillReport {
    let baseline = extract_baseline(files, commits);

    let Some(model) = model else {
        return baseline;
    };
    if !gate.model_allowed(model.model_id()) {
        debug!("consent gate closed; skipping skill augmentation");
        return baseline;
    }

    let prompt = augmentation_prompt(files, &baseline);
    let schema = r#"{"tools": ["string"], "practices": ["string"]}"#;

    match model.complete(&prompt, schema, deadline).await {
        Ok(response) => match parse_augmentation(&response) {
            Some(payload) => merge_augmentation(baseline, payload),
            None => {
                warn!("skill augmentation returned malformed JSON; keeping baseline");
                baseline
            }
        },
        Err(err) => {
            warn!(error = %err, "skill augmentation failed; keeping baseline");
            baseline
        }
    }
}

/// Redacted file-tree summary plus the baseline, for the augmentation
/// prompt. File contents are never sent; only paths and detected names.
fn augmentation_prompt(files: &[SourceFile], baseline: &SkillReport) -> String {
    let mut tree: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).take(200).collect();
    tree.sort_unstable();

    format!(
        "Identify developer tools and engineering practices evidenced by this \
         project file listing. Extend the already-detected set; do not repeat it.\n\
         Already detected tools: {}\n\
         Already detected practices: {}\n\
         File listing:\n{}",
        baseline.tools.join(", "),
        baseline.practices.join(", "),
        tree.join("\n"),
    )
}

fn parse_augmentation(response: &str) -> Option<LlmSkillPayload> {
    let object = extract_json_object(response)?;
    serde_json::from_str(object).ok()
}

fn merge_augmentation(baseline: SkillReport, payload: LlmSkillPayload) -> SkillReport {
    let mut tools: BTreeSet<String> = baseline.tools.into_iter().collect();
    let mut practices: BTreeSet<String> = baseline.practices.into_iter().collect();

    for tool in payload.tools {
        let tool = tool.trim();
        if !tool.is_empty() && tool.len() <= 64 {
            tools.insert(tool.to_string());
        }
    }
    for practice in payload.practices {
        let practice = practice.trim();
        if !practice.is_empty() && practice.len() <= 64 {
            practices.insert(practice.to_string());
        }
    }

    SkillReport {
        tools: tools.into_iter().collect(),
        practices: practices.into_iter().collect(),
    }
}
