//! Language and framework detection.
//!
//! Weighs file extensions and manifest filenames against a fixed ruleset,
//! breaking ties by total byte share. Framework detection keys on manifest
//! contents and only runs once a language matched. Fully deterministic and
//! offline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::source::SourceFile;

/// Weight contributed by one matching source file.
const FILE_WEIGHT: f64 = 1.0;

/// Weight contributed by a recognised manifest at any depth.
const MANIFEST_WEIGHT: f64 = 5.0;

/// Minimum winning weight; below this the project reports no language.
const WEIGHT_FLOOR: f64 = 1.0;

/// Detected primary language and framework for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedStack {
    /// Primary language, if any rule cleared the floor
    pub language: Option<String>,
    /// Framework, only ever present alongside a language
    pub framework: Option<String>,
}

struct LanguageRule {
    name: &'static str,
    extensions: &'static [&'static str],
    manifests: &'static [&'static str],
}

const LANGUAGE_RULES: &[LanguageRule] = &[
    LanguageRule {
        name: "Python",
        extensions: &["py", "pyi", "pyw"],
        manifests: &["pyproject.toml", "setup.py", "requirements.txt", "Pipfile"],
    },
    LanguageRule {
        name: "TypeScript",
        extensions: &["ts", "tsx", "mts", "cts"],
        manifests: &["tsconfig.json"],
    },
    LanguageRule {
        name: "JavaScript",
        extensions: &["js", "jsx", "mjs", "cjs"],
        manifests: &["package.json"],
    },
    LanguageRule {
        name: "Java",
        extensions: &["java"],
        manifests: &["pom.xml", "build.gradle", "build.gradle.kts"],
    },
    LanguageRule {
        name: "C++",
        extensions: &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
        manifests: &["CMakeLists.txt"],
    },
    LanguageRule {
        name: "C",
        extensions: &["c"],
        manifests: &[],
    },
    LanguageRule {
        name: "Rust",
        extensions: &["rs"],
        manifests: &["Cargo.toml"],
    },
    LanguageRule {
        name: "Go",
        extensions: &["go"],
        manifests: &["go.mod"],
    },
    LanguageRule {
        name: "Ruby",
        extensions: &["rb"],
        manifests: &["Gemfile"],
    },
    LanguageRule {
        name: "PHP",
        extensions: &["php"],
        manifests: &["composer.json"],
    },
    LanguageRule {
        name: "C#",
        extensions: &["cs"],
        manifests: &[],
    },
    LanguageRule {
        name: "Kotlin",
        extensions: &["kt", "kts"],
        manifests: &[],
    },
    LanguageRule {
        name: "Swift",
        extensions: &["swift"],
        manifests: &["Package.swift"],
    },
];

/// Framework patterns searched inside manifest contents, per language.
const FRAMEWORK_RULES: &[(&str, &[(&str, &str)])] = &[
    (
        "Python",
        &[
            ("django", "Django"),
            ("flask", "Flask"),
            ("fastapi", "FastAPI"),
        ],
    ),
    (
        "JavaScript",
        &[
            ("\"next\"", "Next.js"),
            ("\"react\"", "React"),
            ("\"vue\"", "Vue"),
            ("\"svelte\"", "Svelte"),
            ("@angular/core", "Angular"),
            ("\"express\"", "Express"),
        ],
    ),
    (
        "TypeScript",
        &[
            ("\"next\"", "Next.js"),
            ("\"react\"", "React"),
            ("\"vue\"", "Vue"),
            ("\"svelte\"", "Svelte"),
            ("@angular/core", "Angular"),
            ("\"express\"", "Express"),
            ("\"nestjs\"", "NestJS"),
            ("@nestjs/core", "NestJS"),
        ],
    ),
    (
        "Java",
        &[
            ("spring-boot", "Spring Boot"),
            ("springframework", "Spring"),
            ("com.android", "Android"),
        ],
    ),
    ("C++", &[("qt", "Qt")]),
    (
        "Rust",
        &[
            ("actix-web", "Actix Web"),
            ("axum", "Axum"),
            ("rocket", "Rocket"),
        ],
    ),
    ("Go", &[("gin-gonic", "Gin"), ("labstack/echo", "Echo")]),
];

/// Manifest filenames whose contents feed framework detection.
const FRAMEWORK_MANIFESTS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "Pipfile",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "CMakeLists.txt",
    "Cargo.toml",
    "go.mod",
];

/// Detect the primary language and framework from a project's file set.
pub fn detect_stack(files: &[SourceFile]) -> DetectedStack {
    let mut weights: HashMap<&'static str, f64> = HashMap::new();
    let mut byte_share: HashMap<&'static str, u64> = HashMap::new();

    for file in files {
        let ext = file.extension();
        let name = file.file_name();

        for rule in LANGUAGE_RULES {
            if rule.extensions.contains(&ext.as_str()) {
                *weights.entry(rule.name).or_default() += FILE_WEIGHT;
                *byte_share.entry(rule.name).or_default() += file.size;
            }
            if rule.manifests.contains(&name) {
                *weights.entry(rule.name).or_default() += MANIFEST_WEIGHT;
            }
        }
    }

    let winner = weights
        .iter()
        .max_by(|(a_name, a_weight), (b_name, b_weight)| {
            a_weight
                .partial_cmp(b_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    byte_share
                        .get(*a_name)
                        .copied()
                        .unwrap_or(0)
                        .cmp(&byte_share.get(*b_name).copied().unwrap_or(0))
                })
                // Stable final tie-break so detection never flip-flops.
                .then_with(|| b_name.cmp(a_name))
        })
        .filter(|(_, weight)| **weight >= WEIGHT_FLOOR)
        .map(|(name, _)| (*name).to_string());

    let Some(language) = winner else {
        debug!("no language cleared the detection floor");
        return DetectedStack::default();
    };

    let framework = detect_framework(&language, files);
    DetectedStack {
        language: Some(language),
        framework,
    }
}

/// Framework detection keys on manifest contents and is gated on a
/// language match.
fn detect_framework(language: &str, files: &[SourceFile]) -> Option<String> {
    let patterns = FRAMEWORK_RULES
        .iter()
        .find(|(lang, _)| *lang == language)
        .map(|(_, patterns)| *patterns)?;

    let mut manifest_text = String::new();
    for file in files {
        if FRAMEWORK_MANIFESTS.contains(&file.file_name()) {
            if let Some(text) = &file.text {
                manifest_text.push_str(&text.to_ascii_lowercase());
                manifest_text.push('\n');
            }
        }
    }
    if manifest_text.is_empty() {
        return None;
    }

    patterns
        .iter()
        .find(|(needle, _)| manifest_text.contains(&needle.to_ascii_lowercase()))
        .map(|(_, framework)| (*framework).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(rel: &str, size: u64, text: &str) -> SourceFile {
        SourceFile {
            rel_path: rel.to_string(),
            size,
            text: Some(text.to_string()),
            sampled: false,
            modified: None,
        }
    }

    #[test]
    fn test_single_python_file_detects_python() {
        let files = vec![file("main.py", 100, "print('hi')"), file("README.md", 40, "# Demo")];
        let stack = detect_stack(&files);
        assert_eq!(stack.language.as_deref(), Some("Python"));
        assert_eq!(stack.framework, None);
    }

    #[test]
    fn test_no_code_files_detects_nothing() {
        let files = vec![file("README.md", 40, "# Demo"), file("notes.txt", 10, "todo")];
        let stack = detect_stack(&files);
        assert_eq!(stack, DetectedStack::default());
    }

    #[test]
    fn test_manifest_outweighs_stray_files() {
        // One stray script should not beat a manifest-backed project.
        let files = vec![
            file("scripts/helper.py", 500, "pass"),
            file("package.json", 50, "{\"dependencies\":{}}"),
            file("index.js", 100, "console.log(1)"),
        ];
        let stack = detect_stack(&files);
        assert_eq!(stack.language.as_deref(), Some("JavaScript"));
    }

    #[test]
    fn test_byte_share_breaks_ties() {
        let files = vec![
            file("a.py", 4000, "pass"),
            file("b.js", 100, "console.log(1)"),
        ];
        let stack = detect_stack(&files);
        assert_eq!(stack.language.as_deref(), Some("Python"));
    }

    #[test]
    fn test_react_framework_from_package_json() {
        let files = vec![
            file("package.json", 80, r#"{"dependencies":{"react":"^18.0.0"}}"#),
            file("src/App.jsx", 300, "export default function App() {}"),
        ];
        let stack = detect_stack(&files);
        assert_eq!(stack.language.as_deref(), Some("JavaScript"));
        assert_eq!(stack.framework.as_deref(), Some("React"));
    }

    #[test]
    fn test_framework_requires_language() {
        // A package.json alone, with no JS files, still detects JavaScript
        // via the manifest, so use a doc-only tree to prove the gate.
        let files = vec![file("README.md", 10, "react react react")];
        let stack = detect_stack(&files);
        assert_eq!(stack.language, None);
        assert_eq!(stack.framework, None);
    }

    #[test]
    fn test_django_from_requirements() {
        let files = vec![
            file("requirements.txt", 30, "Django==4.2\npsycopg2\n"),
            file("manage.py", 200, "import django"),
        ];
        let stack = detect_stack(&files);
        assert_eq!(stack.language.as_deref(), Some("Python"));
        assert_eq!(stack.framework.as_deref(), Some("Django"));
    }
}
