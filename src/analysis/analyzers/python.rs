//! Python analyser variant.
//!
//! Line-oriented scanning of `def`/`class` declarations, decorator usage,
//! type-hint density, and framework hints from import lines.

use std::collections::BTreeSet;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde_json::json;

use super::{count_lines, is_integration_path, summary_line, AnalyzerOutput, CodeAnalyzer};
use crate::analysis::source::SourceFile;
use crate::core::errors::Result;

const EXTENSIONS: &[&str] = &["py", "pyi", "pyw"];

/// `(import needle, hint name, category)` rows for framework detection.
const FRAMEWORK_IMPORTS: &[(&str, &str, &str)] = &[
    ("django", "Django", "web"),
    ("flask", "Flask", "web"),
    ("fastapi", "FastAPI", "web"),
    ("aiohttp", "aiohttp", "web"),
    ("sqlalchemy", "SQLAlchemy", "orm"),
    ("peewee", "Peewee", "orm"),
    ("tortoise", "Tortoise ORM", "orm"),
    ("torch", "PyTorch", "ml"),
    ("tensorflow", "TensorFlow", "ml"),
    ("sklearn", "scikit-learn", "ml"),
    ("numpy", "NumPy", "ml"),
    ("pandas", "pandas", "ml"),
];

static FRAMEWORK_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(FRAMEWORK_IMPORTS.iter().map(|(needle, _, _)| *needle))
        .expect("static pattern set")
});

/// Heuristic analyser for Python sources.
#[derive(Debug, Default)]
pub struct PythonAnalyzer;

impl PythonAnalyzer {
    /// Create the variant.
    pub fn new() -> Self {
        Self
    }
}

impl CodeAnalyzer for PythonAnalyzer {
    fn language(&self) -> &'static str {
        "Python"
    }

    fn handles(&self, language: &str) -> bool {
        language.eq_ignore_ascii_case("python")
    }

    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput> {
        let mut output = AnalyzerOutput::default();

        let mut def_count = 0usize;
        let mut hinted_defs = 0usize;
        let mut async_defs = 0usize;
        let mut decorator_count = 0usize;
        let mut decorator_names: BTreeSet<String> = BTreeSet::new();
        let mut hints: BTreeSet<(&str, &str)> = BTreeSet::new();

        for file in files {
            if !EXTENSIONS.contains(&file.extension().as_str()) {
                continue;
            }
            output.file_count += 1;

            let Some(text) = &file.text else {
                output.parse_error_count += 1;
                continue;
            };

            let (loc, comments) = count_lines(text, "#");
            output.total_loc += loc;
            output.comment_loc += comments;

            let is_test_file = file.looks_like_test();
            let mut test_fns = 0usize;

            for line in text.lines() {
                let trimmed = line.trim_start();

                if trimmed.starts_with("def ") || trimmed.starts_with("async def ") {
                    def_count += 1;
                    if trimmed.starts_with("async def ") {
                        async_defs += 1;
                    }
                    if has_type_hints(trimmed) {
                        hinted_defs += 1;
                    }
                    if trimmed.starts_with("def test_")
                        || trimmed.starts_with("async def test_")
                    {
                        test_fns += 1;
                    }
                } else if trimmed.starts_with("class ") {
                    output.class_count += 1;
                } else if let Some(decorator) = trimmed.strip_prefix('@') {
                    decorator_count += 1;
                    let name = decorator
                        .split(|c: char| c == '(' || c.is_whitespace())
                        .next()
                        .unwrap_or("")
                        .to_string();
                    if !name.is_empty() {
                        decorator_names.insert(name);
                    }
                } else if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
                    for hit in FRAMEWORK_MATCHER.find_iter(&trimmed.to_ascii_lowercase()) {
                        let (_, hint, category) = FRAMEWORK_IMPORTS[hit.pattern().as_usize()];
                        hints.insert((category, hint));
                    }
                }
            }

            if is_test_file || test_fns > 0 {
                let count = test_fns.max(1);
                if is_integration_path(&file.rel_path) {
                    output.test_count_integration += count;
                } else {
                    output.test_count_unit += count;
                }
            }
        }

        output.function_count = def_count;

        let type_hint_density = if def_count > 0 {
            hinted_defs as f64 / def_count as f64
        } else {
            0.0
        };

        let by_category = |wanted: &str| -> Vec<&str> {
            hints
                .iter()
                .filter(|(category, _)| *category == wanted)
                .map(|(_, hint)| *hint)
                .collect()
        };

        output.features = json!({
            "type_hint_density": type_hint_density,
            "async_function_count": async_defs,
            "framework_hints": {
                "web": by_category("web"),
                "orm": by_category("orm"),
                "ml": by_category("ml"),
            },
            "decorators": {
                "count": decorator_count,
                "distinct": decorator_names.iter().take(8).collect::<Vec<_>>(),
            },
        });

        let extra = if type_hint_density > 0.0 {
            Some(format!(
                "{:.0}% of signatures carry type hints.",
                type_hint_density * 100.0
            ))
        } else {
            None
        };
        output.summary_text = summary_line("Python", &output, extra);
        Ok(output)
    }
}

/// A signature counts as hinted when it annotates a return type or any
/// parameter.
fn has_type_hints(def_line: &str) -> bool {
    if def_line.contains("->") {
        return true;
    }
    let Some(open) = def_line.find('(') else {
        return false;
    };
    let params = &def_line[open + 1..def_line.rfind(')').unwrap_or(def_line.len())];
    params.contains(':')
}
