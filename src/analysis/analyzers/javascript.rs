//! JavaScript / TypeScript analyser variant.
//!
//! One variant covers both languages; the feature bag records TypeScript
//! adoption, module system, runtime target, and framework/test tooling
//! hints from import lines.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde_json::json;

use super::{count_lines, is_integration_path, summary_line, AnalyzerOutput, CodeAnalyzer};
use crate::analysis::source::SourceFile;
use crate::core::errors::Result;

const JS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];
const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Front-end framework needles in priority order; first hit wins.
const FRAMEWORK_NEEDLES: &[(&str, &str)] = &[
    ("react", "React"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("@angular", "Angular"),
];

const TEST_FRAMEWORK_NEEDLES: &[(&str, &str)] = &[
    ("@jest/globals", "Jest"),
    ("jest", "Jest"),
    ("vitest", "Vitest"),
    ("mocha", "Mocha"),
    ("@playwright/test", "Playwright"),
    ("cypress", "Cypress"),
];

static FRAMEWORK_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(FRAMEWORK_NEEDLES.iter().map(|(needle, _)| *needle))
        .expect("static pattern set")
});

static TEST_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(TEST_FRAMEWORK_NEEDLES.iter().map(|(needle, _)| *needle))
        .expect("static pattern set")
});

/// Heuristic analyser for JavaScript and TypeScript sources.
#[derive(Debug, Default)]
pub struct JavaScriptAnalyzer;

impl JavaScriptAnalyzer {
    /// Create the variant.
    pub fn new() -> Self {
        Self
    }
}

impl CodeAnalyzer for JavaScriptAnalyzer {
    fn language(&self) -> &'static str {
        "JavaScript"
    }

    fn handles(&self, language: &str) -> bool {
        language.eq_ignore_ascii_case("javascript") || language.eq_ignore_ascii_case("typescript")
    }

    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput> {
        let mut output = AnalyzerOutput::default();

        let mut esm_signals = 0usize;
        let mut cjs_signals = 0usize;
        let mut ts_files = 0usize;
        let mut async_await = false;
        let mut node_signals = 0usize;
        let mut browser_signals = 0usize;
        let mut framework: Option<&str> = None;
        let mut test_framework: Option<&str> = None;

        for file in files {
            let ext = file.extension();
            let is_ts = TS_EXTENSIONS.contains(&ext.as_str());
            if !is_ts && !JS_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            output.file_count += 1;
            if is_ts {
                ts_files += 1;
            }

            let Some(text) = &file.text else {
                output.parse_error_count += 1;
                continue;
            };

            let (loc, comments) = count_lines(text, "//");
            output.total_loc += loc;
            output.comment_loc += comments;

            let mut test_fns = 0usize;
            for line in text.lines() {
                let trimmed = line.trim_start();

                if trimmed.starts_with("import ") || trimmed.starts_with("export ") {
                    esm_signals += 1;
                } else if trimmed.contains("require(") || trimmed.contains("module.exports") {
                    cjs_signals += 1;
                }

                if is_function_line(trimmed) {
                    output.function_count += 1;
                }
                if trimmed.starts_with("class ")
                    || trimmed.starts_with("export class ")
                    || trimmed.starts_with("export default class ")
                    || trimmed.starts_with("export abstract class ")
                {
                    output.class_count += 1;
                }

                if trimmed.contains("async ") || trimmed.contains("await ") {
                    async_await = true;
                }
                if trimmed.contains("process.") || trimmed.contains("require('fs')")
                    || trimmed.contains("require(\"fs\")")
                    || trimmed.contains("node:")
                {
                    node_signals += 1;
                }
                if trimmed.contains("document.") || trimmed.contains("window.") {
                    browser_signals += 1;
                }

                if trimmed.starts_with("it(")
                    || trimmed.starts_with("test(")
                    || trimmed.starts_with("it.each")
                    || trimmed.starts_with("test.each")
                {
                    test_fns += 1;
                }

                let lower = trimmed.to_ascii_lowercase();
                if framework.is_none() {
                    if let Some(hit) = FRAMEWORK_MATCHER.find(&lower) {
                        if lower.contains("import") || lower.contains("require") {
                            framework = Some(FRAMEWORK_NEEDLES[hit.pattern().as_usize()].1);
                        }
                    }
                }
                if test_framework.is_none() {
                    if let Some(hit) = TEST_MATCHER.find(&lower) {
                        if lower.contains("import") || lower.contains("require") {
                            test_framework = Some(TEST_FRAMEWORK_NEEDLES[hit.pattern().as_usize()].1);
                        }
                    }
                }
            }

            if file.looks_like_test() || test_fns > 0 {
                let count = test_fns.max(1);
                if is_integration_path(&file.rel_path) {
                    output.test_count_integration += count;
                } else {
                    output.test_count_unit += count;
                }
            }
        }

        let module_system = match (esm_signals > 0, cjs_signals > 0) {
            (true, false) => "esm",
            (false, true) => "cjs",
            (true, true) => "mixed",
            (false, false) => "unknown",
        };

        let runtime = if node_signals > browser_signals && node_signals > 0 {
            "node"
        } else if browser_signals > 0 {
            "browser"
        } else {
            "unknown"
        };

        output.features = json!({
            "module_system": module_system,
            "typescript": ts_files > 0,
            "frontend_framework": framework.unwrap_or("none"),
            "runtime_hint": runtime,
            "uses_async_await": async_await,
            "test_framework": test_framework.unwrap_or("none"),
        });

        let language = if ts_files > 0 && ts_files >= output.file_count / 2 {
            "TypeScript"
        } else {
            "JavaScript"
        };
        let extra = framework.map(|f| format!("Front-end framework: {f}."));
        output.summary_text = summary_line(language, &output, extra);
        Ok(output)
    }
}

/// Function declarations and arrow-function bindings, with the usual
/// `export`/`default` prefixes stripped first.
fn is_function_line(trimmed: &str) -> bool {
    let stripped = trimmed
        .trim_start_matches("export ")
        .trim_start_matches("default ");
    stripped.starts_with("function ")
        || stripped.starts_with("async function ")
        || (stripped.contains("=>")
            && (stripped.starts_with("const ")
                || stripped.starts_with("let ")
                || stripped.starts_with("var ")))
}
