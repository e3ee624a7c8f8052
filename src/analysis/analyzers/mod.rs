//! Language-specific code analysers.
//!
//! A polymorphic family keyed by detected language. Each variant performs
//! heuristic, line-oriented scanning (no compiler, no AST) and reports a
//! uniform metrics record plus a language-specific `features` bag. New
//! languages are added by registering a variant, not by editing existing
//! ones.

pub mod cpp;
pub mod java;
pub mod javascript;
pub mod python;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::source::SourceFile;
use crate::core::errors::Result;

/// Uniform analyser output shared by every variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerOutput {
    /// Files the variant considered
    pub file_count: usize,
    /// Non-blank lines of code
    pub total_loc: usize,
    /// Comment lines
    pub comment_loc: usize,
    /// Functions found
    pub function_count: usize,
    /// Classes/types found
    pub class_count: usize,
    /// Tests in unit-test locations
    pub test_count_unit: usize,
    /// Tests in integration-test locations
    pub test_count_integration: usize,
    /// Files that could not be scanned
    pub parse_error_count: usize,
    /// Language-specific structured feature bag
    pub features: serde_json::Value,
    /// Human-readable summary
    pub summary_text: String,
}

impl AnalyzerOutput {
    /// Total tests across unit and integration locations.
    pub fn test_count(&self) -> usize {
        self.test_count_unit + self.test_count_integration
    }
}

/// Capability implemented by every language variant.
pub trait CodeAnalyzer: Send + Sync {
    /// Canonical language name this variant reports under.
    fn language(&self) -> &'static str;

    /// Whether this variant handles the detected language string.
    fn handles(&self, language: &str) -> bool;

    /// Analyse a project's file set. Per-file problems are counted and
    /// summarised, never raised; an `Err` here means the whole variant
    /// failed and the caller degrades to the generic path.
    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput>;
}

/// Variants compiled into this build, in registry order.
pub fn registered_analyzers() -> Vec<Box<dyn CodeAnalyzer>> {
    vec![
        Box::new(python::PythonAnalyzer::new()),
        Box::new(javascript::JavaScriptAnalyzer::new()),
        Box::new(java::JavaAnalyzer::new()),
        Box::new(cpp::CppAnalyzer::new()),
    ]
}

/// Resolve the variant for a detected language, if one is registered.
pub fn analyzer_for_language(language: &str) -> Option<Box<dyn CodeAnalyzer>> {
    registered_analyzers()
        .into_iter()
        .find(|analyzer| analyzer.handles(language))
}

/// Run the registered variant for `language`, falling back to the generic
/// path when no variant exists or the variant fails outright.
pub fn analyze_with_fallback(
    language: Option<&str>,
    files: &[SourceFile],
    diagnostics: &mut Vec<String>,
) -> AnalyzerOutput {
    if let Some(language) = language {
        if let Some(analyzer) = analyzer_for_language(language) {
            match analyzer.analyze(files) {
                Ok(output) => return output,
                Err(err) => {
                    warn!(language, error = %err, "analyser failed, degrading to generic");
                    diagnostics.push(format!(
                        "{language} analyser failed ({err}); generic metrics only"
                    ));
                }
            }
        }
    }
    generic_analysis(language, files)
}

/// Generic fallback: file counts, LOC, and test locations only.
pub fn generic_analysis(language: Option<&str>, files: &[SourceFile]) -> AnalyzerOutput {
    let mut output = AnalyzerOutput::default();

    for file in files {
        output.file_count += 1;
        let Some(text) = &file.text else { continue };
        output.total_loc += text.lines().filter(|l| !l.trim().is_empty()).count();
        if file.looks_like_test() {
            if is_integration_path(&file.rel_path) {
                output.test_count_integration += 1;
            } else {
                output.test_count_unit += 1;
            }
        }
    }

    output.summary_text = format!(
        "Generic analysis of {} files ({} non-blank lines){}.",
        output.file_count,
        output.total_loc,
        language
            .map(|l| format!(" for {l}"))
            .unwrap_or_default()
    );
    output.features = serde_json::json!({});
    output
}

/// Shared helpers used by the concrete variants.
pub(crate) fn is_integration_path(rel_path: &str) -> bool {
    let lower = rel_path.to_ascii_lowercase();
    lower.contains("integration") || lower.contains("e2e") || lower.contains("end_to_end")
}

/// Count non-blank lines and lines starting with a comment marker.
pub(crate) fn count_lines(text: &str, line_comment: &str) -> (usize, usize) {
    let mut loc = 0usize;
    let mut comments = 0usize;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        loc += 1;
        if trimmed.starts_with(line_comment) {
            comments += 1;
        }
    }
    (loc, comments)
}

/// Standard summary line shared by the variants.
pub(crate) fn summary_line(
    language: &str,
    output: &AnalyzerOutput,
    extra: Option<String>,
) -> String {
    let mut summary = format!(
        "Analyzed {} {language} files ({} LOC, {} comment lines): {} functions, {} classes, {} tests.",
        output.file_count,
        output.total_loc,
        output.comment_loc,
        output.function_count,
        output.class_count,
        output.test_count(),
    );
    if output.parse_error_count > 0 {
        summary.push_str(&format!(
            " {} files could not be scanned.",
            output.parse_error_count
        ));
    }
    if let Some(extra) = extra {
        summary.push(' ');
        summary.push_str(&extra);
    }
    summary
}
