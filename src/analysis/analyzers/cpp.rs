//! C/C++ analyser variant.
//!
//! Covers both C and C++ sources: modern-feature adoption, a fixed
//! design-pattern catalogue, data-structure families, and
//! algorithmic-idiom tags from a small catalogue.

use std::collections::BTreeSet;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde_json::json;

use super::{count_lines, is_integration_path, summary_line, AnalyzerOutput, CodeAnalyzer};
use crate::analysis::source::SourceFile;
use crate::core::errors::Result;

const EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx"];

/// Data-structure families keyed by the container they use.
const DATA_STRUCTURES: &[(&str, &str)] = &[
    ("std::vector", "dynamic array"),
    ("std::array", "fixed array"),
    ("std::map", "ordered map"),
    ("std::unordered_map", "hash map"),
    ("std::set", "ordered set"),
    ("std::unordered_set", "hash set"),
    ("std::list", "linked list"),
    ("std::deque", "deque"),
    ("std::queue", "queue"),
    ("std::priority_queue", "heap"),
    ("std::stack", "stack"),
];

/// Algorithmic idiom catalogue mapped to complexity tags.
const ALGORITHM_IDIOMS: &[(&str, &str)] = &[
    ("std::sort", "sorting (n log n)"),
    ("std::stable_sort", "sorting (n log n)"),
    ("std::binary_search", "binary search (log n)"),
    ("std::lower_bound", "binary search (log n)"),
    ("std::upper_bound", "binary search (log n)"),
    ("memo", "memoization"),
    ("dp[", "dynamic programming"),
    ("dfs(", "graph traversal"),
    ("bfs(", "graph traversal"),
    ("dijkstra", "shortest path"),
];

/// Design-pattern catalogue shared with the Java variant's shape.
const PATTERN_CATALOG: &[(&str, &[&str])] = &[
    ("Singleton", &["getInstance(", "instance()"]),
    ("Factory", &["Factory"]),
    ("Observer", &["Observer", "subscribe(", "notify("]),
    ("Strategy", &["Strategy"]),
    ("Builder", &["Builder"]),
    ("RAII", &["lock_guard", "unique_lock", "scoped_lock"]),
];

static STRUCTURE_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(DATA_STRUCTURES.iter().map(|(needle, _)| *needle))
        .expect("static pattern set")
});

static IDIOM_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(ALGORITHM_IDIOMS.iter().map(|(needle, _)| *needle))
        .expect("static pattern set")
});

/// Heuristic analyser for C and C++ sources.
#[derive(Debug, Default)]
pub struct CppAnalyzer;

impl CppAnalyzer {
    /// Create the variant.
    pub fn new() -> Self {
        Self
    }
}

impl CodeAnalyzer for CppAnalyzer {
    fn language(&self) -> &'static str {
        "C++"
    }

    fn handles(&self, language: &str) -> bool {
        language.eq_ignore_ascii_case("c++")
            || language.eq_ignore_ascii_case("c")
            || language.eq_ignore_ascii_case("cpp")
    }

    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput> {
        let mut output = AnalyzerOutput::default();

        let mut smart_pointer_uses = 0usize;
        let mut range_for_uses = 0usize;
        let mut template_uses = 0usize;
        let mut structures: BTreeSet<&str> = BTreeSet::new();
        let mut idioms: BTreeSet<&str> = BTreeSet::new();
        let mut patterns: BTreeSet<&str> = BTreeSet::new();

        for file in files {
            if !EXTENSIONS.contains(&file.extension().as_str()) {
                continue;
            }
            output.file_count += 1;

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

                if trimmed.starts_with("class ") || trimmed.starts_with("struct ") {
                    output.class_count += 1;
                }
                if looks_like_function_definition(trimmed) {
                    output.function_count += 1;
                }

                if trimmed.contains("unique_ptr")
                    || trimmed.contains("shared_ptr")
                    || trimmed.contains("make_unique")
                    || trimmed.contains("make_shared")
                {
                    smart_pointer_uses += 1;
                }
                if is_range_based_for(trimmed) {
                    range_for_uses += 1;
                }
                if trimmed.starts_with("template") {
                    template_uses += 1;
                }

                for hit in STRUCTURE_MATCHER.find_iter(trimmed) {
                    structures.insert(DATA_STRUCTURES[hit.pattern().as_usize()].1);
                }
                for hit in IDIOM_MATCHER.find_iter(trimmed) {
                    idioms.insert(ALGORITHM_IDIOMS[hit.pattern().as_usize()].1);
                }
                for (pattern, needles) in PATTERN_CATALOG {
                    if needles.iter().any(|needle| trimmed.contains(needle)) {
                        patterns.insert(pattern);
                    }
                }

                if trimmed.starts_with("TEST(")
                    || trimmed.starts_with("TEST_F(")
                    || trimmed.starts_with("TEST_CASE(")
                {
                    test_fns += 1;
                }
            }

            if test_fns > 0 || file.looks_like_test() {
                let count = test_fns.max(1);
                if is_integration_path(&file.rel_path) {
                    output.test_count_integration += count;
                } else {
                    output.test_count_unit += count;
                }
            }
        }

        output.features = json!({
            "modern_features": {
                "smart_pointers": smart_pointer_uses,
                "range_based_for": range_for_uses,
                "templates": template_uses,
            },
            "design_patterns": patterns.iter().collect::<Vec<_>>(),
            "data_structures": structures.iter().collect::<Vec<_>>(),
            "algorithm_tags": idioms.iter().collect::<Vec<_>>(),
        });

        let extra = if smart_pointer_uses + range_for_uses + template_uses > 0 {
            Some("Modern C++ features in use.".to_string())
        } else {
            None
        };
        output.summary_text = summary_line("C/C++", &output, extra);
        Ok(output)
    }
}

/// Function definitions: a parameter list and an opening brace, filtered
/// of control-flow keywords.
fn looks_like_function_definition(trimmed: &str) -> bool {
    if !trimmed.contains('(') || !trimmed.contains('{') {
        return false;
    }
    const CONTROL: &[&str] = &["if ", "if(", "for ", "for(", "while ", "while(", "switch ", "switch(", "catch ", "catch("];
    if CONTROL.iter().any(|kw| trimmed.starts_with(kw)) {
        return false;
    }
    !trimmed.starts_with("class ") && !trimmed.starts_with("struct ") && !trimmed.starts_with('#')
}

/// `for (auto x : xs)` style iteration.
fn is_range_based_for(trimmed: &str) -> bool {
    let Some(rest) = trimmed
        .strip_prefix("for (")
        .or_else(|| trimmed.strip_prefix("for("))
    else {
        return false;
    };
    rest.split(')').next().map(|head| head.contains(" : ")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(rel: &str, text: &str) -> SourceFile {
        SourceFile {
            rel_path: rel.to_string(),
            size: text.len() as u64,
            text: Some(text.to_string()),
            sampled: false,
            modified: None,
        }
    }

    #[test]
    fn test_modern_feature_detection() {
        let source = r#"
#include <memory>
#include <vector>

template <typename T>
class Pool {
public:
    void add(std::unique_ptr<T> item) {
        items_.push_back(std::move(item));
    }

    void visit() {
        for (auto& item : items_) {
            item->touch();
        }
    }

private:
    std::vector<std::unique_ptr<T>> items_;
};
"#;
        let output = CppAnalyzer::new()
            .analyze(&[file("pool.hpp", source)])
            .unwrap();

        let modern = &output.features["modern_features"];
        assert!(modern["smart_pointers"].as_u64().unwrap() >= 2);
        assert_eq!(modern["range_based_for"], 1);
        assert_eq!(modern["templates"], 1);

        let structures = output.features["data_structures"].as_array().unwrap();
        assert!(structures.iter().any(|s| s == "dynamic array"));
    }

    #[test]
    fn test_algorithm_tags() {
        let source = r#"
#include <algorithm>

void rank(std::vector<int>& xs) {
    std::sort(xs.begin(), xs.end());
    bool found = std::binary_search(xs.begin(), xs.end(), 42);
    (void)found;
}
"#;
        let output = CppAnalyzer::new()
            .analyze(&[file("rank.cpp", source)])
            .unwrap();

        let tags = output.features["algorithm_tags"].as_array().unwrap();
        let names: Vec<&str> = tags.iter().filter_map(|v| v.as_str()).collect();
        assert!(names.contains(&"sorting (n log n)"));
        assert!(names.contains(&"binary search (log n)"));
    }

    #[test]
    fn test_gtest_detection() {
        let source = "TEST(PoolTest, AddsItems) {\n  EXPECT_EQ(1, 1);\n}\n";
        let output = CppAnalyzer::new()
            .analyze(&[file("pool_test.cpp", source)])
            .unwrap();
        assert_eq!(output.test_count_unit, 1);
    }

    #[test]
    fn test_plain_c_is_handled() {
        let analyzer = CppAnalyzer::new();
        assert!(analyzer.handles("C"));

        let source = "int main(void) {\n    return 0;\n}\n";
        let output = analyzer.analyze(&[file("main.c", source)]).unwrap();
        assert_eq!(output.file_count, 1);
        assert_eq!(output.function_count, 1);
    }
}
