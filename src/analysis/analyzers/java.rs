//! Java analyser variant.
//!
//! Scans type declarations, inheritance and interface usage for an OOP
//! score, matches a fixed design-pattern catalogue, and summarises
//! annotation usage.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::json;

use super::{count_lines, is_integration_path, summary_line, AnalyzerOutput, CodeAnalyzer};
use crate::analysis::source::SourceFile;
use crate::core::errors::Result;

/// Fixed design-pattern catalogue: `(pattern name, needles)`. A pattern
/// hits when any needle appears in the file.
const PATTERN_CATALOG: &[(&str, &[&str])] = &[
    ("Singleton", &["getInstance(", "private static volatile"]),
    ("Factory", &["Factory ", "Factory<", "Factory{", "Factory("]),
    ("Observer", &["Observer", "addListener(", "notifyObservers("]),
    ("Strategy", &["Strategy ", "Strategy<", "Strategy{"]),
    ("Builder", &["Builder ", "Builder<", ".builder()", "Builder{"]),
    ("Adapter", &["Adapter ", "Adapter<", "Adapter{"]),
    ("Decorator", &["Decorator ", "Decorator<", "Decorator{"]),
];

/// Heuristic analyser for Java sources.
#[derive(Debug, Default)]
pub struct JavaAnalyzer;

impl JavaAnalyzer {
    /// Create the variant.
    pub fn new() -> Self {
        Self
    }
}

impl CodeAnalyzer for JavaAnalyzer {
    fn language(&self) -> &'static str {
        "Java"
    }

    fn handles(&self, language: &str) -> bool {
        language.eq_ignore_ascii_case("java")
    }

    fn analyze(&self, files: &[SourceFile]) -> Result<AnalyzerOutput> {
        let mut output = AnalyzerOutput::default();

        let mut interface_count = 0usize;
        let mut extends_count = 0usize;
        let mut implements_count = 0usize;
        let mut annotations: BTreeMap<String, usize> = BTreeMap::new();
        let mut patterns: BTreeSet<&str> = BTreeSet::new();

        for file in files {
            if file.extension() != "java" {
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

            let mut test_methods = 0usize;

            for line in text.lines() {
                let trimmed = line.trim_start();

                if is_type_declaration(trimmed, "class ") {
                    output.class_count += 1;
                    if trimmed.contains(" extends ") {
                        extends_count += 1;
                    }
                    if trimmed.contains(" implements ") {
                        implements_count += 1;
                    }
                } else if is_type_declaration(trimmed, "interface ") {
                    interface_count += 1;
                } else if is_method_declaration(trimmed) {
                    output.function_count += 1;
                } else if let Some(annotation) = trimmed.strip_prefix('@') {
                    let name = annotation
                        .split(|c: char| c == '(' || c.is_whitespace())
                        .next()
                        .unwrap_or("")
                        .to_string();
                    if !name.is_empty() {
                        if name == "Test" || name == "ParameterizedTest" {
                            test_methods += 1;
                        }
                        *annotations.entry(name).or_default() += 1;
                    }
                }

                for (pattern, needles) in PATTERN_CATALOG {
                    if needles.iter().any(|needle| trimmed.contains(needle)) {
                        patterns.insert(pattern);
                    }
                }
            }

            if test_methods > 0 || file.looks_like_test() {
                let count = test_methods.max(1);
                if is_integration_path(&file.rel_path) {
                    output.test_count_integration += count;
                } else {
                    output.test_count_unit += count;
                }
            }
        }

        let oop_score = oop_score(
            output.class_count,
            interface_count,
            extends_count,
            implements_count,
        );

        let annotation_total: usize = annotations.values().sum();
        let mut top_annotations: Vec<(&String, &usize)> = annotations.iter().collect();
        top_annotations.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        output.features = json!({
            "oop_score": oop_score,
            "design_patterns": patterns.iter().collect::<Vec<_>>(),
            "interface_count": interface_count,
            "inheritance_count": extends_count,
            "annotations": {
                "count": annotation_total,
                "top": top_annotations
                    .iter()
                    .take(8)
                    .map(|(name, count)| json!({"name": name, "count": count}))
                    .collect::<Vec<_>>(),
            },
        });

        let extra = if patterns.is_empty() {
            None
        } else {
            Some(format!(
                "Design patterns: {}.",
                patterns.iter().copied().collect::<Vec<_>>().join(", ")
            ))
        };
        output.summary_text = summary_line("Java", &output, extra);
        Ok(output)
    }
}

fn is_type_declaration(trimmed: &str, keyword: &str) -> bool {
    let stripped = trimmed
        .trim_start_matches("public ")
        .trim_start_matches("protected ")
        .trim_start_matches("private ")
        .trim_start_matches("final ")
        .trim_start_matches("abstract ")
        .trim_start_matches("static ");
    stripped.starts_with(keyword)
}

/// Method declarations: visibility or static modifier, a parameter list,
/// and no type keyword on the line.
fn is_method_declaration(trimmed: &str) -> bool {
    let has_modifier = trimmed.starts_with("public ")
        || trimmed.starts_with("protected ")
        || trimmed.starts_with("private ")
        || trimmed.starts_with("static ");
    has_modifier
        && trimmed.contains('(')
        && !trimmed.contains(" class ")
        && !trimmed.contains(" interface ")
        && !trimmed.contains(" enum ")
        && !trimmed.contains(" record ")
        && !trimmed.contains('=')
}

/// Score 0..=10 from inheritance usage and interface density.
fn oop_score(classes: usize, interfaces: usize, extends: usize, implements: usize) -> u8 {
    if classes == 0 && interfaces == 0 {
        return 0;
    }
    let types = (classes + interfaces) as f64;
    let interface_density = interfaces as f64 / types;
    let inheritance_usage = ((extends + implements) as f64 / classes.max(1) as f64).min(1.0);

    let score = 2.0 + interface_density * 4.0 + inheritance_usage * 4.0;
    score.round().clamp(0.0, 10.0) as u8
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
    fn test_counts_types_and_methods() {
        let source = r#"
public interface Repository {
    void save(String item);
}

public class FileRepository implements Repository {
    @Override
    public void save(String item) {
    }

    private String normalize(String item) {
        return item.trim();
    }
}
"#;
        let output = JavaAnalyzer::new()
            .analyze(&[file("src/main/java/FileRepository.java", source)])
            .unwrap();

        assert_eq!(output.class_count, 1);
        assert_eq!(output.features["interface_count"], 1);
        // Interface method signatures carry no modifier and are not counted.
        assert_eq!(output.function_count, 2);
        assert!(output.features["oop_score"].as_u64().unwrap() >= 4);
    }

    #[test]
    fn test_pattern_catalogue_hits() {
        let source = r#"
public class ConnectionFactory {
    private static ConnectionFactory instance;

    public static ConnectionFactory getInstance() {
        return instance;
    }
}
"#;
        let output = JavaAnalyzer::new()
            .analyze(&[file("ConnectionFactory.java", source)])
            .unwrap();

        let patterns = output.features["design_patterns"].as_array().unwrap();
        let names: Vec<&str> = patterns.iter().filter_map(|v| v.as_str()).collect();
        assert!(names.contains(&"Factory"));
        assert!(names.contains(&"Singleton"));
    }

    #[test]
    fn test_annotation_summary_and_tests() {
        let source = r#"
public class ServiceTest {
    @Test
    public void savesItems() {
    }

    @Test
    public void rejectsNull() {
    }
}
"#;
        let output = JavaAnalyzer::new()
            .analyze(&[file("src/test/java/ServiceTest.java", source)])
            .unwrap();

        assert_eq!(output.test_count_unit, 2);
        assert_eq!(output.features["annotations"]["count"], 2);
        assert_eq!(
            output.features["annotations"]["top"][0]["name"],
            "Test"
        );
    }

    #[test]
    fn test_oop_score_bounds() {
        assert_eq!(oop_score(0, 0, 0, 0), 0);
        assert!(oop_score(1, 0, 0, 0) >= 2);
        assert!(oop_score(4, 4, 4, 4) <= 10);
    }
}
