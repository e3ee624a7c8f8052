//! Résumé-bullet generation with the LLM-first fallback chain.
//!
//! Strict order: consented-and-available LLM, then the language-specific
//! local generator, then the generic local generator. Errors never reach
//! the caller; every failure degrades to local output.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::core::model::{BulletSource, ProjectAnalysis};
use crate::generate::llm::{extract_json_array, CompletionModel};
use crate::generate::local::generate_local;

/// Hard character cap per bullet, mirrored in the LLM instruction.
const BULLET_CHAR_LIMIT: usize = 220;

/// Generate résumé bullets for one analysed project.
///
/// `use_ai` is the caller's request; `model` carries availability. Any AI
/// failure (timeout, malformed payload, empty array) falls back to the
/// deterministic local generator and reports `BulletSource::Local`.
pub async fn generate(
    analysis: &ProjectAnalysis,
    max_bullets: usize,
    use_ai: bool,
    model: Option<&dyn CompletionModel>,
    deadline: Duration,
) -> (Vec<String>, BulletSource) {
    if use_ai {
        if let Some(model) = model {
            match generate_ai(analysis, max_bullets, model, deadline).await {
                Ok(bullets) if !bullets.is_empty() => {
                    return (bullets, BulletSource::Ai);
                }
                Ok(_) => {
                    warn!("AI generation produced no usable bullets; falling back to local");
                }
                Err(err) => {
                    warn!(error = %err, "AI generation failed; falling back to local");
                }
            }
        } else {
            debug!("AI requested but no model available; using local generator");
        }
    }

    (generate_local(analysis, max_bullets), BulletSource::Local)
}

async fn generate_ai(
    analysis: &ProjectAnalysis,
    max_bullets: usize,
    model: &dyn CompletionModel,
    deadline: Duration,
) -> crate::core::errors::Result<Vec<String>> {
    let prompt = build_prompt(analysis, max_bullets);
    let schema = format!(
        "JSON array of at most {max_bullets} strings, each at most {BULLET_CHAR_LIMIT} characters"
    );

    let response = model.complete(&prompt, &schema, deadline).await?;

    let array = extract_json_array(&response).ok_or_else(|| {
        crate::core::errors::CodefolioError::malformed_llm("no JSON array in completion")
    })?;
    let raw: Vec<String> = serde_json::from_str(array)?;

    Ok(sanitize_bullets(raw, max_bullets))
}

/// Prompt embedding a pruned form of the analysis. Only aggregate signals
/// are sent; file contents never leave the machine from here.
fn build_prompt(analysis: &ProjectAnalysis, max_bullets: usize) -> String {
    let pruned = json!({
        "language": analysis.language,
        "framework": analysis.framework,
        "tools": analysis.tools,
        "practices": analysis.practices,
        "code_metrics": analysis.code_metrics,
        "language_specific": analysis.language_specific,
        "role": analysis.role,
        "contribution_pct": analysis.contribution_pct,
        "is_collaborative": analysis.is_collaborative,
        "git": analysis.git,
    });

    format!(
        "Write up to {max_bullets} résumé bullet points for the software project \
         described below. Each bullet must start with a strong action verb, \
         stay under {BULLET_CHAR_LIMIT} characters, and state concrete, verifiable \
         facts from the data. Respond with a JSON array of strings and nothing else.\n\n\
         Project data:\n{pruned}"
    )
}

/// Enforce the output invariants on AI bullets: cap the count, cap the
/// length, drop placeholder text and non-sentences.
fn sanitize_bullets(raw: Vec<String>, max_bullets: usize) -> Vec<String> {
    raw.into_iter()
        .map(|bullet| bullet.trim().to_string())
        .filter(|bullet| !bullet.is_empty())
        .filter(|bullet| !bullet.contains("TODO") && !bullet.contains("FIXME"))
        .filter(|bullet| {
            bullet
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
        })
        .map(|bullet| {
            if bullet.chars().count() > BULLET_CHAR_LIMIT {
                let cut: String = bullet.chars().take(BULLET_CHAR_LIMIT - 1).collect();
                format!("{}.", cut.trim_end())
            } else {
                bullet
            }
        })
        .take(max_bullets)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::CodeMetrics;
    use crate::generate::llm::ScriptedCompletionClient;

    fn analysis() -> ProjectAnalysis {
        let mut analysis = ProjectAnalysis::new("work/svc");
        analysis.language = Some("Java".to_string());
        analysis.code_metrics = CodeMetrics {
            file_count: 20,
            loc: 3000,
            function_count: 80,
            class_count: 15,
            test_count: 25,
        };
        analysis.tools = vec!["Maven".to_string()];
        analysis
    }

    #[tokio::test]
    async fn test_ai_path_returns_ai_source() {
        let client = ScriptedCompletionClient::new(vec![Ok(
            r#"["Engineered a Java service with 15 classes.", "Safeguarded quality with 25 tests."]"#
                .to_string(),
        )]);

        let (bullets, source) =
            generate(&analysis(), 5, true, Some(&client), Duration::from_secs(5)).await;

        assert_eq!(source, crate::core::model::BulletSource::Ai);
        assert_eq!(bullets.len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_local() {
        let client = ScriptedCompletionClient::always_timeout();

        let (bullets, source) =
            generate(&analysis(), 5, true, Some(&client), Duration::from_secs(1)).await;

        assert_eq!(source, crate::core::model::BulletSource::Local);
        assert!(!bullets.is_empty());

        // Local fallback must be deterministic across reruns.
        let (again, _) =
            generate(&analysis(), 5, true, Some(&client), Duration::from_secs(1)).await;
        assert_eq!(bullets, again);
    }

    #[tokio::test]
    async fn test_malformed_ai_json_falls_back() {
        let client = ScriptedCompletionClient::new(vec![Ok("no array here".to_string())]);

        let (_, source) =
            generate(&analysis(), 5, true, Some(&client), Duration::from_secs(1)).await;
        assert_eq!(source, crate::core::model::BulletSource::Local);
    }

    #[tokio::test]
    async fn test_empty_ai_array_falls_back() {
        let client = ScriptedCompletionClient::new(vec![Ok("[]".to_string())]);

        let (_, source) =
            generate(&analysis(), 5, true, Some(&client), Duration::from_secs(1)).await;
        assert_eq!(source, crate::core::model::BulletSource::Local);
    }

    #[tokio::test]
    async fn test_use_ai_false_never_touches_model() {
        let client = ScriptedCompletionClient::new(vec![Ok("[\"x\"]".to_string())]);

        let (_, source) =
            generate(&analysis(), 5, false, Some(&client), Duration::from_secs(1)).await;

        assert_eq!(source, crate::core::model::BulletSource::Local);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_bullet_cap_enforced_on_ai_output() {
        let many: Vec<String> = (0..10).map(|i| format!("Built feature {i}.")).collect();
        let payload = serde_json::to_string(&many).unwrap();
        let client = ScriptedCompletionClient::new(vec![Ok(payload)]);

        let (bullets, source) =
            generate(&analysis(), 3, true, Some(&client), Duration::from_secs(1)).await;
        assert_eq!(source, crate::core::model::BulletSource::Ai);
        assert_eq!(bullets.len(), 3);
    }

    #[test]
    fn test_sanitize_drops_placeholders_and_weak_starts() {
        let raw = vec![
            "Built the API.".to_string(),
            "TODO: finish this".to_string(),
            "lowercase start".to_string(),
            "".to_string(),
        ];
        let clean = sanitize_bullets(raw, 10);
        assert_eq!(clean, vec!["Built the API.".to_string()]);
    }
}
