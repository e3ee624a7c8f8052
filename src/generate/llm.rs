//! External LLM capability.
//!
//! The pipeline only ever sees [`CompletionModel`]: a prompt, a schema
//! hint, a deadline, and a string back. The bundled HTTP client speaks an
//! OpenAI-compatible chat-completions endpoint; tests use the scripted
//! client. Vendor protocols never leak past this module.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::config::LlmConfig;
use crate::core::errors::{CodefolioError, Result};

/// Prompt/completion capability consumed by the pipeline.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Request a completion. Implementations must respect `deadline` and
    /// surface overruns as `Timeout`.
    async fn complete(&self, prompt: &str, schema_hint: &str, deadline: Duration)
        -> Result<String>;

    /// Model identifier, checked against the consent allowlist.
    fn model_id(&self) -> &str;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpCompletionClient {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    /// Build a client from configuration, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CodefolioError::config_field(
                format!("environment variable {} not set", config.api_key_env),
                "llm.api_key_env",
            )
        })?;

        Ok(Self {
            config: config.clone(),
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl CompletionModel for HttpCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        schema_hint: &str,
        deadline: Duration,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You respond with strict JSON matching this shape and nothing else: {schema_hint}"
                    ),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            // Low temperature: local mode must be deterministic and ai
            // mode should stay close to it.
            temperature: 0.1,
        };

        debug!(model = %self.config.model, "sending completion request");

        let send = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send();

        let response = tokio::time::timeout(deadline, send)
            .await
            .map_err(|_| CodefolioError::timeout("llm completion", deadline.as_secs()))?
            .map_err(|e| CodefolioError::malformed_llm(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "completion endpoint returned an error");
            return Err(CodefolioError::malformed_llm(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = tokio::time::timeout(deadline, response.json())
            .await
            .map_err(|_| CodefolioError::timeout("llm response body", deadline.as_secs()))?
            .map_err(|e| CodefolioError::malformed_llm(format!("unparseable body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CodefolioError::malformed_llm("response carried no choices"))
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

/// Extract the first balanced top-level JSON array from a completion that
/// may carry surrounding prose.
pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_balanced(text, '[', ']')
}

/// Extract the first balanced top-level JSON object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_balanced(text, '{', '}')
}

fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Deterministic completion double for tests: returns queued responses in
/// order, then errors.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<String>>>,
    calls: parking_lot::Mutex<usize>,
    model: String,
}

impl ScriptedCompletionClient {
    /// Create a double that plays back `responses` in order.
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
            calls: parking_lot::Mutex::new(0),
            model: "scripted-model".to_string(),
        }
    }

    /// A double whose every call times out.
    pub fn always_timeout() -> Self {
        Self::new(Vec::new())
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletionClient {
    async fn complete(
        &self,
        _prompt: &str,
        _schema_hint: &str,
        deadline: Duration,
    ) -> Result<String> {
        *self.calls.lock() += 1;
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CodefolioError::timeout("llm completion", deadline.as_secs())))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_array_from_prose() {
        let text = "Sure! Here are your bullets:\n[\"a\", \"b [nested]\", \"c\"]\nHope that helps.";
        let extracted = extract_json_array(text).unwrap();
        let parsed: Vec<String> = serde_json::from_str(extracted).unwrap();
        assert_eq!(parsed, vec!["a", "b [nested]", "c"]);
    }

    #[test]
    fn test_extract_array_handles_nested_brackets() {
        let text = "[[1, 2], [3]] trailing";
        assert_eq!(extract_json_array(text).unwrap(), "[[1, 2], [3]]");
    }

    #[test]
    fn test_extract_array_ignores_brackets_in_strings() {
        let text = r#"["open [ bracket", "close ] bracket"]"#;
        let extracted = extract_json_array(text).unwrap();
        let parsed: Vec<String> = serde_json::from_str(extracted).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_extract_object() {
        let text = "prefix {\"tools\": [\"Docker\"]} suffix";
        assert_eq!(
            extract_json_object(text).unwrap(),
            "{\"tools\": [\"Docker\"]}"
        );
    }

    #[test]
    fn test_extract_missing_returns_none() {
        assert_eq!(extract_json_array("no json here"), None);
        assert_eq!(extract_json_array("[unterminated"), None);
    }

    #[tokio::test]
    async fn test_scripted_client_plays_back_then_times_out() {
        let client = ScriptedCompletionClient::new(vec![Ok("[\"x\"]".to_string())]);
        let first = client
            .complete("p", "s", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(first, "[\"x\"]");

        let second = client.complete("p", "s", Duration::from_secs(1)).await;
        assert!(matches!(second, Err(CodefolioError::Timeout { .. })));
        assert_eq!(client.call_count(), 2);
    }
}
