use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CompletionConfig, OpenAiConfig};
use crate::prompt::SYSTEM_INSTRUCTIONS;

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub content: String,
    pub tokens_used: u64,
}

/// Error codes the completion API reports in `error.code` (or `error.type`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamErrorCode {
    InvalidApiKey,
    InsufficientQuota,
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    Other(Option<String>),
}

impl UpstreamErrorCode {
    pub fn parse(code: Option<&str>, kind: Option<&str>) -> Self {
        let known = |value: &str| match value {
            "invalid_api_key" => Some(Self::InvalidApiKey),
            "insufficient_quota" => Some(Self::InsufficientQuota),
            "rate_limit_exceeded" => Some(Self::RateLimitExceeded),
            "model_not_found" => Some(Self::ModelNotFound),
            "context_length_exceeded" => Some(Self::ContextLengthExceeded),
            _ => None,
        };
        code.and_then(known)
            .or_else(|| kind.and_then(known))
            .unwrap_or_else(|| Self::Other(code.or(kind).map(str::to_owned)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("OpenAI API error ({status}): {message}")]
    Api {
        status: u16,
        code: UpstreamErrorCode,
        message: String,
    },
    #[error("completion request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("connect to completion API")]
    Connect(#[source] reqwest::Error),
    #[error("OpenAI output text is empty")]
    EmptyCompletion,
    #[error("parse OpenAI response")]
    InvalidResponse(#[source] serde_json::Error),
    #[error("completion request failed")]
    Transport(#[source] reqwest::Error),
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<CompletionResult, CompletionError>;
}

#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    config: CompletionConfig,
}

impl ChatCompletionsClient {
    /// Returns `None` when no credential is configured.
    pub fn from_config(config: &OpenAiConfig) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(config.completion.request_timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("build completion http client: {err}"))?;

        Ok(Some(Self {
            client,
            endpoint: chat_completions_endpoint(&config.base_url),
            api_key,
            config: config.completion.clone(),
        }))
    }

    fn classify_transport(&self, err: reqwest::Error) -> CompletionError {
        if err.is_timeout() {
            CompletionError::Timeout(self.config.request_timeout)
        } else if err.is_connect() {
            CompletionError::Connect(err)
        } else {
            CompletionError::Transport(err)
        }
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<CompletionResult, CompletionError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_INSTRUCTIONS },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "presence_penalty": self.config.presence_penalty,
            "frequency_penalty": self.config.frequency_penalty,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.classify_transport(err))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| self.classify_transport(err))?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &raw));
        }

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(CompletionError::InvalidResponse)?;
        extract_completion(&value)
    }
}

fn api_error(status: u16, raw_json: &str) -> CompletionError {
    let error = serde_json::from_str::<serde_json::Value>(raw_json)
        .ok()
        .and_then(|value| value.get("error").cloned());

    let Some(error) = error else {
        let mut message = raw_json.trim().to_owned();
        if message.is_empty() {
            message = format!("HTTP {status}");
        }
        return CompletionError::Api {
            status,
            code: UpstreamErrorCode::Other(None),
            message,
        };
    };

    let code = UpstreamErrorCode::parse(
        error.get("code").and_then(|v| v.as_str()),
        error.get("type").and_then(|v| v.as_str()),
    );
    let message = error
        .get("message")
        .and_then(|v| v.as_str())
        .filter(|m| !m.trim().is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {status}"));

    CompletionError::Api {
        status,
        code,
        message,
    }
}

fn extract_completion(value: &serde_json::Value) -> Result<CompletionResult, CompletionError> {
    let content = value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(CompletionError::EmptyCompletion);
    }

    let tokens_used = value
        .pointer("/usage/total_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    Ok(CompletionResult {
        content: content.to_owned(),
        tokens_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(
            chat_completions_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn extracts_first_choice_and_usage() {
        let value = serde_json::json!({
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "# LLM.txt" } },
                { "index": 1, "message": { "role": "assistant", "content": "ignored" } }
            ],
            "usage": { "prompt_tokens": 10, "completion_tokens": 32, "total_tokens": 42 }
        });
        let result = extract_completion(&value).expect("completion");
        assert_eq!(result.content, "# LLM.txt");
        assert_eq!(result.tokens_used, 42);
    }

    #[test]
    fn missing_usage_counts_as_zero() {
        let value = serde_json::json!({
            "choices": [{ "message": { "content": "text" } }]
        });
        assert_eq!(extract_completion(&value).expect("completion").tokens_used, 0);
    }

    #[test]
    fn empty_or_missing_text_is_an_error() {
        for value in [
            serde_json::json!({}),
            serde_json::json!({ "choices": [] }),
            serde_json::json!({ "choices": [{ "message": {} }] }),
            serde_json::json!({ "choices": [{ "message": { "content": null } }] }),
            serde_json::json!({ "choices": [{ "message": { "content": "  \n " } }] }),
        ] {
            assert!(matches!(
                extract_completion(&value),
                Err(CompletionError::EmptyCompletion)
            ));
        }
    }

    #[test]
    fn parses_known_upstream_codes() {
        assert_eq!(
            UpstreamErrorCode::parse(Some("invalid_api_key"), Some("invalid_request_error")),
            UpstreamErrorCode::InvalidApiKey
        );
        assert_eq!(
            UpstreamErrorCode::parse(None, Some("insufficient_quota")),
            UpstreamErrorCode::InsufficientQuota
        );
        assert_eq!(
            UpstreamErrorCode::parse(Some("something_new"), None),
            UpstreamErrorCode::Other(Some("something_new".to_owned()))
        );
    }

    #[test]
    fn api_error_reads_error_object() {
        let raw = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        match api_error(401, raw) {
            CompletionError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 401);
                assert_eq!(code, UpstreamErrorCode::InvalidApiKey);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_without_json_body_is_other() {
        match api_error(502, "<html>bad gateway</html>") {
            CompletionError::Api { code, message, .. } => {
                assert_eq!(code, UpstreamErrorCode::Other(None));
                assert_eq!(message, "<html>bad gateway</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
