//! The generation pipeline: validate, extract, prompt, complete.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::error::{ApiError, ErrorKind};
use crate::metadata::MetadataSource;
use crate::openai::CompletionBackend;
use crate::prompt;
use crate::validate::TargetUrl;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub content: String,
    pub url: String,
    pub tokens_used: u64,
    pub model_used: String,
}

#[derive(Clone)]
pub struct Generator {
    metadata: Arc<dyn MetadataSource>,
    completion: Option<Arc<dyn CompletionBackend>>,
}

impl Generator {
    /// `completion` is `None` when no credential is configured; every request then fails
    /// with [`ErrorKind::MissingCredential`] after input validation.
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        completion: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        Self {
            metadata,
            completion,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.completion.is_some()
    }

    pub async fn generate(&self, body: &Value) -> Result<Generation, ApiError> {
        let target = target_from_body(body)?;

        let Some(completion) = self.completion.as_ref() else {
            tracing::error!("OPENAI_API_KEY is not set");
            return Err(ApiError::new(ErrorKind::MissingCredential));
        };

        tracing::info!(url = %target, "generating llm.txt");

        let metadata = self.metadata.extract(target.url()).await;
        tracing::debug!(url = %target, ?metadata, "page metadata");

        let prompt = prompt::build_prompt(&target, &metadata, Utc::now().date_naive());
        let result = completion.complete(&prompt).await.map_err(|err| {
            tracing::warn!(url = %target, error = %format!("{err:#}"), "completion failed");
            ApiError::from(err)
        })?;

        Ok(Generation {
            content: result.content,
            url: target.as_str().to_owned(),
            tokens_used: result.tokens_used,
            model_used: completion.model().to_owned(),
        })
    }
}

/// Pulls the target URL out of a request body.
///
/// An absent or `null` field is [`ErrorKind::MissingUrl`]; anything that is not a string
/// with visible characters is [`ErrorKind::InvalidUrlFormat`].
pub fn target_from_body(body: &Value) -> Result<TargetUrl, ApiError> {
    let raw = match body.get("url") {
        None | Some(Value::Null) => return Err(ApiError::new(ErrorKind::MissingUrl)),
        Some(Value::String(raw)) if !raw.trim().is_empty() => raw,
        Some(_) => return Err(ApiError::new(ErrorKind::InvalidUrlFormat)),
    };

    TargetUrl::parse(raw).ok_or_else(|| ApiError::new(ErrorKind::InvalidUrl))
}
