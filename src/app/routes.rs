use std::collections::BTreeMap;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::Value;

use crate::app::model::{
    ConfigResponse, GenerationResponse, HealthResponse, MemoryUsage, NotFoundResponse,
    ServiceDescriptor,
};
use crate::app::state::AppState;
use crate::error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "POST /api/generate-llm",
    "GET /api/health",
    "GET /api/config",
    "GET /",
];

pub async fn generate_llm(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started_at = Instant::now();

    let body = match read_json_body(&headers, &body) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!(error = %err, "unreadable request body");
            return error::unhandled_response();
        }
    };

    let outcome = state.generator.generate(&body).await;
    let processing_time_ms = started_at.elapsed().as_millis() as u64;

    match outcome {
        Ok(generation) => {
            tracing::info!(
                url = %generation.url,
                tokens_used = generation.tokens_used,
                elapsed_ms = processing_time_ms,
                "llm.txt generated"
            );
            Json(GenerationResponse {
                success: true,
                content: generation.content,
                url: generation.url,
                generated_at: Utc::now(),
                processing_time_ms,
                tokens_used: generation.tokens_used,
                model_used: generation.model_used,
            })
            .into_response()
        }
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(code = err.code(), elapsed_ms = processing_time_ms, "{}", err.message());
            } else {
                tracing::warn!(code = err.code(), elapsed_ms = processing_time_ms, "{}", err.message());
            }
            err.into_response_with_elapsed(processing_time_ms)
        }
    }
}

/// Decodes a generation request body.
///
/// A body that is empty or not declared as JSON carries no fields and decodes to `null`.
fn read_json_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, serde_json::Error> {
    if !is_json_content_type(headers) || body.trim_ascii().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        memory: memory_usage(),
        version: VERSION,
    })
}

fn memory_usage() -> MemoryUsage {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return MemoryUsage::default();
    };
    let mut system = sysinfo::System::new();
    system.refresh_process(pid);
    system
        .process(pid)
        .map(|process| MemoryUsage {
            used: format!("{} MB", process.memory() / 1024 / 1024),
            total: format!("{} MB", process.virtual_memory() / 1024 / 1024),
        })
        .unwrap_or_default()
}

pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let completion = &state.config.openai.completion;
    Json(ConfigResponse {
        openai_configured: state.generator.is_configured(),
        model: completion.model.clone(),
        max_tokens: completion.max_tokens,
        temperature: completion.temperature,
        rate_limit: state.config.rate_limit.describe(),
        environment: state.config.environment.clone(),
    })
}

pub async fn service_descriptor() -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        message: "LLM.txt generator API is running",
        version: VERSION,
        endpoints: BTreeMap::from([
            ("generate", "POST /api/generate-llm"),
            ("health", "GET /api/health"),
            ("config", "GET /api/config"),
        ]),
    })
}

pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "endpoint not found",
            path: uri.path().to_owned(),
            method: method.to_string(),
            available_endpoints: AVAILABLE_ENDPOINTS,
        }),
    )
}
