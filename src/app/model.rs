use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub content: String,
    pub url: String,
    pub generated_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub tokens_used: u64,
    pub model_used: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub memory: MemoryUsage,
    pub version: &'static str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryUsage {
    pub used: String,
    pub total: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub openai_configured: bool,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub rate_limit: String,
    pub environment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescriptor {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotFoundResponse {
    pub error: &'static str,
    pub path: String,
    pub method: String,
    pub available_endpoints: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct TooManyRequestsResponse {
    pub error: &'static str,
    pub code: &'static str,
    pub retry_after_seconds: u64,
}
