//! Process-wide configuration, read once at startup.

use std::time::Duration;

use axum::http::HeaderValue;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 3000;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_PENALTY: f64 = 0.1;
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 10;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ENVIRONMENT: &str = "development";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENAI_BASE_URL is not a valid http(s) URL: {value}")]
    InvalidBaseUrl { value: String },
    #[error("ALLOWED_ORIGINS contains an invalid origin: {0:?}")]
    InvalidOrigin(String),
}

/// Generation parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub request_timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            presence_penalty: DEFAULT_PENALTY,
            frequency_penalty: DEFAULT_PENALTY,
            request_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub completion: CompletionConfig,
}

impl OpenAiConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// Keep the credential out of `{:?}` output (startup logs print the config).
impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("completion", &self.completion)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn describe(&self) -> String {
        format!(
            "{} requests per {} minutes",
            self.max_requests,
            self.window.as_secs() / 60
        )
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RATE_LIMIT_WINDOW,
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub openai: OpenAiConfig,
    pub scrape_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    /// Empty means any origin is allowed.
    pub allowed_origins: Vec<String>,
    pub port: u16,
    pub environment: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Unparseable or out-of-range numbers fall back to their defaults with a warning;
    /// only values that would break request handling are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let base_url = get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_owned());
        match url::Url::parse(&base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidBaseUrl { value: base_url }),
        }

        let completion = CompletionConfig {
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            max_tokens: parse_or(&get, "MAX_TOKENS", DEFAULT_MAX_TOKENS, |v: &u32| *v > 0),
            temperature: parse_or(&get, "TEMPERATURE", DEFAULT_TEMPERATURE, |v: &f64| {
                v.is_finite() && *v >= 0.0
            }),
            presence_penalty: parse_or(&get, "PRESENCE_PENALTY", DEFAULT_PENALTY, |v: &f64| {
                v.is_finite()
            }),
            frequency_penalty: parse_or(&get, "FREQUENCY_PENALTY", DEFAULT_PENALTY, |v: &f64| {
                v.is_finite()
            }),
            request_timeout: Duration::from_millis(parse_or(
                &get,
                "OPENAI_TIMEOUT_MS",
                DEFAULT_COMPLETION_TIMEOUT.as_millis() as u64,
                |v: &u64| *v > 0,
            )),
        };

        let rate_limit = RateLimitConfig {
            window: Duration::from_millis(parse_or(
                &get,
                "RATE_LIMIT_WINDOW_MS",
                DEFAULT_RATE_LIMIT_WINDOW.as_millis() as u64,
                |v: &u64| *v > 0,
            )),
            max_requests: parse_or(
                &get,
                "RATE_LIMIT_MAX_REQUESTS",
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
                |v: &u32| *v > 0,
            ),
        };

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if let Some(bad) = allowed_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            return Err(ConfigError::InvalidOrigin(bad.clone()));
        }

        Ok(Self {
            openai: OpenAiConfig {
                api_key: get("OPENAI_API_KEY"),
                base_url,
                completion,
            },
            scrape_timeout: Duration::from_millis(parse_or(
                &get,
                "SCRAPE_TIMEOUT_MS",
                crate::metadata::DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
                |v: &u64| *v > 0,
            )),
            rate_limit,
            allowed_origins,
            port: parse_or(&get, "PORT", DEFAULT_PORT, |_| true),
            environment: get("APP_ENV").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_owned()),
        })
    }
}

fn parse_or<T, G, P>(get: &G, key: &str, default: T, valid: P) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
    P: Fn(&T) -> bool,
{
    let Some(raw) = get(key) else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, default = %default, "ignoring invalid config value");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.openai.api_key, None);
        assert!(!config.openai.is_configured());
        assert_eq!(config.openai.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.openai.completion, CompletionConfig::default());
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.scrape_timeout, Duration::from_secs(15));
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.port, 3000);
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("OPENAI_API_KEY", " sk-test "),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("MAX_TOKENS", "1200"),
            ("TEMPERATURE", "0"),
            ("RATE_LIMIT_WINDOW_MS", "60000"),
            ("RATE_LIMIT_MAX_REQUESTS", "5"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("PORT", "8080"),
            ("APP_ENV", "production"),
        ])
        .expect("config");

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.openai.completion.model, "gpt-4o-mini");
        assert_eq!(config.openai.completion.max_tokens, 1200);
        assert_eq!(config.openai.completion.temperature, 0.0);
        assert_eq!(config.rate_limit.describe(), "5 requests per 1 minutes");
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, "production");
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("MAX_TOKENS", "0"),
            ("TEMPERATURE", "-1"),
            ("RATE_LIMIT_MAX_REQUESTS", "lots"),
            ("PORT", "99999"),
        ])
        .expect("config");

        assert_eq!(config.openai.completion.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.openai.completion.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.rate_limit.max_requests, DEFAULT_RATE_LIMIT_MAX_REQUESTS);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let config = config_from(&[("OPENAI_API_KEY", "   ")]).expect("config");
        assert!(!config.openai.is_configured());
    }

    #[test]
    fn rejects_unusable_base_url() {
        let err = config_from(&[("OPENAI_BASE_URL", "ftp://api.example")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn debug_output_redacts_credential() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-secret-value")]).expect("config");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("<redacted>"));
    }
}
