//! Error taxonomy for the HTTP surface.
//!
//! Every failed generation maps to exactly one [`ErrorKind`], which fixes the HTTP status
//! and the machine-readable code returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::openai::{CompletionError, UpstreamErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingUrl,
    InvalidUrlFormat,
    InvalidUrl,
    MissingCredential,
    InvalidApiKey,
    QuotaExceeded,
    RateLimited,
    ModelNotFound,
    ContentTooLong,
    UpstreamOther,
    Timeout,
    ConnectionError,
    InternalError,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::MissingUrl | Self::InvalidUrlFormat | Self::InvalidUrl => StatusCode::BAD_REQUEST,
            Self::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ModelNotFound => StatusCode::NOT_FOUND,
            Self::ContentTooLong => StatusCode::BAD_REQUEST,
            Self::UpstreamOther => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::ConnectionError => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::MissingUrl => "MISSING_URL",
            Self::InvalidUrlFormat => "INVALID_URL_FORMAT",
            Self::InvalidUrl => "INVALID_URL",
            Self::MissingCredential => "MISSING_API_KEY",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::RateLimited => "RATE_LIMIT",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::ContentTooLong => "CONTENT_TOO_LONG",
            Self::UpstreamOther => "OPENAI_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::MissingUrl => "url is required",
            Self::InvalidUrlFormat => "url must be a non-empty string",
            Self::InvalidUrl => "invalid url: it must be an absolute http:// or https:// URL",
            Self::MissingCredential => "server configuration is incomplete",
            Self::InvalidApiKey => "the OpenAI API key is invalid",
            Self::QuotaExceeded => "the OpenAI quota has been exceeded",
            Self::RateLimited => "the OpenAI rate limit has been exceeded",
            Self::ModelNotFound => "the configured OpenAI model is not available",
            Self::ContentTooLong => "the content is too long for the model",
            Self::UpstreamOther => "unknown OpenAI error",
            Self::Timeout => "timeout: the request took too long to process",
            Self::ConnectionError => "could not connect to the OpenAI API",
            Self::InternalError => "internal server error",
        }
    }
}

impl From<&UpstreamErrorCode> for ErrorKind {
    fn from(code: &UpstreamErrorCode) -> Self {
        match code {
            UpstreamErrorCode::InvalidApiKey => Self::InvalidApiKey,
            UpstreamErrorCode::InsufficientQuota => Self::QuotaExceeded,
            UpstreamErrorCode::RateLimitExceeded => Self::RateLimited,
            UpstreamErrorCode::ModelNotFound => Self::ModelNotFound,
            UpstreamErrorCode::ContextLengthExceeded => Self::ContentTooLong,
            UpstreamErrorCode::Other(_) => Self::UpstreamOther,
        }
    }
}

/// A classified failure: one per failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_owned(),
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_response_with_elapsed(self, processing_time_ms: u64) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.kind.code(),
            processing_time_ms,
        };
        (self.kind.status(), Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Api { code, message, .. } => {
                let kind = ErrorKind::from(&code);
                match kind {
                    ErrorKind::UpstreamOther => Self::with_message(kind, message),
                    _ => Self::new(kind),
                }
            }
            CompletionError::Timeout(_) => Self::new(ErrorKind::Timeout),
            CompletionError::Connect(_) => Self::new(ErrorKind::ConnectionError),
            CompletionError::EmptyCompletion => Self::with_message(
                ErrorKind::UpstreamOther,
                "OpenAI did not generate any content",
            ),
            CompletionError::InvalidResponse(_) => Self::with_message(
                ErrorKind::UpstreamOther,
                "invalid response from the OpenAI API",
            ),
            CompletionError::Transport(_) => Self::new(ErrorKind::InternalError),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize)]
struct UnhandledErrorBody {
    error: &'static str,
    code: &'static str,
    timestamp: String,
}

/// Response for failures that escaped classification (panics, unreadable bodies).
pub fn unhandled_response() -> Response {
    let body = UnhandledErrorBody {
        error: "internal server error",
        code: "UNHANDLED_ERROR",
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
