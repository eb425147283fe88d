//! Error taxonomy. `ProxyError` is the kind the Lifecycle Engine
//! reasons about internally; `to_claude_error` is the mapping used whenever
//! a Claude-facing client needs to see a usable message instead of raw
//! upstream text.

use http::StatusCode;

#[derive(Debug, Clone)]
pub struct ParsedUpstreamError {
    pub status: u16,
    pub message: String,
    pub raw: Option<String>,
}

impl ParsedUpstreamError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            raw: None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("no keys available")]
    NoKeysAvailable,
    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),
    #[error("upstream status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },
    #[error("upstream not found")]
    UpstreamNotFound,
    #[error("upstream body too large")]
    BodyTooLarge,
    #[error("client aborted")]
    ClientAborted,
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Whether this error kind should be retried by the Lifecycle Engine.
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamTransport(_) | ProxyError::UpstreamStatus { .. }
        )
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) | ProxyError::ConversionFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::NoKeysAvailable => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::UpstreamNotFound => StatusCode::NOT_FOUND,
            ProxyError::BodyTooLarge => StatusCode::BAD_GATEWAY,
            ProxyError::ClientAborted => StatusCode::from_u16(499).unwrap(),
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Claude error-type string for this kind.
    pub fn claude_error_type(&self) -> &'static str {
        match self {
            ProxyError::BadRequest(_) | ProxyError::ConversionFailed(_) => "invalid_request_error",
            ProxyError::NoKeysAvailable => "api_error",
            ProxyError::UpstreamTransport(_) => "api_error",
            ProxyError::UpstreamStatus { status, .. } => match *status {
                401 => "authentication_error",
                429 => "rate_limit_error",
                503 => "overloaded_error",
                _ => "api_error",
            },
            ProxyError::UpstreamNotFound => "not_found_error",
            ProxyError::BodyTooLarge => "overloaded_error",
            ProxyError::ClientAborted => "api_error",
            ProxyError::Internal(_) => "api_error",
        }
    }

    pub fn client_message(&self) -> String {
        match self {
            ProxyError::UpstreamStatus { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
