use std::time::Duration;

/// Failure talking to the backend or storefront.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => Self::NotFound(body),
            500..=599 => Self::ServerError { status, body },
            _ => Self::Rejected { status, body },
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::NotFound(_) => "not_found",
            Self::Rejected { .. } => "rejected",
            Self::ServerError { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::Decode(_) => "decode_error",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
