use thiserror::Error;

use crate::fields::ContractError;

/// Failure of one logical fetch.
///
/// Cancellation is an expected outcome of superseding a request and is kept
/// apart from real failures; check [`FetchError::is_cancelled`] before
/// surfacing an error to a consumer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request was cancelled")]
    Cancelled,
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with status {status}: {body}")]
    Server { status: u16, body: String },
    #[error("cannot decode response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("contract violation: {0}")]
    Contract(#[from] ContractError),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Whether offering the user a retry makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::Server { status, .. } => *status >= 500 || *status == 429,
            FetchError::Cancelled
            | FetchError::Decode(_)
            | FetchError::InvalidRequest(_)
            | FetchError::Contract(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for FetchError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            reqwest_middleware::Error::Middleware(err) => FetchError::Network(format!("{err:#}")),
        }
    }
}
