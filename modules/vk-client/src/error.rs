use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VkError>;

/// Closed classification of a failed call, derived once from the raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The service asked us to slow down.
    RateLimited,
    /// Server-side or session hiccup that is expected to clear on its own.
    Transient,
    /// Permission, malformed request, not-found, or anything unrecognised.
    Fatal,
}

impl ErrorKind {
    pub fn is_retriable(self) -> bool {
        !matches!(self, ErrorKind::Fatal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum VkError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// The request could not be built or followed (bad URL, redirect loop).
    #[error("Request error: {0}")]
    Request(String),
}

/// Too many requests per second.
const CODE_TOO_MANY_REQUESTS: i64 = 6;
/// Flood control.
const CODE_FLOOD_CONTROL: i64 = 9;
/// Daily method quota reached.
const CODE_RATE_LIMIT: i64 = 29;
/// Unknown error; VK returns it for internal hiccups.
const CODE_UNKNOWN: i64 = 1;
/// Internal server error.
const CODE_INTERNAL: i64 = 10;
/// User authorization failed.
const CODE_AUTH_FAILED: i64 = 5;

impl VkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VkError::Network(_) => ErrorKind::Transient,
            VkError::Http { status, .. } => match *status {
                429 => ErrorKind::RateLimited,
                500..=599 => ErrorKind::Transient,
                _ => ErrorKind::Fatal,
            },
            VkError::Api { code, message } => match *code {
                CODE_TOO_MANY_REQUESTS | CODE_FLOOD_CONTROL | CODE_RATE_LIMIT => {
                    ErrorKind::RateLimited
                }
                CODE_UNKNOWN | CODE_INTERNAL => ErrorKind::Transient,
                // An expired or invalidated session clears after a retry; a
                // revoked or wrong token does not.
                CODE_AUTH_FAILED if message.to_lowercase().contains("session") => {
                    ErrorKind::Transient
                }
                _ => ErrorKind::Fatal,
            },
            VkError::Parse(_) | VkError::Request(_) => ErrorKind::Fatal,
        }
    }
}

impl From<reqwest::Error> for VkError {
    fn from(err: reqwest::Error) -> Self {
        // The URL carries request parameters; keep it out of logs.
        let err = err.without_url();
        if err.is_decode() {
            VkError::Parse(err.to_string())
        } else if err.is_builder() || err.is_redirect() {
            VkError::Request(err.to_string())
        } else if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            VkError::Network(err.to_string())
        } else {
            VkError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VkError {
    fn from(err: serde_json::Error) -> Self {
        VkError::Parse(err.to_string())
    }
}
