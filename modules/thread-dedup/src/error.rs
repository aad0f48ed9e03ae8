use thiserror::Error;
use vk_client::ErrorKind;

/// Failure of a remote call after the retry wrapper has given up.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("{label}: {kind} error after {attempts} attempt(s): {message}")]
    Fatal {
        label: String,
        kind: ErrorKind,
        message: String,
        attempts: u32,
    },

    #[error("{label}: retries exhausted after {attempts} attempt(s), last {kind} error: {message}")]
    Exhausted {
        label: String,
        kind: ErrorKind,
        message: String,
        attempts: u32,
    },
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Fatal { kind, .. } | CallError::Exhausted { kind, .. } => *kind,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            CallError::Fatal { attempts, .. } | CallError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CallError::Fatal { message, .. } | CallError::Exhausted { message, .. } => message,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, CallError::Exhausted { .. })
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Thread size query failed: {0}")]
    SizeQuery(#[source] CallError),

    #[error("Page fetch failed: {0}")]
    PageFetch(#[source] CallError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Failed to build API client: {0}")]
    Client(#[from] vk_client::VkError),
}
