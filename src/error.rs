use chat_api::ChatApiError;
use thiserror::Error;

/// Displayable category of a failed send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Cancelled,
    RateLimited,
    Upstream,
    Network,
    Unknown,
}

/// Classified failure surfaced by [`crate::ChatSession`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Request was cancelled.")]
    Cancelled,

    #[error("Please wait {wait_secs} seconds before sending another message.")]
    RateLimited { wait_secs: u64 },

    #[error("The chat service returned an error: {message}")]
    Upstream { message: String },

    #[error("Network error. Please check your internet connection.")]
    Network { detail: String },

    #[error("{0}")]
    Unknown(String),
}

impl ChatError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Unknown(_) => ErrorCategory::Unknown,
        }
    }
}

impl From<ChatApiError> for ChatError {
    fn from(error: ChatApiError) -> Self {
        match error {
            ChatApiError::Cancelled => Self::Cancelled,
            ChatApiError::RateLimited { wait_secs } => Self::RateLimited { wait_secs },
            ChatApiError::Status { message, .. } => Self::Upstream { message },
            ChatApiError::Network(detail) => Self::Network { detail },
            other => Self::Unknown(other.to_string()),
        }
    }
}
