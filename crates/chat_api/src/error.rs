use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("please wait {wait_secs} seconds before sending the next message")]
    RateLimited { wait_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {message}")]
    Status { status: StatusCode, message: String },

    #[error("malformed response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,

    #[error("conversation must contain at least one message")]
    EmptyConversation,

    #[error("API key is required")]
    MissingApiKey,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl ChatApiError {
    /// True when the endpoint could not be reached or the body could not be read.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// True when the endpoint answered with a non-success status.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

impl From<reqwest::Error> for ChatApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::Client(error)
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorField>,
}

/// The gateway reports `{"error": "text"}`; upstream OpenAI-style bodies nest a message object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Detail { message: Option<String> },
}

impl ErrorField {
    fn message(&self) -> Option<&str> {
        let message = match self {
            Self::Text(message) => Some(message.as_str()),
            Self::Detail { message } => message.as_deref(),
        };
        message.map(str::trim).filter(|value| !value.is_empty())
    }
}

/// Extract the endpoint's error message, falling back to a status-derived one.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message().map(ToOwned::to_owned))
        .unwrap_or_else(|| status_message(status))
}

fn status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}
