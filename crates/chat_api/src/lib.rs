//! Transport adapter for the tutor chat-completion endpoint.
//!
//! This crate owns request building, the client-side request budget, and the
//! decoding of streamed replies into ordered text fragments. It contains no
//! conversation state; retries and history live with the caller.
//!
//! Streamed bodies are newline-delimited event lines; malformed lines are
//! logged and skipped so one bad frame never aborts a reply.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod message;
pub mod payload;
pub mod rate_limit;
pub mod retry;
pub mod sse;
pub mod transport;
pub mod url;

pub use cancel::CancellationSignal;
pub use client::ChatApiClient;
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{Completion, StreamEvent};
pub use message::{ChatMessage, Role};
pub use payload::ChatRequest;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::RetryPolicy;
pub use sse::SseLineParser;
pub use transport::ChatTransport;
pub use url::normalize_chat_url;
