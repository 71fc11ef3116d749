//! Study-assistant chat controller.
//!
//! [`ChatSession`] keeps one conversation log seeded with a hidden system
//! entry, sends user turns through a [`ChatTransport`], and reassembles
//! streamed fragments into a single growing assistant entry. Transient
//! failures are retried with exponential backoff; a failed cycle rolls the
//! log back to its pre-send state and reports a classified [`ChatError`].
//!
//! Every log change is written to a [`SnapshotStore`] so a restarted session
//! resumes the same conversation.
//!
//! # Public API Overview
//! - Build a session with [`ChatSession::new`] or [`ChatSession::from_env`].
//! - Drive it with [`ChatSession::send`], [`ChatSession::cancel_request`] and
//!   [`ChatSession::clear_messages`].
//! - Observe progress through [`ChatSession::subscribe`].

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use chat_api::{
    ChatApiClient, ChatApiConfig, ChatApiError, ChatMessage, ChatTransport, RateLimitConfig,
    RetryPolicy, Role,
};
pub use snapshot_store::{FileStore, MemoryStore, SnapshotStore, DEFAULT_SNAPSHOT_KEY};

pub use crate::config::{EnvConfig, SessionConfig, DEFAULT_SYSTEM_PROMPT};
pub use crate::error::{ChatError, ErrorCategory};
pub use crate::logging::init_tracing;
pub use crate::session::{ChatSession, CycleId, DeliveryMode, SessionEvent};
