//! Tracing subscriber setup for hosts embedding the chat session.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive.
pub const LOG_ENV_VAR: &str = "STUDY_CHAT_LOG";

/// Filter used when neither the caller nor `STUDY_CHAT_LOG` provides one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install a formatted `tracing` subscriber.
///
/// An explicit `filter` wins; otherwise `STUDY_CHAT_LOG` is read. Returns false
/// when a global subscriber was already installed; calling this more than once
/// is harmless.
pub fn init_tracing(filter: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(filter))
        .with_target(true)
        .try_init()
        .is_ok()
}

fn resolve_filter(filter: Option<&str>) -> EnvFilter {
    let explicit = filter
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok());

    explicit
        .or_else(|| EnvFilter::try_from_env(LOG_ENV_VAR).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
