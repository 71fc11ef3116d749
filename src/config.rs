//! Session and environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chat_api::{ChatApiConfig, RateLimitConfig, RetryPolicy};
use snapshot_store::{FileStore, DEFAULT_SNAPSHOT_KEY};

use crate::session::DeliveryMode;

/// Instructions seeding every conversation; never shown to the user.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly study assistant who helps students learn effectively. \
Explain step by step, check understanding with short questions, and format answers with markdown.";

/// Snapshot directory used when `STUDY_CHAT_STORE_DIR` is unset.
pub const DEFAULT_STORE_DIR: &str = ".study-chat";

/// Controller settings for one [`crate::ChatSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub system_prompt: String,
    /// Storage key of the persisted conversation.
    pub storage_key: String,
    pub retry: RetryPolicy,
    /// Mode used by [`crate::ChatSession::send`].
    pub default_mode: DeliveryMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            storage_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            retry: RetryPolicy::default(),
            default_mode: DeliveryMode::Streaming,
        }
    }
}

impl SessionConfig {
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = storage_key.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_mode(mut self, default_mode: DeliveryMode) -> Self {
        self.default_mode = default_mode;
        self
    }
}

/// Settings read from `STUDY_CHAT_*` environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub conversation_id: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub store_dir: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let defaults = RateLimitConfig::default();
        let window_secs = env_parse("STUDY_CHAT_RATE_WINDOW_SECS", defaults.window.as_secs());

        Self {
            base_url: env_string_opt("STUDY_CHAT_BASE_URL"),
            api_key: env_string_opt("STUDY_CHAT_API_KEY"),
            model: env_string_opt("STUDY_CHAT_MODEL"),
            conversation_id: env_string_opt("STUDY_CHAT_CONVERSATION_ID"),
            rate_limit: RateLimitConfig::new(
                env_parse("STUDY_CHAT_RATE_LIMIT", defaults.max_requests),
                Duration::from_secs(window_secs),
            ),
            store_dir: env_string_opt("STUDY_CHAT_STORE_DIR").map(PathBuf::from),
            log_filter: env_string_opt("STUDY_CHAT_LOG"),
        }
    }

    pub fn api_config(&self) -> ChatApiConfig {
        let mut config =
            ChatApiConfig::new(self.api_key.clone().unwrap_or_default()).with_rate_limit(self.rate_limit);

        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(model) = &self.model {
            config = config.with_model(model);
        }

        if let Some(conversation_id) = &self.conversation_id {
            config = config.with_conversation_id(conversation_id);
        }

        config
    }

    pub fn snapshot_store(&self) -> FileStore {
        let root = self
            .store_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));
        FileStore::new(root)
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}
