use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Default model requested from the gateway.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Request body accepted by the chat-completion function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    /// Default: false.
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: model.into(),
            stream: false,
            conversation_id: None,
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }
}

/// Buffered success body: `{"message": "...", "tokens": 42}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletionBody {
    pub message: String,
    #[serde(default)]
    pub tokens: u64,
}
