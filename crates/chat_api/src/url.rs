/// Default base URL of the hosted backend.
pub const DEFAULT_CHAT_BASE_URL: &str = "http://localhost:54321";

const FUNCTIONS_PATH: &str = "/functions/v1";
const CHAT_FUNCTION: &str = "/chat-gpt";

/// Normalize a backend base URL to the chat-completion function endpoint.
///
/// Normalization rules:
/// 1) keep `/functions/v1/chat-gpt` unchanged
/// 2) append `/chat-gpt` when path ends in `/functions/v1`
/// 3) append `/functions/v1/chat-gpt` otherwise
pub fn normalize_chat_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_CHAT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(&format!("{FUNCTIONS_PATH}{CHAT_FUNCTION}")) {
        return trimmed.to_string();
    }
    if trimmed.ends_with(FUNCTIONS_PATH) {
        return format!("{trimmed}{CHAT_FUNCTION}");
    }
    format!("{trimmed}{FUNCTIONS_PATH}{CHAT_FUNCTION}")
}
