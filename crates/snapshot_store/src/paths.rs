/// Storage key holding the tutor conversation.
pub const DEFAULT_SNAPSHOT_KEY: &str = "chat_history";

/// Keys become file names, so only a conservative character set is accepted.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[must_use]
pub fn snapshot_file_name(key: &str) -> String {
    format!("{key}.json")
}
