use chat_api::ChatMessage;

use crate::error::SnapshotStoreError;
use crate::store::SnapshotStore;

/// Load the conversation stored under `key`; `Ok(None)` when the key is absent.
pub fn read_snapshot(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<Vec<ChatMessage>>, SnapshotStoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    serde_json::from_str::<Vec<ChatMessage>>(&raw)
        .map(Some)
        .map_err(|source| SnapshotStoreError::parse(key, source))
}

/// Store `messages` under `key` as a JSON array of `{role, content}` objects.
pub fn write_snapshot(
    store: &dyn SnapshotStore,
    key: &str,
    messages: &[ChatMessage],
) -> Result<(), SnapshotStoreError> {
    let raw =
        serde_json::to_string(messages).map_err(|source| SnapshotStoreError::serialize(key, source))?;
    store.set(key, &raw)?;
    tracing::trace!(key, messages = messages.len(), "snapshot written");
    Ok(())
}

pub fn remove_snapshot(store: &dyn SnapshotStore, key: &str) -> Result<(), SnapshotStoreError> {
    store.remove(key)
}
