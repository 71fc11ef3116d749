mod error;
mod paths;
mod snapshot;
mod store;

pub use error::SnapshotStoreError;
pub use paths::{is_valid_key, snapshot_file_name, DEFAULT_SNAPSHOT_KEY};
pub use snapshot::{read_snapshot, remove_snapshot, write_snapshot};
pub use store::{FileStore, MemoryStore, SnapshotStore};
