mod backend;
mod sqlite;
mod store;
mod transfer;

pub use backend::{MemoryBackend, StorageBackend};
pub use sqlite::SqliteBackend;
pub use store::{KeyValueStore, StorageInfo, StoreKey};
pub use transfer::{ExportDocument, ImportSummary};
