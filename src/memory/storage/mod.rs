//! Storage backends for user records.

pub mod in_memory_storage;
pub mod interface;
pub mod notion_storage;

pub use in_memory_storage::InMemoryStore;
pub use interface::RecordStore;
pub use notion_storage::{NotionDatabases, NotionStore};
