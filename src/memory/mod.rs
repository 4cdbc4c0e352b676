//! Per-user records the bot keeps: names, preferences, memory facts, TODO
//! items and link summaries, plus their storage backends.

pub mod records;
pub mod storage;

pub use records::{
    NewSummary, NewTodo, Priority, SummaryFormat, SummaryRecord, SummaryRequest, TodoPatch, TodoRecord,
    UserRecord, UserUpdate,
};
pub use storage::{InMemoryStore, NotionDatabases, NotionStore, RecordStore};
