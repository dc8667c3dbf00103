pub mod mappers;
pub mod rows;
pub mod sqlite_issue_store;
pub mod sqlite_queue;

pub use sqlite_issue_store::SqliteSyncIssueStore;
pub use sqlite_queue::SqliteOperationQueue;
