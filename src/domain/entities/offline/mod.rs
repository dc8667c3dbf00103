pub mod commands;
pub mod pending_operation;
pub mod sync_issue;
pub mod sync_result;

pub use commands::PendingOperationDraft;
pub use pending_operation::{
    CoalesceOutcome, EnqueueDisposition, EnqueueOutcome, PendingOperation, Settlement,
};
pub use sync_issue::{ItemError, SyncIssue, SyncIssueKind};
pub use sync_result::{HaltReason, SyncResult, SyncRun};
