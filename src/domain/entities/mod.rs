pub mod mirror;
pub mod offline;
pub mod parcel;

pub use mirror::{DataSource, Loaded, MirrorRecord};
pub use offline::{
    CoalesceOutcome, EnqueueDisposition, EnqueueOutcome, HaltReason, ItemError, PendingOperation,
    PendingOperationDraft, Settlement, SyncIssue, SyncIssueKind, SyncResult, SyncRun,
};
pub use parcel::{Parcel, ParcelDraft};
