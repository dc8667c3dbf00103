use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// No auth token; operations stay queued and untouched.
    Unauthenticated,
    /// A transient failure at the head of the queue; later operations wait.
    TransientFailure,
    /// The signed-in user changed while draining.
    SessionChanged,
}

/// Outcome of one drain pass over a user's queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SyncResult {
    pub synced_count: u32,
    pub retried_count: u32,
    pub failed_count: u32,
    pub pending_count: u32,
    pub halted: Option<HaltReason>,
}

impl SyncResult {
    pub fn new(
        synced_count: u32,
        retried_count: u32,
        failed_count: u32,
        pending_count: u32,
    ) -> Self {
        Self {
            synced_count,
            retried_count,
            failed_count,
            pending_count,
            halted: None,
        }
    }

    pub fn absorb(&mut self, other: SyncResult) {
        self.synced_count += other.synced_count;
        self.retried_count += other.retried_count;
        self.failed_count += other.failed_count;
        self.pending_count = other.pending_count;
        self.halted = other.halted;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRun {
    Completed(SyncResult),
    /// A drain for this user was already running; it will pick the work up.
    Deferred,
    NoSession,
}
