use super::PendingOperationDraft;
use crate::domain::value_objects::offline::{
    EntityId, EntityType, OperationId, OperationKind, OperationPayload, OperationStatus, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    pub id: OperationId,
    /// Insertion position within the queue; replay order. Never changes after enqueue.
    pub sequence: i64,
    pub user_id: UserId,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub operation: OperationKind,
    pub payload: OperationPayload,
    pub status: OperationStatus,
    pub retries: u32,
    pub last_error: Option<String>,
    /// Bumped by every coalesced edit; a replay only settles the revision it sent.
    #[serde(default)]
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    /// Last-modified time (enqueue or most recent coalesced edit).
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceOutcome {
    Merged,
    /// The entity never reached the server and the new edit deletes it.
    Cancelled,
}

impl PendingOperation {
    /// Folds a later edit of the same entity into this not-yet-confirmed operation.
    ///
    /// Create verbs absorb later edits; an update followed by a delete becomes a
    /// delete; a delete of a never-created entity cancels the whole entry. The
    /// entry is re-armed for replay even if it had been surfaced as failed.
    pub fn coalesce(&mut self, draft: PendingOperationDraft, at: DateTime<Utc>) -> CoalesceOutcome {
        if draft.operation == OperationKind::Delete {
            if self.operation.is_create() {
                return CoalesceOutcome::Cancelled;
            }
            self.operation = OperationKind::Delete;
        }

        self.payload.merge(draft.payload);
        self.rearm(at);
        CoalesceOutcome::Merged
    }

    /// Swaps the whole payload, as an edit that rebuilt it from this revision.
    pub fn rewrite(&mut self, payload: OperationPayload, at: DateTime<Utc>) {
        self.payload = payload;
        self.rearm(at);
    }

    fn rearm(&mut self, at: DateTime<Utc>) {
        self.timestamp = at;
        self.status = OperationStatus::Pending;
        self.retries = 0;
        self.last_error = None;
        self.revision = self.revision.saturating_add(1);
    }

    pub fn is_replayable(&self) -> bool {
        self.status.is_replayable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueDisposition {
    Enqueued,
    Coalesced,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOutcome {
    pub operation: PendingOperation,
    pub disposition: EnqueueDisposition,
}

/// State of a replayed entry when the drain comes back to settle it.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Still at the replayed revision; removed and follow-ups enqueued.
    Settled,
    /// An edit was coalesced in while the replay was in flight.
    Changed(PendingOperation),
    /// The entry was cancelled while in flight.
    Gone,
}
