use crate::domain::entities::{EnqueueOutcome, PendingOperation, PendingOperationDraft, Settlement};
use crate::domain::value_objects::{EntityId, EntityType, OperationId, OperationPayload, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable, per-user FIFO of mutations waiting to reach the server.
#[async_trait]
pub trait OperationQueue: Send + Sync {
    /// Persists a draft, coalescing it into an existing entry for the same entity.
    async fn enqueue(&self, draft: PendingOperationDraft) -> Result<EnqueueOutcome, AppError>;

    /// Every entry of the user (pending and failed) in replay order.
    async fn list_pending(&self, user_id: &UserId) -> Result<Vec<PendingOperation>, AppError>;

    async fn next_replayable(&self, user_id: &UserId)
    -> Result<Option<PendingOperation>, AppError>;

    async fn find_by_entity(
        &self,
        user_id: &UserId,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Result<Option<PendingOperation>, AppError>;

    async fn remove(&self, operation_id: &OperationId) -> Result<(), AppError>;

    /// Removes a replayed entry and enqueues `follow_ups` in one transaction,
    /// provided the entry is still at the revision that was replayed.
    async fn settle(
        &self,
        replayed: &PendingOperation,
        follow_ups: Vec<PendingOperationDraft>,
    ) -> Result<Settlement, AppError>;

    /// Replaces the payload of `operation` if nobody changed it since it was read.
    /// Returns the rewritten entry, or `None` when the caller must re-read.
    async fn rewrite_payload(
        &self,
        operation: &PendingOperation,
        payload: OperationPayload,
    ) -> Result<Option<PendingOperation>, AppError>;

    /// Returns the retry count after the increment.
    async fn increment_retry(
        &self,
        operation_id: &OperationId,
        error: &str,
    ) -> Result<u32, AppError>;

    async fn mark_failed(&self, operation_id: &OperationId, error: &str) -> Result<(), AppError>;
}
