use crate::domain::entities::SyncIssue;
use crate::domain::value_objects::{EntityId, EntityType, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait SyncIssueStore: Send + Sync {
    /// Records the issue, replacing any previous one for the same entity.
    async fn record(&self, issue: SyncIssue) -> Result<(), AppError>;
    async fn get(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Result<Option<SyncIssue>, AppError>;
    async fn clear(&self, entity_type: &EntityType, entity_id: &EntityId) -> Result<(), AppError>;
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<SyncIssue>, AppError>;
}
