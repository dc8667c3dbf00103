use super::mappers::{datetime_to_timestamp, sync_issue_from_row};
use super::rows::SyncIssueRow;
use crate::application::ports::SyncIssueStore;
use crate::domain::entities::SyncIssue;
use crate::domain::value_objects::{EntityId, EntityType, UserId};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;

pub struct SqliteSyncIssueStore {
    pool: ConnectionPool,
}

impl SqliteSyncIssueStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncIssueStore for SqliteSyncIssueStore {
    async fn record(&self, issue: SyncIssue) -> Result<(), AppError> {
        let item_errors = serde_json::to_string(&issue.item_errors)?;
        let details = issue
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO sync_issues
                (entity_type, entity_id, user_id, operation_id, kind, code, message,
                 item_errors, details, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                user_id = excluded.user_id,
                operation_id = excluded.operation_id,
                kind = excluded.kind,
                code = excluded.code,
                message = excluded.message,
                item_errors = excluded.item_errors,
                details = excluded.details,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(issue.entity_type.as_str())
        .bind(issue.entity_id.as_str())
        .bind(issue.user_id.as_str())
        .bind(issue.operation_id.as_str())
        .bind(issue.kind.as_str())
        .bind(issue.code.as_deref())
        .bind(&issue.message)
        .bind(&item_errors)
        .bind(details.as_deref())
        .bind(datetime_to_timestamp(issue.recorded_at))
        .execute(self.pool.get_pool())
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Result<Option<SyncIssue>, AppError> {
        let row = sqlx::query_as::<_, SyncIssueRow>(
            r#"
            SELECT entity_type, entity_id, user_id, operation_id, kind, code, message,
                   item_errors, details, recorded_at
            FROM sync_issues
            WHERE entity_type = ?1 AND entity_id = ?2
            "#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?;

        row.map(sync_issue_from_row).transpose()
    }

    async fn clear(&self, entity_type: &EntityType, entity_id: &EntityId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sync_issues WHERE entity_type = ?1 AND entity_id = ?2")
            .bind(entity_type.as_str())
            .bind(entity_id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<SyncIssue>, AppError> {
        let rows = sqlx::query_as::<_, SyncIssueRow>(
            r#"
            SELECT entity_type, entity_id, user_id, operation_id, kind, code, message,
                   item_errors, details, recorded_at
            FROM sync_issues
            WHERE user_id = ?1
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(self.pool.get_pool())
        .await?;

        rows.into_iter().map(sync_issue_from_row).collect()
    }
}
