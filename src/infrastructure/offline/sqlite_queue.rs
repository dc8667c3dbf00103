use super::mappers::{datetime_to_timestamp, pending_operation_from_row, timestamp_to_datetime};
use super::rows::PendingOperationRow;
use crate::application::ports::OperationQueue;
use crate::domain::entities::{
    CoalesceOutcome, EnqueueDisposition, EnqueueOutcome, PendingOperation, PendingOperationDraft,
    Settlement,
};
use crate::domain::value_objects::{
    EntityId, EntityType, OperationId, OperationPayload, OperationStatus, UserId,
};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

const SELECT_COLUMNS: &str = r#"
    SELECT seq, operation_id, user_id, entity_type, entity_id, operation, payload,
           status, retries, last_error, revision, created_at, updated_at
    FROM pending_operations
"#;

pub struct SqliteOperationQueue {
    pool: ConnectionPool,
}

impl SqliteOperationQueue {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn select(filter: &str) -> String {
        format!("{SELECT_COLUMNS} {filter}")
    }

    fn now() -> DateTime<Utc> {
        timestamp_to_datetime(datetime_to_timestamp(Utc::now()))
    }

    async fn find_with(
        conn: &mut SqliteConnection,
        operation_id: &OperationId,
    ) -> Result<Option<PendingOperation>, AppError> {
        let row = sqlx::query_as::<_, PendingOperationRow>(&Self::select(
            "WHERE operation_id = ?1",
        ))
        .bind(operation_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(pending_operation_from_row).transpose()
    }

    /// Writes the mutable columns of an entry that was coalesced or rewritten.
    async fn store_with(
        conn: &mut SqliteConnection,
        operation: &PendingOperation,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE pending_operations
            SET operation = ?1, payload = ?2, status = ?3, retries = ?4,
                last_error = ?5, revision = ?6, updated_at = ?7
            WHERE operation_id = ?8
            "#,
        )
        .bind(operation.operation.as_str())
        .bind(serde_json::to_string(operation.payload.as_object())?)
        .bind(operation.status.as_str())
        .bind(i64::from(operation.retries))
        .bind(operation.last_error.as_deref())
        .bind(i64::from(operation.revision))
        .bind(datetime_to_timestamp(operation.timestamp))
        .bind(operation.id.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn enqueue_with(
        conn: &mut SqliteConnection,
        draft: PendingOperationDraft,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome, AppError> {
        let existing = sqlx::query_as::<_, PendingOperationRow>(&Self::select(
            "WHERE user_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
        ))
        .bind(draft.user_id.as_str())
        .bind(draft.entity_type.as_str())
        .bind(draft.entity_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = existing else {
            let id = OperationId::generate();
            let payload = serde_json::to_string(draft.payload.as_object())?;
            let result = sqlx::query(
                r#"
                INSERT INTO pending_operations
                    (operation_id, user_id, entity_type, entity_id, operation, payload,
                     status, retries, last_error, revision, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, 0, ?8, ?8)
                "#,
            )
            .bind(id.as_str())
            .bind(draft.user_id.as_str())
            .bind(draft.entity_type.as_str())
            .bind(draft.entity_id.as_str())
            .bind(draft.operation.as_str())
            .bind(&payload)
            .bind(OperationStatus::Pending.as_str())
            .bind(datetime_to_timestamp(now))
            .execute(&mut *conn)
            .await?;

            return Ok(EnqueueOutcome {
                operation: PendingOperation {
                    id,
                    sequence: result.last_insert_rowid(),
                    user_id: draft.user_id,
                    entity_type: draft.entity_type,
                    entity_id: draft.entity_id,
                    operation: draft.operation,
                    payload: draft.payload,
                    status: OperationStatus::Pending,
                    retries: 0,
                    last_error: None,
                    revision: 0,
                    created_at: now,
                    timestamp: now,
                },
                disposition: EnqueueDisposition::Enqueued,
            });
        };

        let mut operation = pending_operation_from_row(row)?;
        let disposition = match operation.coalesce(draft, now) {
            CoalesceOutcome::Merged => {
                Self::store_with(&mut *conn, &operation).await?;
                EnqueueDisposition::Coalesced
            }
            CoalesceOutcome::Cancelled => {
                sqlx::query("DELETE FROM pending_operations WHERE operation_id = ?1")
                    .bind(operation.id.as_str())
                    .execute(&mut *conn)
                    .await?;
                EnqueueDisposition::Cancelled
            }
        };

        Ok(EnqueueOutcome {
            operation,
            disposition,
        })
    }

    /// Like `enqueue_with`, but an entry already queued for the same verb keeps
    /// its own values over the draft's.
    async fn underlay_with(
        conn: &mut SqliteConnection,
        draft: PendingOperationDraft,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome, AppError> {
        let existing = sqlx::query_as::<_, PendingOperationRow>(&Self::select(
            "WHERE user_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
        ))
        .bind(draft.user_id.as_str())
        .bind(draft.entity_type.as_str())
        .bind(draft.entity_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = existing else {
            return Self::enqueue_with(conn, draft, now).await;
        };
        let mut operation = pending_operation_from_row(row)?;
        if operation.operation != draft.operation {
            return Self::enqueue_with(conn, draft, now).await;
        }

        let mut payload = draft.payload;
        payload.merge(operation.payload.clone());
        operation.rewrite(payload, now);
        Self::store_with(&mut *conn, &operation).await?;
        Ok(EnqueueOutcome {
            operation,
            disposition: EnqueueDisposition::Coalesced,
        })
    }
}

#[async_trait]
impl OperationQueue for SqliteOperationQueue {
    async fn enqueue(&self, draft: PendingOperationDraft) -> Result<EnqueueOutcome, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let outcome = Self::enqueue_with(&mut tx, draft, Self::now()).await?;
        tx.commit().await?;

        tracing::debug!(
            target: "agrisync::queue",
            operation_id = %outcome.operation.id,
            entity_type = %outcome.operation.entity_type,
            entity_id = %outcome.operation.entity_id,
            disposition = ?outcome.disposition,
            "enqueued operation"
        );
        Ok(outcome)
    }

    async fn list_pending(&self, user_id: &UserId) -> Result<Vec<PendingOperation>, AppError> {
        let rows = sqlx::query_as::<_, PendingOperationRow>(&Self::select(
            "WHERE user_id = ?1 ORDER BY seq ASC",
        ))
        .bind(user_id.as_str())
        .fetch_all(self.pool.get_pool())
        .await?;

        rows.into_iter().map(pending_operation_from_row).collect()
    }

    async fn next_replayable(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PendingOperation>, AppError> {
        let row = sqlx::query_as::<_, PendingOperationRow>(&Self::select(
            "WHERE user_id = ?1 AND status = ?2 ORDER BY seq ASC LIMIT 1",
        ))
        .bind(user_id.as_str())
        .bind(OperationStatus::Pending.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?;

        row.map(pending_operation_from_row).transpose()
    }

    async fn find_by_entity(
        &self,
        user_id: &UserId,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Result<Option<PendingOperation>, AppError> {
        let row = sqlx::query_as::<_, PendingOperationRow>(&Self::select(
            "WHERE user_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
        ))
        .bind(user_id.as_str())
        .bind(entity_type.as_str())
        .bind(entity_id.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?;

        row.map(pending_operation_from_row).transpose()
    }

    async fn remove(&self, operation_id: &OperationId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM pending_operations WHERE operation_id = ?1")
            .bind(operation_id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn settle(
        &self,
        replayed: &PendingOperation,
        follow_ups: Vec<PendingOperationDraft>,
    ) -> Result<Settlement, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let deleted =
            sqlx::query("DELETE FROM pending_operations WHERE operation_id = ?1 AND revision = ?2")
                .bind(replayed.id.as_str())
                .bind(i64::from(replayed.revision))
                .execute(&mut *tx)
                .await?;

        if deleted.rows_affected() == 0 {
            let Some(current) = Self::find_with(&mut tx, &replayed.id).await? else {
                return Ok(Settlement::Gone);
            };
            tracing::debug!(
                target: "agrisync::queue",
                operation_id = %replayed.id,
                replayed_revision = replayed.revision,
                current_revision = current.revision,
                "entry changed while in flight"
            );
            return Ok(Settlement::Changed(current));
        }

        let now = Self::now();
        for draft in follow_ups {
            let outcome = Self::underlay_with(&mut tx, draft, now).await?;
            tracing::debug!(
                target: "agrisync::queue",
                operation_id = %outcome.operation.id,
                entity_id = %outcome.operation.entity_id,
                disposition = ?outcome.disposition,
                "enqueued follow-up"
            );
        }

        tx.commit().await?;
        Ok(Settlement::Settled)
    }

    async fn rewrite_payload(
        &self,
        operation: &PendingOperation,
        payload: OperationPayload,
    ) -> Result<Option<PendingOperation>, AppError> {
        let mut rewritten = operation.clone();
        rewritten.rewrite(payload, Self::now());

        let result = sqlx::query(
            r#"
            UPDATE pending_operations
            SET payload = ?1, status = ?2, retries = 0, last_error = NULL, revision = ?3,
                updated_at = ?4
            WHERE operation_id = ?5 AND revision = ?6
            "#,
        )
        .bind(serde_json::to_string(rewritten.payload.as_object())?)
        .bind(rewritten.status.as_str())
        .bind(i64::from(rewritten.revision))
        .bind(datetime_to_timestamp(rewritten.timestamp))
        .bind(operation.id.as_str())
        .bind(i64::from(operation.revision))
        .execute(self.pool.get_pool())
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                target: "agrisync::queue",
                operation_id = %operation.id,
                revision = operation.revision,
                "rewrite lost to a newer revision"
            );
            return Ok(None);
        }
        Ok(Some(rewritten))
    }

    async fn increment_retry(
        &self,
        operation_id: &OperationId,
        error: &str,
    ) -> Result<u32, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE pending_operations
            SET retries = retries + 1, last_error = ?1
            WHERE operation_id = ?2
            "#,
        )
        .bind(error)
        .bind(operation_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Pending operation {operation_id} not found"
            )));
        }

        let retries: i64 =
            sqlx::query_scalar("SELECT retries FROM pending_operations WHERE operation_id = ?1")
                .bind(operation_id.as_str())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(u32::try_from(retries).unwrap_or(u32::MAX))
    }

    async fn mark_failed(&self, operation_id: &OperationId, error: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE pending_operations
            SET status = ?1, last_error = ?2
            WHERE operation_id = ?3
            "#,
        )
        .bind(OperationStatus::Failed.as_str())
        .bind(error)
        .bind(operation_id.as_str())
        .execute(self.pool.get_pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Pending operation {operation_id} not found"
            )));
        }
        Ok(())
    }
}
