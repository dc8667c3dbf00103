use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingOperationRow {
    pub seq: i64,
    pub operation_id: String,
    pub user_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: String,
    pub payload: String,
    pub status: String,
    pub retries: i64,
    pub last_error: Option<String>,
    pub revision: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncIssueRow {
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    pub operation_id: String,
    pub kind: String,
    pub code: Option<String>,
    pub message: String,
    pub item_errors: String,
    pub details: Option<String>,
    pub recorded_at: i64,
}
