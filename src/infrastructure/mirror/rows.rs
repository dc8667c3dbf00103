use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MirrorRecordRow {
    pub entity_type: String,
    pub record_key: String,
    pub local_id: Option<String>,
    pub server_id: Option<String>,
    pub parent_id: Option<String>,
    pub pending_entity_id: Option<String>,
    pub data: String,
    pub updated_at: i64,
}
