use crate::domain::value_objects::offline::{EntityId, EntityType, OperationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncIssueKind {
    Validation,
    Conflict,
    Rejected,
    RetriesExhausted,
    Unsupported,
}

impl SyncIssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncIssueKind::Validation => "validation",
            SyncIssueKind::Conflict => "conflict",
            SyncIssueKind::Rejected => "rejected",
            SyncIssueKind::RetriesExhausted => "retries_exhausted",
            SyncIssueKind::Unsupported => "unsupported",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "validation" => Some(SyncIssueKind::Validation),
            "conflict" => Some(SyncIssueKind::Conflict),
            "rejected" => Some(SyncIssueKind::Rejected),
            "retries_exhausted" => Some(SyncIssueKind::RetriesExhausted),
            "unsupported" => Some(SyncIssueKind::Unsupported),
            _ => None,
        }
    }
}

/// One offending field, optionally pinned to an item of a bulk submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub index: Option<usize>,
    pub field: String,
    pub code: Option<String>,
    pub message: String,
}

/// Failure state attached to an entity so the UI can render it without
/// knowing about the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncIssue {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub user_id: UserId,
    pub operation_id: OperationId,
    pub kind: SyncIssueKind,
    pub code: Option<String>,
    pub message: String,
    pub item_errors: Vec<ItemError>,
    pub details: Option<Value>,
    pub recorded_at: DateTime<Utc>,
}

impl SyncIssue {
    pub fn errors_for_item(&self, index: usize) -> impl Iterator<Item = &ItemError> {
        self.item_errors
            .iter()
            .filter(move |error| error.index == Some(index))
    }
}
