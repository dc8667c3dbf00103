use super::error::{ErrorEnvelope, RemoteError, SyncError};
use crate::domain::entities::{ItemError, PendingOperation, SyncIssue, SyncIssueKind};
use chrono::Utc;

/// Issue for an operation the server refused for good.
pub fn permanent_issue(operation: &PendingOperation, error: &SyncError) -> SyncIssue {
    build(operation, classify_kind(error), error)
}

/// Issue for an operation that kept failing transiently until it ran out of retries.
pub fn exhausted_issue(operation: &PendingOperation, error: &SyncError) -> SyncIssue {
    build(operation, SyncIssueKind::RetriesExhausted, error)
}

fn build(operation: &PendingOperation, kind: SyncIssueKind, error: &SyncError) -> SyncIssue {
    let envelope = envelope_of(error);

    SyncIssue {
        entity_type: operation.entity_type.clone(),
        entity_id: operation.entity_id.clone(),
        user_id: operation.user_id.clone(),
        operation_id: operation.id.clone(),
        kind,
        code: envelope.and_then(|envelope| envelope.code.clone()),
        message: envelope
            .and_then(|envelope| envelope.message.clone())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| error.to_string()),
        item_errors: envelope.map(item_errors).unwrap_or_default(),
        details: envelope.and_then(|envelope| serde_json::to_value(envelope).ok()),
        recorded_at: Utc::now(),
    }
}

fn envelope_of(error: &SyncError) -> Option<&ErrorEnvelope> {
    match error {
        SyncError::Remote(remote) => remote.envelope(),
        _ => None,
    }
}

fn classify_kind(error: &SyncError) -> SyncIssueKind {
    match error {
        SyncError::UnsupportedOperation { .. } | SyncError::NoHandler(_) => {
            SyncIssueKind::Unsupported
        }
        SyncError::Remote(RemoteError::Status { status, envelope }) => {
            if *status == 409 || reports_duplicate(envelope) {
                SyncIssueKind::Conflict
            } else if matches!(status, 400 | 422) {
                SyncIssueKind::Validation
            } else {
                SyncIssueKind::Rejected
            }
        }
        _ => SyncIssueKind::Rejected,
    }
}

fn reports_duplicate(envelope: &ErrorEnvelope) -> bool {
    let mentions = |text: &str| {
        let text = text.to_ascii_lowercase();
        text.contains("unique") || text.contains("duplicate")
    };

    envelope.code.as_deref().is_some_and(mentions)
        || envelope
            .errors
            .iter()
            .any(|error| error.rule_or_code().is_some_and(mentions))
}

fn item_errors(envelope: &ErrorEnvelope) -> Vec<ItemError> {
    envelope
        .errors
        .iter()
        .map(|error| ItemError {
            index: item_index(&error.field),
            field: error.field.clone(),
            code: error.rule_or_code().map(str::to_string),
            message: error.message.clone(),
        })
        .collect()
}

/// `parcels.1.identificationId` -> `Some(1)`.
pub fn item_index(path: &str) -> Option<usize> {
    path.split(['.', '[', ']'])
        .find_map(|segment| segment.parse::<usize>().ok())
}
