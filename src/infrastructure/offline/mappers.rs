use super::rows::{PendingOperationRow, SyncIssueRow};
use crate::domain::entities::{ItemError, PendingOperation, SyncIssue, SyncIssueKind};
use crate::domain::value_objects::{
    EntityId, EntityType, OperationId, OperationKind, OperationPayload, OperationStatus, UserId,
};
use crate::shared::error::AppError;
use chrono::{DateTime, TimeZone, Utc};

pub fn pending_operation_from_row(row: PendingOperationRow) -> Result<PendingOperation, AppError> {
    let PendingOperationRow {
        seq,
        operation_id,
        user_id,
        entity_type,
        entity_id,
        operation,
        payload,
        status,
        retries,
        last_error,
        revision,
        created_at,
        updated_at,
    } = row;

    Ok(PendingOperation {
        id: OperationId::parse(&operation_id).map_err(AppError::DeserializationError)?,
        sequence: seq,
        user_id: UserId::new(user_id).map_err(AppError::DeserializationError)?,
        entity_type: EntityType::new(entity_type).map_err(AppError::DeserializationError)?,
        entity_id: EntityId::new(entity_id).map_err(AppError::DeserializationError)?,
        operation: operation
            .parse::<OperationKind>()
            .map_err(AppError::DeserializationError)?,
        payload: OperationPayload::from_json_str(&payload)
            .map_err(AppError::DeserializationError)?,
        status: OperationStatus::from(status.as_str()),
        retries: u32::try_from(retries).unwrap_or(0),
        last_error,
        revision: u32::try_from(revision).unwrap_or(0),
        created_at: timestamp_to_datetime(created_at),
        timestamp: timestamp_to_datetime(updated_at),
    })
}

pub fn sync_issue_from_row(row: SyncIssueRow) -> Result<SyncIssue, AppError> {
    let kind = SyncIssueKind::parse(&row.kind).ok_or_else(|| {
        AppError::DeserializationError(format!("Unknown sync issue kind: {}", row.kind))
    })?;
    let item_errors: Vec<ItemError> = serde_json::from_str(&row.item_errors)
        .map_err(|e| AppError::DeserializationError(e.to_string()))?;
    let details = row
        .details
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| AppError::DeserializationError(e.to_string()))?;

    Ok(SyncIssue {
        entity_type: EntityType::new(row.entity_type).map_err(AppError::DeserializationError)?,
        entity_id: EntityId::new(row.entity_id).map_err(AppError::DeserializationError)?,
        user_id: UserId::new(row.user_id).map_err(AppError::DeserializationError)?,
        operation_id: OperationId::parse(&row.operation_id)
            .map_err(AppError::DeserializationError)?,
        kind,
        code: row.code,
        message: row.message,
        item_errors,
        details,
        recorded_at: timestamp_to_datetime(row.recorded_at),
    })
}

pub fn datetime_to_timestamp(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub fn timestamp_to_datetime(value: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(value)
        .single()
        .unwrap_or_else(Utc::now)
}
