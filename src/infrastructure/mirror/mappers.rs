use super::rows::MirrorRecordRow;
use crate::domain::entities::MirrorRecord;
use crate::domain::value_objects::{EntityId, EntityType, LocalId, ServerId};
use crate::infrastructure::offline::mappers::timestamp_to_datetime;
use crate::shared::error::AppError;

pub fn mirror_record_from_row(row: MirrorRecordRow) -> Result<MirrorRecord, AppError> {
    Ok(MirrorRecord {
        entity_type: EntityType::new(row.entity_type).map_err(AppError::DeserializationError)?,
        local_id: row
            .local_id
            .map(LocalId::new)
            .transpose()
            .map_err(AppError::DeserializationError)?,
        server_id: row
            .server_id
            .map(ServerId::new)
            .transpose()
            .map_err(AppError::DeserializationError)?,
        parent_id: row.parent_id,
        pending_entity_id: row
            .pending_entity_id
            .map(EntityId::new)
            .transpose()
            .map_err(AppError::DeserializationError)?,
        data: serde_json::from_str(&row.data)
            .map_err(|e| AppError::DeserializationError(e.to_string()))?,
        updated_at: timestamp_to_datetime(row.updated_at),
    })
}
