use crate::domain::value_objects::offline::{
    EntityId, EntityType, OperationKind, OperationPayload, UserId,
};
use serde::{Deserialize, Serialize};

/// A mutation about to be written into the pending operation queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperationDraft {
    pub user_id: UserId,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub operation: OperationKind,
    pub payload: OperationPayload,
}

impl PendingOperationDraft {
    pub fn new(
        user_id: UserId,
        entity_type: EntityType,
        entity_id: EntityId,
        operation: OperationKind,
        payload: OperationPayload,
    ) -> Self {
        Self {
            user_id,
            entity_type,
            entity_id,
            operation,
            payload,
        }
    }
}
