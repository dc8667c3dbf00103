use super::error::SyncError;
use crate::domain::entities::{PendingOperation, PendingOperationDraft};
use crate::domain::value_objects::{EntityType, LocalId, ServerId};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A locally created record the server has now assigned an id to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedRecord {
    pub local_id: LocalId,
    pub server_id: ServerId,
    pub data: Option<Value>,
}

/// What a successful replay changed on the server, for the local mirror.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncAck {
    pub confirmed: Vec<ConfirmedRecord>,
    /// Ids of records the server no longer has.
    pub removed: Vec<String>,
}

/// Replays the queued operations of one entity type against the server.
///
/// Implementations rebuild the request from the payload and hand failures back
/// unchanged; retry decisions belong to the caller.
#[async_trait]
pub trait EntitySyncHandler: Send + Sync {
    fn entity_type(&self) -> EntityType;
    async fn handle(&self, operation: &PendingOperation) -> Result<SyncAck, SyncError>;

    /// Re-expresses edits that reached a create while it was in flight as
    /// operations on the records the server just created. `current` is `None`
    /// when the entry was cancelled in the meantime.
    fn rebase(
        &self,
        replayed: &PendingOperation,
        _current: Option<&PendingOperation>,
        _ack: &SyncAck,
    ) -> Result<Vec<PendingOperationDraft>, SyncError> {
        Err(SyncError::UnsupportedOperation {
            entity_type: replayed.entity_type.to_string(),
            operation: format!("rebase of {}", replayed.operation),
        })
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EntityType, Arc<dyn EntitySyncHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn EntitySyncHandler>) {
        let entity_type = handler.entity_type();
        if self
            .handlers
            .insert(entity_type.clone(), handler)
            .is_some()
        {
            tracing::warn!(
                target: "agrisync::sync",
                entity_type = %entity_type,
                "replaced previously registered sync handler"
            );
        }
    }

    pub fn with(mut self, handler: Arc<dyn EntitySyncHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, entity_type: &EntityType) -> Option<Arc<dyn EntitySyncHandler>> {
        self.handlers.get(entity_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
