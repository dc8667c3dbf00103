use crate::domain::value_objects::mirror::{LocalId, ServerId};
use crate::domain::value_objects::offline::{EntityId, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cached copy of a server entity, or an optimistic local one awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirrorRecord {
    pub entity_type: EntityType,
    pub local_id: Option<LocalId>,
    pub server_id: Option<ServerId>,
    /// Scope used for list reads (producer of a parcel, actor of a relation).
    pub parent_id: Option<String>,
    /// Queue entity whose create has not been confirmed yet.
    pub pending_entity_id: Option<EntityId>,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

impl MirrorRecord {
    pub fn local(
        entity_type: EntityType,
        local_id: LocalId,
        parent_id: Option<String>,
        pending_entity_id: EntityId,
        data: Value,
    ) -> Self {
        Self {
            entity_type,
            local_id: Some(local_id),
            server_id: None,
            parent_id,
            pending_entity_id: Some(pending_entity_id),
            data,
            updated_at: Utc::now(),
        }
    }

    pub fn from_server(
        entity_type: EntityType,
        server_id: ServerId,
        parent_id: Option<String>,
        data: Value,
    ) -> Self {
        Self {
            entity_type,
            local_id: None,
            server_id: Some(server_id),
            parent_id,
            pending_entity_id: None,
            data,
            updated_at: Utc::now(),
        }
    }

    /// Storage key: the local id while one exists, so it survives the server id backfill.
    pub fn key(&self) -> Option<&str> {
        self.local_id
            .as_ref()
            .map(LocalId::as_str)
            .or_else(|| self.server_id.as_ref().map(ServerId::as_str))
    }

    /// Whether `id` names this record through either identity.
    pub fn answers_to(&self, id: &str) -> bool {
        self.local_id.as_ref().is_some_and(|local| local.as_str() == id)
            || self.server_id.as_ref().is_some_and(|server| server.as_str() == id)
    }

    pub fn is_pending(&self) -> bool {
        self.pending_entity_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Remote,
    Mirror,
}

/// Read result labelled with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Loaded<T> {
    pub fn remote(data: T) -> Self {
        Self {
            data,
            source: DataSource::Remote,
        }
    }

    pub fn mirror(data: T) -> Self {
        Self {
            data,
            source: DataSource::Mirror,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loaded<U> {
        Loaded {
            data: f(self.data),
            source: self.source,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.source == DataSource::Remote
    }
}
