use crate::domain::entities::MirrorRecord;
use crate::domain::value_objects::{EntityType, LocalId, ServerId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn upsert(&self, record: MirrorRecord) -> Result<(), AppError>;

    /// Resolves `id` as either the local id or the server id.
    async fn get(&self, entity_type: &EntityType, id: &str)
    -> Result<Option<MirrorRecord>, AppError>;

    async fn list(
        &self,
        entity_type: &EntityType,
        parent_id: Option<&str>,
    ) -> Result<Vec<MirrorRecord>, AppError>;

    /// Backfills the server id of a locally created record and clears its pending marker.
    /// Server fields only fill keys the local copy lacks.
    async fn confirm(
        &self,
        entity_type: &EntityType,
        local_id: &LocalId,
        server_id: &ServerId,
        data: Option<Value>,
    ) -> Result<(), AppError>;

    /// Merges `fields` into the stored data of the record `id` resolves to.
    async fn patch(
        &self,
        entity_type: &EntityType,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Option<MirrorRecord>, AppError>;

    async fn remove(&self, entity_type: &EntityType, id: &str) -> Result<(), AppError>;

    /// Replaces the confirmed records of a scope with a fresh server listing.
    /// Records whose create is still pending are kept.
    async fn replace_scope(
        &self,
        entity_type: &EntityType,
        parent_id: Option<&str>,
        records: Vec<MirrorRecord>,
    ) -> Result<(), AppError>;
}
