use super::read_path::ReadPath;
use crate::application::ports::{
    AuthContext, MirrorStore, OperationQueue, ParcelApi, SyncIssueStore, SyncTrigger,
};
use crate::domain::entities::parcel::{
    LOCAL_ID_FIELD, PARCELS_FIELD, PARCEL_ID_FIELD, PRODUCER_FIELD,
};
use crate::domain::entities::{
    Loaded, MirrorRecord, Parcel, ParcelDraft, PendingOperation, PendingOperationDraft, SyncIssue,
};
use crate::domain::value_objects::{
    AuthToken, EntityId, EntityType, LocalId, OperationKind, OperationPayload, ServerId, UserId,
};
use crate::shared::error::AppError;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Re-reads allowed when a queued batch keeps changing under an edit.
const EDIT_ATTEMPTS: u32 = 8;

/// Parcels as the UI sees them: queued writes, remote-first reads.
pub struct ParcelRepository {
    queue: Arc<dyn OperationQueue>,
    mirror: Arc<dyn MirrorStore>,
    issues: Arc<dyn SyncIssueStore>,
    auth: Arc<dyn AuthContext>,
    trigger: Arc<dyn SyncTrigger>,
    api: Arc<dyn ParcelApi>,
    read_path: ReadPath,
}

impl ParcelRepository {
    pub fn new(
        queue: Arc<dyn OperationQueue>,
        mirror: Arc<dyn MirrorStore>,
        issues: Arc<dyn SyncIssueStore>,
        auth: Arc<dyn AuthContext>,
        trigger: Arc<dyn SyncTrigger>,
        api: Arc<dyn ParcelApi>,
        read_path: ReadPath,
    ) -> Self {
        Self {
            queue,
            mirror,
            issues,
            auth,
            trigger,
            api,
            read_path,
        }
    }

    fn current_user(&self) -> Result<UserId, AppError> {
        self.auth
            .current_user_id()
            .ok_or_else(|| AppError::Unauthorized("No user is signed in".to_string()))
    }

    /// Queues one bulk create for all drafts and mirrors each parcel locally.
    pub async fn create_parcels(
        &self,
        producer_id: &str,
        drafts: Vec<ParcelDraft>,
    ) -> Result<Vec<Parcel>, AppError> {
        let user_id = self.current_user()?;
        if producer_id.trim().is_empty() {
            return Err(AppError::InvalidInput("Producer id is required".to_string()));
        }
        if drafts.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one parcel is required".to_string(),
            ));
        }

        let batch_id = EntityId::generate();
        let local_ids: Vec<LocalId> = drafts.iter().map(|_| LocalId::generate()).collect();
        let entries: Vec<Value> = drafts
            .iter()
            .zip(&local_ids)
            .map(|(draft, local_id)| draft.to_queue_entry(local_id))
            .collect();

        let payload = OperationPayload::new(json!({
            PRODUCER_FIELD: producer_id,
            PARCELS_FIELD: entries,
        }))
        .map_err(AppError::InvalidInput)?;
        self.queue
            .enqueue(PendingOperationDraft::new(
                user_id,
                EntityType::parcel(),
                batch_id.clone(),
                OperationKind::CreateBulk,
                payload,
            ))
            .await?;

        let mut parcels = Vec::with_capacity(drafts.len());
        for (draft, local_id) in drafts.iter().zip(local_ids) {
            let record = MirrorRecord::local(
                EntityType::parcel(),
                local_id,
                Some(producer_id.to_string()),
                batch_id.clone(),
                Value::Object(draft.to_fields()),
            );
            self.mirror.upsert(record.clone()).await?;
            parcels.push(Parcel::from(record));
        }

        self.trigger.request_sync();
        Ok(parcels)
    }

    /// Queues an edit; `id` may be the local or the server id.
    pub async fn update_parcel(
        &self,
        id: &str,
        mut patch: Map<String, Value>,
    ) -> Result<Parcel, AppError> {
        let user_id = self.current_user()?;
        for field in [LOCAL_ID_FIELD, PARCEL_ID_FIELD, "id"] {
            patch.remove(field);
        }
        if patch.is_empty() {
            return Err(AppError::InvalidInput("Nothing to update".to_string()));
        }

        let parcels = EntityType::parcel();
        let mut attempts = 0;
        let record = loop {
            let record = self.mirror.get(&parcels, id).await?;
            let Some(MirrorRecord {
                server_id: None,
                local_id: Some(local_id),
                pending_entity_id: Some(batch_id),
                ..
            }) = record.as_ref()
            else {
                self.queue_update(&user_id, id, record.as_ref(), &patch).await?;
                break record;
            };

            if self.rewrite_batch_entry(&user_id, batch_id, local_id, &patch).await? {
                break record;
            }
            attempts += 1;
            if attempts == EDIT_ATTEMPTS {
                return Err(AppError::InvalidInput(format!(
                    "Parcel {id} is being synchronized; retry the edit shortly"
                )));
            }
            tracing::debug!(
                target: "agrisync::queue",
                parcel_id = %id,
                batch_id = %batch_id,
                attempts,
                "batch changed under the edit; re-reading"
            );
        };

        let updated = match record {
            Some(record) => {
                let key = record.key().unwrap_or(id).to_string();
                let patched = self.mirror.patch(&parcels, &key, patch).await?;
                Parcel::from(patched.unwrap_or(record))
            }
            None => Parcel {
                local_id: None,
                server_id: ServerId::new(id.to_string()).ok(),
                producer_id: None,
                identification_id: None,
                attributes: patch,
                pending: false,
            },
        };

        self.trigger.request_sync();
        Ok(updated)
    }

    /// Edits the parcel's entry inside its queued bulk create. Returns `false`
    /// when the batch moved on since it was read, so the caller re-reads.
    async fn rewrite_batch_entry(
        &self,
        user_id: &UserId,
        batch_id: &EntityId,
        local_id: &LocalId,
        patch: &Map<String, Value>,
    ) -> Result<bool, AppError> {
        let Some(batch) = self
            .queue
            .find_by_entity(user_id, &EntityType::parcel(), batch_id)
            .await?
        else {
            return Ok(false);
        };

        let payload = patched_payload(&batch, local_id, patch)?;
        Ok(self.queue.rewrite_payload(&batch, payload).await?.is_some())
    }

    /// Queues an update of a parcel the server already knows, keyed by its server id.
    async fn queue_update(
        &self,
        user_id: &UserId,
        id: &str,
        record: Option<&MirrorRecord>,
        patch: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let server_id = record
            .and_then(|record| record.server_id.as_ref())
            .map(|server_id| server_id.to_string())
            .unwrap_or_else(|| id.to_string());

        let mut body = patch.clone();
        body.insert(PARCEL_ID_FIELD.to_string(), Value::String(server_id.clone()));
        self.queue
            .enqueue(PendingOperationDraft::new(
                user_id.clone(),
                EntityType::parcel(),
                EntityId::new(server_id).map_err(AppError::InvalidInput)?,
                OperationKind::Update,
                OperationPayload::from_map(body),
            ))
            .await?;
        Ok(())
    }

    pub async fn get_parcel(&self, id: &str) -> Result<Loaded<Parcel>, AppError> {
        let api = self.api.clone();
        let fetch = move |token: AuthToken, parcel_id: String| async move {
            api.get_parcel(&token, &parcel_id).await
        };

        let loaded = self
            .read_path
            .load_one(&EntityType::parcel(), id, Some(PRODUCER_FIELD), fetch)
            .await?;
        Ok(loaded.map(Parcel::from))
    }

    pub async fn list_parcels(&self, producer_id: &str) -> Result<Loaded<Vec<Parcel>>, AppError> {
        let api = self.api.clone();
        let producer = producer_id.to_string();

        let loaded = self
            .read_path
            .load_list(&EntityType::parcel(), producer_id, move |token: AuthToken| async move {
                api.list_parcels(&token, &producer).await
            })
            .await?;
        Ok(loaded.map(|records| records.into_iter().map(Parcel::from).collect()))
    }

    /// Failure state of the parcel, narrowed to its own item for bulk submissions.
    pub async fn sync_issue(&self, id: &str) -> Result<Option<SyncIssue>, AppError> {
        let parcels = EntityType::parcel();
        let record = self.mirror.get(&parcels, id).await?;

        let Some(record) = record else {
            let entity_id = EntityId::new(id.to_string()).map_err(AppError::InvalidInput)?;
            return self.issues.get(&parcels, &entity_id).await;
        };

        if let (Some(batch_id), Some(local_id)) = (&record.pending_entity_id, &record.local_id) {
            let Some(mut issue) = self.issues.get(&parcels, batch_id).await? else {
                return Ok(None);
            };
            let index = match self.auth.current_user_id() {
                Some(user_id) => self
                    .queue
                    .find_by_entity(&user_id, &parcels, batch_id)
                    .await?
                    .and_then(|batch| batch_position(&batch, local_id)),
                None => None,
            };
            if let Some(index) = index {
                issue
                    .item_errors
                    .retain(|error| error.index.is_none() || error.index == Some(index));
            }
            return Ok(Some(issue));
        }

        let entity_id = match &record.server_id {
            Some(server_id) => EntityId::new(server_id.to_string()),
            None => EntityId::new(id.to_string()),
        }
        .map_err(AppError::InvalidInput)?;
        self.issues.get(&parcels, &entity_id).await
    }
}

fn batch_entries(batch: &PendingOperation) -> Result<&Vec<Value>, AppError> {
    batch
        .payload
        .get(PARCELS_FIELD)
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Internal(format!("Operation {} has no parcels", batch.id)))
}

fn entry_local_id(entry: &Value) -> Option<&str> {
    entry.get(LOCAL_ID_FIELD).and_then(Value::as_str)
}

fn batch_position(batch: &PendingOperation, local_id: &LocalId) -> Option<usize> {
    batch_entries(batch)
        .ok()?
        .iter()
        .position(|entry| entry_local_id(entry) == Some(local_id.as_str()))
}

/// The batch payload with `patch` merged into the entry of `local_id`.
fn patched_payload(
    batch: &PendingOperation,
    local_id: &LocalId,
    patch: &Map<String, Value>,
) -> Result<OperationPayload, AppError> {
    let mut entries = batch_entries(batch)?.clone();
    let entry = entries
        .iter_mut()
        .find(|entry| entry_local_id(entry) == Some(local_id.as_str()))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            AppError::NotFound(format!("Parcel {local_id} is not part of operation {}", batch.id))
        })?;
    entry.extend(patch.clone());

    let mut payload = batch.payload.as_object().clone();
    payload.insert(PARCELS_FIELD.to_string(), Value::Array(entries));
    Ok(OperationPayload::from_map(payload))
}

#[cfg(test)]
mod tests;
