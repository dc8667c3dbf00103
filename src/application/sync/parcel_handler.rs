use super::error::SyncError;
use super::handler::{ConfirmedRecord, EntitySyncHandler, SyncAck};
use crate::application::ports::{AuthContext, ParcelApi};
use crate::domain::entities::{PendingOperation, PendingOperationDraft};
use crate::domain::entities::parcel::{
    LOCAL_ID_FIELD, PARCELS_FIELD, PARCEL_ID_FIELD, PRODUCER_FIELD,
};
use crate::domain::value_objects::{
    AuthToken, EntityId, EntityType, LocalId, OperationKind, OperationPayload, ServerId,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ParcelSyncHandler {
    api: Arc<dyn ParcelApi>,
    auth: Arc<dyn AuthContext>,
}

impl ParcelSyncHandler {
    pub fn new(api: Arc<dyn ParcelApi>, auth: Arc<dyn AuthContext>) -> Self {
        Self { api, auth }
    }

    async fn create_bulk(
        &self,
        token: &AuthToken,
        operation: &PendingOperation,
    ) -> Result<SyncAck, SyncError> {
        let producer_id = operation
            .payload
            .get_str(PRODUCER_FIELD)
            .ok_or_else(|| SyncError::InvalidOperation("create_bulk without producerId".into()))?;
        let entries = operation
            .payload
            .get(PARCELS_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| SyncError::InvalidOperation("create_bulk without parcels".into()))?;

        let mut local_ids = Vec::with_capacity(entries.len());
        let mut parcels = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Object(fields) = entry else {
                return Err(SyncError::InvalidOperation(
                    "parcel entry is not an object".into(),
                ));
            };
            let mut fields = fields.clone();
            let local_id = fields
                .remove(LOCAL_ID_FIELD)
                .and_then(|value| value.as_str().map(str::to_string))
                .and_then(|value| LocalId::new(value).ok());
            local_ids.push(local_id);
            parcels.push(Value::Object(fields));
        }

        let created = self.api.create_bulk(token, producer_id, parcels).await?;
        if created.len() != local_ids.len() {
            tracing::warn!(
                target: "agrisync::sync",
                operation_id = %operation.id,
                submitted = local_ids.len(),
                returned = created.len(),
                "bulk create response does not match submission"
            );
        }

        let confirmed = local_ids
            .into_iter()
            .zip(created)
            .filter_map(|(local_id, record)| {
                let server_id = ServerId::from_record(&record)?;
                Some(ConfirmedRecord {
                    local_id: local_id?,
                    server_id,
                    data: Some(record),
                })
            })
            .collect();

        Ok(SyncAck {
            confirmed,
            removed: Vec::new(),
        })
    }

    async fn update(
        &self,
        token: &AuthToken,
        operation: &PendingOperation,
    ) -> Result<SyncAck, SyncError> {
        let mut body = operation.payload.as_object().clone();
        let parcel_id = match body.remove(PARCEL_ID_FIELD) {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => operation.entity_id.to_string(),
        };

        self.api
            .update(token, &parcel_id, Value::Object(body))
            .await?;
        Ok(SyncAck::default())
    }
}

fn bulk_entries(operation: &PendingOperation) -> impl Iterator<Item = &Map<String, Value>> {
    operation
        .payload
        .get(PARCELS_FIELD)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn entry_local_id(entry: &Map<String, Value>) -> Option<&str> {
    entry.get(LOCAL_ID_FIELD).and_then(Value::as_str)
}

fn parcel_update(
    operation: &PendingOperation,
    server_id: &ServerId,
    mut fields: Map<String, Value>,
) -> Result<PendingOperationDraft, SyncError> {
    fields.insert(PARCEL_ID_FIELD.to_string(), json!(server_id.as_str()));
    Ok(PendingOperationDraft::new(
        operation.user_id.clone(),
        operation.entity_type.clone(),
        EntityId::new(server_id.to_string()).map_err(SyncError::InvalidOperation)?,
        OperationKind::Update,
        OperationPayload::from_map(fields),
    ))
}

#[async_trait]
impl EntitySyncHandler for ParcelSyncHandler {
    fn entity_type(&self) -> EntityType {
        EntityType::parcel()
    }

    async fn handle(&self, operation: &PendingOperation) -> Result<SyncAck, SyncError> {
        let token = self.auth.auth_token().ok_or(SyncError::Unauthenticated)?;

        match operation.operation {
            OperationKind::CreateBulk => self.create_bulk(&token, operation).await,
            OperationKind::Update => self.update(&token, operation).await,
            other => Err(SyncError::UnsupportedOperation {
                entity_type: operation.entity_type.to_string(),
                operation: other.to_string(),
            }),
        }
    }

    /// Turns per-parcel edits made while a bulk create was in flight into
    /// updates keyed by the new server ids.
    fn rebase(
        &self,
        replayed: &PendingOperation,
        current: Option<&PendingOperation>,
        ack: &SyncAck,
    ) -> Result<Vec<PendingOperationDraft>, SyncError> {
        if replayed.operation != OperationKind::CreateBulk {
            return Err(SyncError::UnsupportedOperation {
                entity_type: replayed.entity_type.to_string(),
                operation: format!("rebase of {}", replayed.operation),
            });
        }

        let Some(current) = current else {
            tracing::warn!(
                target: "agrisync::sync",
                operation_id = %replayed.id,
                created = ack.confirmed.len(),
                "bulk create was withdrawn after the server accepted it"
            );
            return Ok(Vec::new());
        };

        let server_ids: HashMap<&str, &ServerId> = ack
            .confirmed
            .iter()
            .map(|record| (record.local_id.as_str(), &record.server_id))
            .collect();
        let sent: HashMap<&str, &Map<String, Value>> = bulk_entries(replayed)
            .filter_map(|entry| Some((entry_local_id(entry)?, entry)))
            .collect();

        let mut drafts = Vec::new();
        for entry in bulk_entries(current) {
            let local_id = entry_local_id(entry);
            let (Some(before), Some(server_id)) = (
                local_id.and_then(|id| sent.get(id)),
                local_id.and_then(|id| server_ids.get(id)),
            ) else {
                tracing::warn!(
                    target: "agrisync::sync",
                    operation_id = %current.id,
                    local_id = local_id.unwrap_or_default(),
                    "parcel edited in flight has no confirmed server id"
                );
                continue;
            };

            let changed: Map<String, Value> = entry
                .iter()
                .filter(|(key, value)| {
                    key.as_str() != LOCAL_ID_FIELD && before.get(key.as_str()) != Some(*value)
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            if !changed.is_empty() {
                drafts.push(parcel_update(current, server_id, changed)?);
            }
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sync::error::{ErrorEnvelope, RemoteError};
    use crate::domain::value_objects::{
        EntityId, OperationId, OperationPayload, OperationStatus, UserId,
    };
    use chrono::Utc;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Api {}

        #[async_trait]
        impl ParcelApi for Api {
            async fn create_bulk(&self, token: &AuthToken, producer_id: &str, parcels: Vec<Value>) -> Result<Vec<Value>, RemoteError>;
            async fn update(&self, token: &AuthToken, parcel_id: &str, body: Value) -> Result<Value, RemoteError>;
            async fn get_parcel(&self, token: &AuthToken, parcel_id: &str) -> Result<Value, RemoteError>;
            async fn list_parcels(&self, token: &AuthToken, producer_id: &str) -> Result<Vec<Value>, RemoteError>;
        }
    }

    struct Session(Option<&'static str>);

    impl AuthContext for Session {
        fn current_user_id(&self) -> Option<UserId> {
            self.0.map(|_| UserId::new("u1".into()).unwrap())
        }

        fn auth_token(&self) -> Option<AuthToken> {
            self.0.map(|token| AuthToken::new(token.into()).unwrap())
        }
    }

    fn operation(kind: OperationKind, entity_id: &str, payload: Value) -> PendingOperation {
        let now = Utc::now();
        PendingOperation {
            id: OperationId::generate(),
            sequence: 1,
            user_id: UserId::new("u1".into()).unwrap(),
            entity_type: EntityType::parcel(),
            entity_id: EntityId::new(entity_id.into()).unwrap(),
            operation: kind,
            payload: OperationPayload::new(payload).unwrap(),
            status: OperationStatus::Pending,
            retries: 0,
            last_error: None,
            revision: 0,
            created_at: now,
            timestamp: now,
        }
    }

    fn handler(api: MockApi, token: Option<&'static str>) -> ParcelSyncHandler {
        ParcelSyncHandler::new(Arc::new(api), Arc::new(Session(token)))
    }

    #[tokio::test]
    async fn create_bulk_strips_local_ids_and_maps_server_ids() {
        let mut api = MockApi::new();
        api.expect_create_bulk()
            .withf(|token, producer, parcels| {
                token.expose() == "t0k"
                    && producer == "42"
                    && parcels
                        == &vec![
                            json!({"identificationId": "A-1"}),
                            json!({"identificationId": "A-2"}),
                        ]
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    json!({"id": 101, "identificationId": "A-1"}),
                    json!({"id": 102, "identificationId": "A-2"}),
                ])
            });

        let op = operation(
            OperationKind::CreateBulk,
            "batch-1",
            json!({
                "producerId": "42",
                "parcels": [
                    {"localId": "l-1", "identificationId": "A-1"},
                    {"localId": "l-2", "identificationId": "A-2"}
                ]
            }),
        );

        let ack = handler(api, Some("t0k")).handle(&op).await.unwrap();

        assert_eq!(ack.confirmed.len(), 2);
        assert_eq!(ack.confirmed[0].local_id.as_str(), "l-1");
        assert_eq!(ack.confirmed[0].server_id.as_str(), "101");
        assert_eq!(ack.confirmed[1].server_id.as_str(), "102");
    }

    #[tokio::test]
    async fn update_sends_payload_without_route_id() {
        let mut api = MockApi::new();
        api.expect_update()
            .withf(|_, parcel_id, body| {
                parcel_id == "101" && body == &json!({"name": "North field"})
            })
            .times(1)
            .returning(|_, _, body| Ok(body));

        let op = operation(
            OperationKind::Update,
            "101",
            json!({"parcelId": "101", "name": "North field"}),
        );

        let ack = handler(api, Some("t0k")).handle(&op).await.unwrap();
        assert_eq!(ack, SyncAck::default());
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let api = MockApi::new();
        let op = operation(OperationKind::Update, "101", json!({"parcelId": "101"}));

        let result = handler(api, None).handle(&op).await;
        assert!(matches!(result, Err(SyncError::Unauthenticated)));
    }

    #[tokio::test]
    async fn other_verbs_are_unsupported() {
        let api = MockApi::new();
        let op = operation(OperationKind::Delete, "101", json!({"parcelId": "101"}));

        let result = handler(api, Some("t0k")).handle(&op).await;
        assert!(matches!(
            result,
            Err(SyncError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn server_errors_are_returned_unchanged() {
        let mut api = MockApi::new();
        api.expect_update().returning(|_, _, _| {
            Err(RemoteError::Status {
                status: 503,
                envelope: ErrorEnvelope::default(),
            })
        });
        let op = operation(OperationKind::Update, "101", json!({"parcelId": "101"}));

        let result = handler(api, Some("t0k")).handle(&op).await;
        assert!(matches!(
            result,
            Err(SyncError::Remote(RemoteError::Status { status: 503, .. }))
        ));
    }

    fn confirmed(local: &str, server: &str) -> ConfirmedRecord {
        ConfirmedRecord {
            local_id: LocalId::new(local.into()).unwrap(),
            server_id: ServerId::new(server.into()).unwrap(),
            data: None,
        }
    }

    fn batch(parcels: Value) -> PendingOperation {
        operation(
            OperationKind::CreateBulk,
            "batch-1",
            json!({"producerId": "42", "parcels": parcels}),
        )
    }

    #[test]
    fn rebase_turns_in_flight_edits_into_updates() {
        let replayed = batch(json!([
            {"localId": "l-1", "identificationId": "A-1", "crop": "maize"},
            {"localId": "l-2", "identificationId": "A-2"}
        ]));
        let mut current = batch(json!([
            {"localId": "l-1", "identificationId": "A-1", "crop": "coffee", "area": 2},
            {"localId": "l-2", "identificationId": "A-2"}
        ]));
        current.revision = 1;
        let ack = SyncAck {
            confirmed: vec![confirmed("l-1", "101"), confirmed("l-2", "102")],
            removed: Vec::new(),
        };

        let drafts = handler(MockApi::new(), Some("t0k"))
            .rebase(&replayed, Some(&current), &ack)
            .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].entity_id.as_str(), "101");
        assert_eq!(drafts[0].operation, OperationKind::Update);
        assert_eq!(
            drafts[0].payload.to_json(),
            json!({"parcelId": "101", "crop": "coffee", "area": 2})
        );
    }

    #[test]
    fn rebase_of_withdrawn_batch_has_no_follow_ups() {
        let replayed = batch(json!([{"localId": "l-1", "identificationId": "A-1"}]));
        let ack = SyncAck {
            confirmed: vec![confirmed("l-1", "101")],
            removed: Vec::new(),
        };

        let drafts = handler(MockApi::new(), Some("t0k"))
            .rebase(&replayed, None, &ack)
            .unwrap();

        assert!(drafts.is_empty());
    }

    #[test]
    fn rebase_is_only_defined_for_bulk_creates() {
        let replayed = operation(OperationKind::Update, "101", json!({"name": "x"}));
        let result = handler(MockApi::new(), Some("t0k")).rebase(&replayed, None, &SyncAck::default());
        assert!(matches!(result, Err(SyncError::UnsupportedOperation { .. })));
    }
}
