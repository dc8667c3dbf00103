use crate::application::ports::{AuthContext, Connectivity, MirrorStore};
use crate::application::sync::RemoteError;
use crate::domain::entities::{Loaded, MirrorRecord};
use crate::domain::value_objects::{AuthToken, EntityType, ServerId};
use crate::shared::error::AppError;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Remote-first reads that fall back to the local mirror.
#[derive(Clone)]
pub struct ReadPath {
    mirror: Arc<dyn MirrorStore>,
    connectivity: Arc<dyn Connectivity>,
    auth: Arc<dyn AuthContext>,
}

impl ReadPath {
    pub fn new(
        mirror: Arc<dyn MirrorStore>,
        connectivity: Arc<dyn Connectivity>,
        auth: Arc<dyn AuthContext>,
    ) -> Self {
        Self {
            mirror,
            connectivity,
            auth,
        }
    }

    fn remote_token(&self) -> Option<AuthToken> {
        if self.connectivity.is_online() {
            self.auth.auth_token()
        } else {
            None
        }
    }

    /// Loads one record. `fetch` receives the server id to request.
    pub async fn load_one<F, Fut>(
        &self,
        entity_type: &EntityType,
        id: &str,
        parent_field: Option<&str>,
        fetch: F,
    ) -> Result<Loaded<MirrorRecord>, AppError>
    where
        F: FnOnce(AuthToken, String) -> Fut,
        Fut: Future<Output = Result<Value, RemoteError>>,
    {
        let cached = self.mirror.get(entity_type, id).await?;

        // Not on the server yet: the mirror is the only copy.
        if let Some(record) = cached.as_ref().filter(|record| record.server_id.is_none()) {
            return Ok(Loaded::mirror(record.clone()));
        }

        if let Some(token) = self.remote_token() {
            let remote_id = cached
                .as_ref()
                .and_then(|record| record.server_id.as_ref())
                .map(ServerId::to_string)
                .unwrap_or_else(|| id.to_string());

            match fetch(token, remote_id.clone()).await {
                Ok(data) => {
                    let server_id = ServerId::from_record(&data)
                        .map(Ok)
                        .unwrap_or_else(|| ServerId::new(remote_id.clone()))
                        .map_err(AppError::DeserializationError)?;
                    let parent_id = parent_field.and_then(|field| scalar_string(&data[field]));
                    let record =
                        MirrorRecord::from_server(entity_type.clone(), server_id, parent_id, data);

                    self.mirror.upsert(record.clone()).await?;
                    let stored = self.mirror.get(entity_type, &remote_id).await?;
                    return Ok(Loaded::remote(stored.unwrap_or(record)));
                }
                Err(err) if err.is_transport() => {
                    tracing::info!(
                        target: "agrisync::repository",
                        entity_type = %entity_type,
                        id,
                        error = %err,
                        "remote read failed; serving mirror"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        cached.map(Loaded::mirror).ok_or_else(|| {
            AppError::UnavailableOffline(format!("{entity_type} {id} is not available offline"))
        })
    }

    /// Loads every record of a scope, refreshing the mirror when the server answers.
    pub async fn load_list<F, Fut>(
        &self,
        entity_type: &EntityType,
        parent_id: &str,
        fetch: F,
    ) -> Result<Loaded<Vec<MirrorRecord>>, AppError>
    where
        F: FnOnce(AuthToken) -> Fut,
        Fut: Future<Output = Result<Vec<Value>, RemoteError>>,
    {
        if let Some(token) = self.remote_token() {
            match fetch(token).await {
                Ok(items) => {
                    let records = items
                        .into_iter()
                        .filter_map(|data| {
                            let server_id = ServerId::from_record(&data)?;
                            Some(MirrorRecord::from_server(
                                entity_type.clone(),
                                server_id,
                                Some(parent_id.to_string()),
                                data,
                            ))
                        })
                        .collect();
                    self.mirror
                        .replace_scope(entity_type, Some(parent_id), records)
                        .await?;
                    let listed = self.mirror.list(entity_type, Some(parent_id)).await?;
                    return Ok(Loaded::remote(listed));
                }
                Err(err) if err.is_transport() => {
                    tracing::info!(
                        target: "agrisync::repository",
                        entity_type = %entity_type,
                        parent_id,
                        error = %err,
                        "remote list failed; serving mirror"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        let listed = self.mirror.list(entity_type, Some(parent_id)).await?;
        if listed.is_empty() {
            return Err(AppError::UnavailableOffline(format!(
                "{entity_type} list for {parent_id} is not available offline"
            )));
        }
        Ok(Loaded::mirror(listed))
    }
}

pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
