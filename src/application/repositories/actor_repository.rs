use super::read_path::ReadPath;
use crate::application::ports::ActorApi;
use crate::domain::entities::Loaded;
use crate::domain::value_objects::{AuthToken, EntityType};
use crate::shared::error::AppError;
use serde_json::Value;
use std::sync::Arc;

/// Read-only access to actors and their supply-chain relations.
pub struct ActorRepository {
    api: Arc<dyn ActorApi>,
    read_path: ReadPath,
}

impl ActorRepository {
    pub fn new(api: Arc<dyn ActorApi>, read_path: ReadPath) -> Self {
        Self { api, read_path }
    }

    pub async fn get_actor(&self, actor_id: &str) -> Result<Loaded<Value>, AppError> {
        let api = self.api.clone();
        let loaded = self
            .read_path
            .load_one(
                &EntityType::actor(),
                actor_id,
                None,
                move |token: AuthToken, id: String| async move { api.get_actor(&token, &id).await },
            )
            .await?;
        Ok(loaded.map(|record| record.data))
    }

    pub async fn list_relations(&self, actor_id: &str) -> Result<Loaded<Vec<Value>>, AppError> {
        let api = self.api.clone();
        let actor = actor_id.to_string();
        let loaded = self
            .read_path
            .load_list(
                &EntityType::relation(),
                actor_id,
                move |token: AuthToken| async move { api.list_relations(&token, &actor).await },
            )
            .await?;
        Ok(loaded.map(|records| records.into_iter().map(|record| record.data).collect()))
    }
}
