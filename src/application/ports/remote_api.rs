use crate::application::sync::RemoteError;
use crate::domain::value_objects::AuthToken;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait ParcelApi: Send + Sync {
    /// Creates the parcels in one request; the response keeps submission order.
    async fn create_bulk(
        &self,
        token: &AuthToken,
        producer_id: &str,
        parcels: Vec<Value>,
    ) -> Result<Vec<Value>, RemoteError>;

    async fn update(
        &self,
        token: &AuthToken,
        parcel_id: &str,
        body: Value,
    ) -> Result<Value, RemoteError>;

    async fn get_parcel(&self, token: &AuthToken, parcel_id: &str) -> Result<Value, RemoteError>;

    async fn list_parcels(
        &self,
        token: &AuthToken,
        producer_id: &str,
    ) -> Result<Vec<Value>, RemoteError>;
}

#[async_trait]
pub trait ActorApi: Send + Sync {
    async fn get_actor(&self, token: &AuthToken, actor_id: &str) -> Result<Value, RemoteError>;

    async fn list_relations(
        &self,
        token: &AuthToken,
        actor_id: &str,
    ) -> Result<Vec<Value>, RemoteError>;
}
