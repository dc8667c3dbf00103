use crate::application::ports::{ActorApi, ParcelApi};
use crate::application::sync::{ErrorEnvelope, RemoteError};
use crate::domain::value_objects::AuthToken;
use crate::shared::config::ApiConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

/// JSON client for the supply-chain API.
#[derive(Clone)]
pub struct HttpRemoteApi {
    client: Client,
    base_url: String,
}

impl HttpRemoteApi {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_client(&config.base_url, client))
    }

    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder, token: &AuthToken) -> Result<Value, RemoteError> {
        let response = request.bearer_auth(token.expose()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(
                target: "agrisync::api",
                status = status.as_u16(),
                "request rejected"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                envelope: ErrorEnvelope::from_body(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Unwraps a `{"data": ...}` envelope when that is the only key.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn into_list(value: Value) -> Result<Vec<Value>, RemoteError> {
    match unwrap_data(value) {
        Value::Array(items) => Ok(items),
        other => Err(RemoteError::Decode(format!("expected a list, got {other}"))),
    }
}

#[async_trait]
impl ParcelApi for HttpRemoteApi {
    async fn create_bulk(
        &self,
        token: &AuthToken,
        producer_id: &str,
        parcels: Vec<Value>,
    ) -> Result<Vec<Value>, RemoteError> {
        let request = self
            .client
            .post(self.url(&format!("producers/{producer_id}/parcels/bulk")))
            .json(&json!({ "parcels": parcels }));
        into_list(self.send(request, token).await?)
    }

    async fn update(
        &self,
        token: &AuthToken,
        parcel_id: &str,
        body: Value,
    ) -> Result<Value, RemoteError> {
        let request = self
            .client
            .put(self.url(&format!("parcels/{parcel_id}")))
            .json(&body);
        Ok(unwrap_data(self.send(request, token).await?))
    }

    async fn get_parcel(&self, token: &AuthToken, parcel_id: &str) -> Result<Value, RemoteError> {
        let request = self.client.get(self.url(&format!("parcels/{parcel_id}")));
        Ok(unwrap_data(self.send(request, token).await?))
    }

    async fn list_parcels(
        &self,
        token: &AuthToken,
        producer_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let request = self
            .client
            .get(self.url(&format!("producers/{producer_id}/parcels")));
        into_list(self.send(request, token).await?)
    }
}

#[async_trait]
impl ActorApi for HttpRemoteApi {
    async fn get_actor(&self, token: &AuthToken, actor_id: &str) -> Result<Value, RemoteError> {
        let request = self.client.get(self.url(&format!("actors/{actor_id}")));
        Ok(unwrap_data(self.send(request, token).await?))
    }

    async fn list_relations(
        &self,
        token: &AuthToken,
        actor_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let request = self
            .client
            .get(self.url(&format!("actors/{actor_id}/relations")));
        into_list(self.send(request, token).await?)
    }
}
