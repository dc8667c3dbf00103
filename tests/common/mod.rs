#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agrisync::application::ports::{
    MirrorStore, OperationQueue, SyncIssueStore, SyncTrigger,
};
use agrisync::application::repositories::{ActorRepository, ParcelRepository, ReadPath};
use agrisync::application::services::SyncService;
use agrisync::application::sync::{HandlerRegistry, ParcelSyncHandler, RetryPolicy};
use agrisync::domain::value_objects::{AuthToken, UserId};
use agrisync::infrastructure::api::HttpRemoteApi;
use agrisync::infrastructure::database::ConnectionPool;
use agrisync::infrastructure::mirror::SqliteMirrorStore;
use agrisync::infrastructure::network::ConnectivityMonitor;
use agrisync::infrastructure::offline::{SqliteOperationQueue, SqliteSyncIssueStore};
use agrisync::infrastructure::session::SessionStore;
use axum::extract::{Json, Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde_json::{json, Value};

pub const TEST_USER: &str = "u1";
pub const TEST_TOKEN: &str = "t0k";
/// Nothing listens here; requests fail at the transport level.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Value,
}

#[derive(Default)]
pub struct StubInner {
    pub requests: Mutex<Vec<RecordedRequest>>,
    pub parcels: Mutex<Vec<Value>>,
    pub next_id: AtomicU64,
    pub fail_updates: AtomicBool,
    pub actor_delay_ms: AtomicU64,
}

#[derive(Clone, Default)]
pub struct StubState(pub Arc<StubInner>);

impl StubState {
    fn record(&self, method: &'static str, path: String, body: Value) {
        self.0
            .requests
            .lock()
            .expect("requests lock")
            .push(RecordedRequest { method, path, body });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.0.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_to(&self, suffix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path.ends_with(suffix))
            .collect()
    }
}

pub struct StubServer {
    pub base_url: String,
    pub state: StubState,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TEST_TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"code": "E_UNAUTHORIZED_ACCESS", "message": "Unauthorized access"})),
    )
        .into_response()
}

async fn create_bulk(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Path(producer_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    stub.record("POST", format!("/producers/{producer_id}/parcels/bulk"), body.clone());
    if !authorized(&headers) {
        return unauthorized();
    }

    let parcels = body["parcels"].as_array().cloned().unwrap_or_default();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for parcel in &parcels {
        if let Some(identification) = parcel["identificationId"].as_str() {
            *seen.entry(identification.to_string()).or_default() += 1;
        }
    }
    let errors: Vec<Value> = parcels
        .iter()
        .enumerate()
        .filter(|(_, parcel)| {
            parcel["identificationId"]
                .as_str()
                .is_some_and(|identification| seen.get(identification).copied().unwrap_or(0) > 1)
        })
        .map(|(index, _)| {
            json!({
                "field": format!("parcels.{index}.identificationId"),
                "rule": "unique",
                "message": "identificationId must be unique"
            })
        })
        .collect();
    if !errors.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "code": "E_VALIDATION_ERROR",
                "message": "Validation failed",
                "errors": errors
            })),
        )
            .into_response();
    }

    let mut created = Vec::with_capacity(parcels.len());
    for mut parcel in parcels {
        let id = 100 + stub.0.next_id.fetch_add(1, Ordering::SeqCst);
        if let Value::Object(fields) = &mut parcel {
            fields.insert("id".into(), json!(id));
            fields.insert("producerId".into(), json!(producer_id));
        }
        created.push(parcel);
    }
    stub.0
        .parcels
        .lock()
        .expect("parcels lock")
        .extend(created.iter().cloned());

    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

async fn update_parcel(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Path(parcel_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    stub.record("PUT", format!("/parcels/{parcel_id}"), body.clone());
    if !authorized(&headers) {
        return unauthorized();
    }
    if stub.0.fail_updates.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response();
    }

    let mut parcels = stub.0.parcels.lock().expect("parcels lock");
    let Some(parcel) = parcels
        .iter_mut()
        .find(|parcel| parcel["id"].to_string() == parcel_id)
    else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Parcel not found"})),
        )
            .into_response();
    };
    if let (Value::Object(fields), Value::Object(patch)) = (&mut *parcel, body) {
        fields.extend(patch);
    }
    Json(json!({ "data": parcel.clone() })).into_response()
}

async fn get_parcel(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Path(parcel_id): Path<String>,
) -> Response {
    stub.record("GET", format!("/parcels/{parcel_id}"), Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    let parcels = stub.0.parcels.lock().expect("parcels lock");
    match parcels
        .iter()
        .find(|parcel| parcel["id"].to_string() == parcel_id)
    {
        Some(parcel) => Json(parcel.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Parcel not found"})),
        )
            .into_response(),
    }
}

async fn list_parcels(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Path(producer_id): Path<String>,
) -> Response {
    stub.record("GET", format!("/producers/{producer_id}/parcels"), Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    let parcels: Vec<Value> = stub
        .0
        .parcels
        .lock()
        .expect("parcels lock")
        .iter()
        .filter(|parcel| parcel["producerId"].as_str() == Some(producer_id.as_str()))
        .cloned()
        .collect();
    Json(json!({ "data": parcels })).into_response()
}

async fn get_actor(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Path(actor_id): Path<String>,
) -> Response {
    stub.record("GET", format!("/actors/{actor_id}"), Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    let delay = stub.0.actor_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Json(json!({"id": actor_id, "name": "Cooperative Norte"})).into_response()
}

async fn list_relations(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Path(actor_id): Path<String>,
) -> Response {
    stub.record("GET", format!("/actors/{actor_id}/relations"), Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!([
        {"id": 1, "actorId": actor_id, "kind": "supplies"},
        {"id": 2, "actorId": actor_id, "kind": "buys_from"}
    ]))
    .into_response()
}

pub async fn spawn_stub() -> StubServer {
    let state = StubState::default();
    let router = Router::new()
        .route("/producers/{producer_id}/parcels/bulk", post(create_bulk))
        .route("/producers/{producer_id}/parcels", get(list_parcels))
        .route("/parcels/{parcel_id}", put(update_parcel).get(get_parcel))
        .route("/actors/{actor_id}", get(get_actor))
        .route("/actors/{actor_id}/relations", get(list_relations))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });

    StubServer {
        base_url: format!("http://{addr}"),
        state,
    }
}

/// Counts sync requests instead of draining, so tests drive the drain themselves.
#[derive(Default)]
pub struct ManualTrigger(pub AtomicUsize);

impl SyncTrigger for ManualTrigger {
    fn request_sync(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct TestClient {
    pub pool: ConnectionPool,
    pub session: Arc<SessionStore>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub api: Arc<HttpRemoteApi>,
    pub queue: Arc<dyn OperationQueue>,
    pub issues: Arc<dyn SyncIssueStore>,
    pub mirror: Arc<dyn MirrorStore>,
    pub sync: SyncService,
    pub parcels: ParcelRepository,
    pub actors: ActorRepository,
    pub manual_trigger: Arc<ManualTrigger>,
}

pub fn test_user() -> UserId {
    UserId::new(TEST_USER.into()).expect("user id")
}

pub fn http_api(base_url: &str, timeout: Duration) -> HttpRemoteApi {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("http client");
    HttpRemoteApi::with_client(base_url, client)
}

pub async fn setup_client(base_url: &str) -> TestClient {
    build_client(base_url, false).await
}

/// Repository writes trigger real background drains.
pub async fn setup_client_with_background_sync(base_url: &str) -> TestClient {
    build_client(base_url, true).await
}

async fn build_client(base_url: &str, background: bool) -> TestClient {
    let pool = ConnectionPool::from_memory().await.expect("in-memory sqlite");
    pool.migrate().await.expect("migrations");

    let session = Arc::new(SessionStore::new());
    session.sign_in(
        test_user(),
        AuthToken::new(TEST_TOKEN.into()).expect("token"),
    );
    let connectivity = Arc::new(ConnectivityMonitor::new(true));
    let api = Arc::new(http_api(base_url, Duration::from_secs(2)));

    let queue: Arc<dyn OperationQueue> = Arc::new(SqliteOperationQueue::new(pool.clone()));
    let issues: Arc<dyn SyncIssueStore> = Arc::new(SqliteSyncIssueStore::new(pool.clone()));
    let mirror: Arc<dyn MirrorStore> = Arc::new(SqliteMirrorStore::new(pool.clone()));

    let handlers = HandlerRegistry::new().with(Arc::new(ParcelSyncHandler::new(
        api.clone(),
        session.clone(),
    )));
    let sync = SyncService::new(
        queue.clone(),
        issues.clone(),
        mirror.clone(),
        session.clone(),
        handlers,
        RetryPolicy::default(),
    );

    let manual_trigger = Arc::new(ManualTrigger::default());
    let trigger: Arc<dyn SyncTrigger> = if background {
        Arc::new(sync.clone()) as Arc<dyn SyncTrigger>
    } else {
        manual_trigger.clone() as Arc<dyn SyncTrigger>
    };

    let read_path = ReadPath::new(mirror.clone(), connectivity.clone(), session.clone());
    let parcels = ParcelRepository::new(
        queue.clone(),
        mirror.clone(),
        issues.clone(),
        session.clone(),
        trigger,
        api.clone(),
        read_path.clone(),
    );
    let actors = ActorRepository::new(api.clone(), read_path);

    TestClient {
        pool,
        session,
        connectivity,
        api,
        queue,
        issues,
        mirror,
        sync,
        parcels,
        actors,
        manual_trigger,
    }
}
