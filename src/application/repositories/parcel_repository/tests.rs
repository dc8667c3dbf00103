use super::*;
use crate::application::ports::Connectivity;
use crate::application::sync::RemoteError;
use crate::domain::entities::{DataSource, ItemError, SyncIssueKind};
use crate::domain::value_objects::OperationStatus;
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::mirror::SqliteMirrorStore;
use crate::infrastructure::offline::{SqliteOperationQueue, SqliteSyncIssueStore};
use crate::infrastructure::session::SessionStore;
use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

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

#[derive(Default)]
struct CountingTrigger(AtomicUsize);

impl SyncTrigger for CountingTrigger {
    fn request_sync(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Switch(AtomicBool);

impl Connectivity for Switch {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Fixture {
    repository: ParcelRepository,
    queue: Arc<SqliteOperationQueue>,
    mirror: Arc<SqliteMirrorStore>,
    issues: Arc<SqliteSyncIssueStore>,
    trigger: Arc<CountingTrigger>,
}

async fn fixture(api: MockApi, online: bool) -> Fixture {
    let pool = ConnectionPool::from_memory().await.unwrap();
    pool.migrate().await.unwrap();
    let queue = Arc::new(SqliteOperationQueue::new(pool.clone()));
    let mirror = Arc::new(SqliteMirrorStore::new(pool.clone()));
    let issues = Arc::new(SqliteSyncIssueStore::new(pool));
    let trigger = Arc::new(CountingTrigger::default());
    let session = Arc::new(SessionStore::new());
    session.sign_in(
        UserId::new("u1".into()).unwrap(),
        AuthToken::new("t0k".into()).unwrap(),
    );
    let connectivity = Arc::new(Switch(AtomicBool::new(online)));

    let read_path = ReadPath::new(mirror.clone(), connectivity, session.clone());
    let repository = ParcelRepository::new(
        queue.clone(),
        mirror.clone(),
        issues.clone(),
        session,
        trigger.clone(),
        Arc::new(api),
        read_path,
    );

    Fixture {
        repository,
        queue,
        mirror,
        issues,
        trigger,
    }
}

fn user() -> UserId {
    UserId::new("u1".into()).unwrap()
}

fn patch(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("patch must be an object"),
    }
}

#[tokio::test]
async fn create_parcels_queues_one_bulk_operation_offline() {
    let fx = fixture(MockApi::new(), false).await;

    let created = fx
        .repository
        .create_parcels(
            "42",
            vec![
                ParcelDraft::new("A-1").with_attribute("area", json!(2.5)),
                ParcelDraft::new("A-2"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|parcel| parcel.pending));
    assert_eq!(fx.trigger.0.load(Ordering::SeqCst), 1);

    let pending = fx.queue.list_pending(&user()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation, OperationKind::CreateBulk);
    assert_eq!(pending[0].payload.get_str("producerId"), Some("42"));
    let entries = pending[0].payload.get("parcels").unwrap().as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0]["localId"].as_str(),
        created[0].local_id.as_ref().map(LocalId::as_str)
    );

    let listed = fx.repository.list_parcels("42").await.unwrap();
    assert_eq!(listed.source, DataSource::Mirror);
    assert_eq!(listed.data.len(), 2);
}

#[tokio::test]
async fn double_edit_of_unsynced_parcel_leaves_one_operation() {
    let fx = fixture(MockApi::new(), false).await;
    let created = fx
        .repository
        .create_parcels("42", vec![ParcelDraft::new("A-1"), ParcelDraft::new("A-2")])
        .await
        .unwrap();
    let local_id = created[1].local_id.clone().unwrap();

    fx.repository
        .update_parcel(local_id.as_str(), patch(json!({"name": "first", "area": 1})))
        .await
        .unwrap();
    let updated = fx
        .repository
        .update_parcel(local_id.as_str(), patch(json!({"name": "second"})))
        .await
        .unwrap();

    assert_eq!(updated.attributes["name"], json!("second"));
    assert_eq!(updated.attributes["area"], json!(1));

    let pending = fx.queue.list_pending(&user()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation, OperationKind::CreateBulk);
    let entries = pending[0].payload.get("parcels").unwrap().as_array().unwrap();
    assert_eq!(entries[1]["name"], json!("second"));
    assert_eq!(entries[1]["area"], json!(1));
    assert_eq!(entries[0].get("name"), None);
    assert_eq!(pending[0].payload.get_str("producerId"), Some("42"));
}

#[tokio::test]
async fn edits_of_confirmed_parcel_coalesce_into_one_update() {
    let fx = fixture(MockApi::new(), false).await;
    fx.mirror
        .upsert(MirrorRecord::from_server(
            EntityType::parcel(),
            ServerId::new("101".into()).unwrap(),
            Some("42".into()),
            json!({"id": 101, "identificationId": "A-1"}),
        ))
        .await
        .unwrap();

    fx.repository
        .update_parcel("101", patch(json!({"name": "x"})))
        .await
        .unwrap();
    fx.repository
        .update_parcel("101", patch(json!({"name": "y", "parcelId": "ignored"})))
        .await
        .unwrap();

    let pending = fx.queue.list_pending(&user()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation, OperationKind::Update);
    assert_eq!(pending[0].entity_id.as_str(), "101");
    assert_eq!(
        pending[0].payload.to_json(),
        json!({"parcelId": "101", "name": "y"})
    );

    let loaded = fx.repository.get_parcel("101").await.unwrap();
    assert_eq!(loaded.source, DataSource::Mirror);
    assert_eq!(loaded.data.attributes["name"], json!("y"));
}

#[tokio::test]
async fn edit_rearms_a_failed_update() {
    let fx = fixture(MockApi::new(), false).await;
    fx.repository
        .update_parcel("101", patch(json!({"name": "x"})))
        .await
        .unwrap();
    let op = fx.queue.list_pending(&user()).await.unwrap().remove(0);
    fx.queue.mark_failed(&op.id, "rejected").await.unwrap();

    fx.repository
        .update_parcel("101", patch(json!({"name": "fixed"})))
        .await
        .unwrap();

    let rearmed = fx.queue.next_replayable(&user()).await.unwrap().unwrap();
    assert_eq!(rearmed.id, op.id);
    assert_eq!(rearmed.status, OperationStatus::Pending);
}

#[tokio::test]
async fn online_read_refreshes_mirror() {
    let mut api = MockApi::new();
    api.expect_get_parcel()
        .withf(|_, id| id == "101")
        .times(1)
        .returning(|_, _| Ok(json!({"id": 101, "producerId": 42, "identificationId": "A-1"})));
    let fx = fixture(api, true).await;

    let loaded = fx.repository.get_parcel("101").await.unwrap();

    assert_eq!(loaded.source, DataSource::Remote);
    assert_eq!(loaded.data.producer_id.as_deref(), Some("42"));
    let mirrored = fx.mirror.get(&EntityType::parcel(), "101").await.unwrap();
    assert!(mirrored.is_some());
}

#[tokio::test]
async fn transport_failure_falls_back_to_mirror() {
    let mut api = MockApi::new();
    api.expect_list_parcels().returning(|_, _| {
        Err(RemoteError::Transport {
            message: "timed out".into(),
            timeout: true,
        })
    });
    let fx = fixture(api, true).await;
    fx.mirror
        .upsert(MirrorRecord::from_server(
            EntityType::parcel(),
            ServerId::new("101".into()).unwrap(),
            Some("42".into()),
            json!({"id": 101}),
        ))
        .await
        .unwrap();

    let listed = fx.repository.list_parcels("42").await.unwrap();
    assert_eq!(listed.source, DataSource::Mirror);
    assert_eq!(listed.data.len(), 1);
}

#[tokio::test]
async fn offline_read_without_mirror_is_unavailable() {
    let fx = fixture(MockApi::new(), false).await;

    let result = fx.repository.get_parcel("404").await;
    assert!(matches!(result, Err(AppError::UnavailableOffline(_))));
}

#[tokio::test]
async fn sync_issue_is_narrowed_to_the_parcel_item() {
    let fx = fixture(MockApi::new(), false).await;
    let created = fx
        .repository
        .create_parcels("42", vec![ParcelDraft::new("DUP"), ParcelDraft::new("DUP")])
        .await
        .unwrap();
    let batch = fx.queue.list_pending(&user()).await.unwrap().remove(0);

    let issue = SyncIssue {
        entity_type: batch.entity_type.clone(),
        entity_id: batch.entity_id.clone(),
        user_id: user(),
        operation_id: batch.id.clone(),
        kind: SyncIssueKind::Conflict,
        code: None,
        message: "Validation failed".into(),
        item_errors: (0..2)
            .map(|index| ItemError {
                index: Some(index),
                field: format!("parcels.{index}.identificationId"),
                code: Some("unique".into()),
                message: "duplicate".into(),
            })
            .collect(),
        details: None,
        recorded_at: Utc::now(),
    };
    fx.issues.record(issue).await.unwrap();

    let second = created[1].local_id.clone().unwrap();
    let narrowed = fx
        .repository
        .sync_issue(second.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(narrowed.item_errors.len(), 1);
    assert_eq!(narrowed.item_errors[0].index, Some(1));
}

#[tokio::test]
async fn empty_batches_are_rejected() {
    let fx = fixture(MockApi::new(), false).await;

    let empty = fx.repository.create_parcels("42", Vec::new()).await;

    assert!(matches!(empty, Err(AppError::InvalidInput(_))));
    assert!(fx.queue.list_pending(&user()).await.unwrap().is_empty());
    assert_eq!(fx.trigger.0.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_edits_to_one_batch_keep_every_parcel() {
    for round in 0..20 {
        let fx = fixture(MockApi::new(), false).await;
        let created = fx
            .repository
            .create_parcels("42", vec![ParcelDraft::new("A-1"), ParcelDraft::new("A-2")])
            .await
            .unwrap();
        let repository = Arc::new(fx.repository);

        let edits: Vec<_> = created
            .iter()
            .enumerate()
            .map(|(index, parcel)| {
                let repository = repository.clone();
                let local_id = parcel.local_id.clone().unwrap();
                tokio::spawn(async move {
                    repository
                        .update_parcel(
                            local_id.as_str(),
                            patch(json!({"name": format!("edit {index}")})),
                        )
                        .await
                })
            })
            .collect();
        for edit in edits {
            edit.await.unwrap().unwrap();
        }

        let pending = fx.queue.list_pending(&user()).await.unwrap();
        assert_eq!(pending.len(), 1, "round {round}");
        assert_eq!(pending[0].payload.get_str("producerId"), Some("42"));
        let entries = pending[0].payload.get("parcels").unwrap().as_array().unwrap();
        assert_eq!(entries[0]["name"], json!("edit 0"), "round {round}");
        assert_eq!(entries[1]["name"], json!("edit 1"), "round {round}");
    }
}

#[tokio::test]
async fn edit_after_batch_settled_updates_the_server_record() {
    let fx = fixture(MockApi::new(), false).await;
    let created = fx
        .repository
        .create_parcels("42", vec![ParcelDraft::new("A-1")])
        .await
        .unwrap();
    let local_id = created[0].local_id.clone().unwrap();
    fx.mirror
        .confirm(
            &EntityType::parcel(),
            &local_id,
            &ServerId::new("101".into()).unwrap(),
            None,
        )
        .await
        .unwrap();
    let batch = fx.queue.list_pending(&user()).await.unwrap().remove(0);
    fx.queue.remove(&batch.id).await.unwrap();

    let updated = fx
        .repository
        .update_parcel(local_id.as_str(), patch(json!({"name": "after sync"})))
        .await
        .unwrap();

    assert_eq!(updated.server_id.unwrap().as_str(), "101");
    let pending = fx.queue.list_pending(&user()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation, OperationKind::Update);
    assert_eq!(
        pending[0].payload.to_json(),
        json!({"parcelId": "101", "name": "after sync"})
    );
}

#[tokio::test]
async fn edit_of_parcel_whose_batch_vanished_is_refused() {
    let fx = fixture(MockApi::new(), false).await;
    let created = fx
        .repository
        .create_parcels("42", vec![ParcelDraft::new("A-1")])
        .await
        .unwrap();
    let batch = fx.queue.list_pending(&user()).await.unwrap().remove(0);
    fx.queue.remove(&batch.id).await.unwrap();

    let local_id = created[0].local_id.clone().unwrap();
    let refused = fx
        .repository
        .update_parcel(local_id.as_str(), patch(json!({"name": "lost"})))
        .await;

    assert!(matches!(refused, Err(AppError::InvalidInput(_))));
    assert!(fx.queue.list_pending(&user()).await.unwrap().is_empty());
}
