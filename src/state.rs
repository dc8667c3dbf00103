use crate::application::ports::{MirrorStore, OperationQueue, SyncIssueStore, SyncTrigger};
use crate::application::repositories::{ActorRepository, ParcelRepository, ReadPath};
use crate::application::services::SyncService;
use crate::application::sync::{HandlerRegistry, ParcelSyncHandler};
use crate::infrastructure::api::HttpRemoteApi;
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::mirror::SqliteMirrorStore;
use crate::infrastructure::network::ConnectivityMonitor;
use crate::infrastructure::offline::{SqliteOperationQueue, SqliteSyncIssueStore};
use crate::infrastructure::session::SessionStore;
use crate::shared::config::AppConfig;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything the client needs, wired once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub session: Arc<SessionStore>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub queue: Arc<dyn OperationQueue>,
    pub issues: Arc<dyn SyncIssueStore>,
    pub mirror: Arc<dyn MirrorStore>,
    pub sync_service: Arc<SyncService>,
    pub parcels: Arc<ParcelRepository>,
    pub actors: Arc<ActorRepository>,
    background: Vec<JoinHandle<()>>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(AppConfig::from_env()).await
    }

    pub async fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

        ensure_database_dir(&config.database.url)?;
        let pool = ConnectionPool::from_config(&config.database)
            .await
            .context("failed to open offline database")?;
        pool.migrate()
            .await
            .context("failed to migrate offline database")?;

        let session = Arc::new(SessionStore::new());
        let connectivity = Arc::new(ConnectivityMonitor::new(true));
        let api = Arc::new(HttpRemoteApi::new(&config.api)?);

        let queue: Arc<dyn OperationQueue> = Arc::new(SqliteOperationQueue::new(pool.clone()));
        let issues: Arc<dyn SyncIssueStore> = Arc::new(SqliteSyncIssueStore::new(pool.clone()));
        let mirror: Arc<dyn MirrorStore> = Arc::new(SqliteMirrorStore::new(pool.clone()));

        let handlers = HandlerRegistry::new().with(Arc::new(ParcelSyncHandler::new(
            api.clone(),
            session.clone(),
        )));
        let sync_service = Arc::new(SyncService::new(
            queue.clone(),
            issues.clone(),
            mirror.clone(),
            session.clone(),
            handlers,
            config.sync.retry_policy(),
        ));

        let read_path = ReadPath::new(mirror.clone(), connectivity.clone(), session.clone());
        let trigger: Arc<dyn SyncTrigger> = sync_service.clone();
        let parcels = Arc::new(ParcelRepository::new(
            queue.clone(),
            mirror.clone(),
            issues.clone(),
            session.clone(),
            trigger,
            api.clone(),
            read_path.clone(),
        ));
        let actors = Arc::new(ActorRepository::new(api, read_path));

        let mut background = Vec::new();
        if config.sync.auto_sync {
            background.push(sync_service.schedule_sync(config.sync.sync_interval));
            background.push(sync_service.watch_connectivity(connectivity.subscribe()));
        }

        tracing::info!(
            target: "agrisync::state",
            api = %config.api.base_url,
            auto_sync = config.sync.auto_sync,
            max_retry = config.sync.max_retry,
            "offline sync initialised"
        );

        Ok(Self {
            config,
            pool,
            session,
            connectivity,
            queue,
            issues,
            mirror,
            sync_service,
            parcels,
            actors,
            background,
        })
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        for handle in &self.background {
            handle.abort();
        }
    }
}

fn ensure_database_dir(url: &str) -> anyhow::Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
