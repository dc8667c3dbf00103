use crate::application::ports::{
    AuthContext, MirrorStore, OperationQueue, SyncIssueStore, SyncTrigger,
};
use crate::application::sync::{
    issues, EntitySyncHandler, FailureClass, HandlerRegistry, ReplayMetadata, ReplayOutcome,
    RetryPolicy, SyncAck, SyncError, SyncMetrics, SyncMetricsSnapshot,
};
use crate::domain::entities::{HaltReason, PendingOperation, Settlement, SyncResult, SyncRun};
use crate::domain::value_objects::UserId;
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Default)]
struct DrainState {
    follow_up: bool,
}

/// Replays each user's queued operations in order, one drain per user at a time.
pub struct SyncService {
    queue: Arc<dyn OperationQueue>,
    issues: Arc<dyn SyncIssueStore>,
    mirror: Arc<dyn MirrorStore>,
    auth: Arc<dyn AuthContext>,
    handlers: Arc<HandlerRegistry>,
    policy: Arc<RetryPolicy>,
    drains: Arc<Mutex<HashMap<UserId, DrainState>>>,
    metrics: Arc<SyncMetrics>,
}

enum Step {
    Continue,
    Halt(HaltReason),
}

impl SyncService {
    pub fn new(
        queue: Arc<dyn OperationQueue>,
        issues: Arc<dyn SyncIssueStore>,
        mirror: Arc<dyn MirrorStore>,
        auth: Arc<dyn AuthContext>,
        handlers: HandlerRegistry,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            issues,
            mirror,
            auth,
            handlers: Arc::new(handlers),
            policy: Arc::new(policy),
            drains: Arc::new(Mutex::new(HashMap::new())),
            metrics: Arc::new(SyncMetrics::new()),
        }
    }

    /// Drains the signed-in user's queue once.
    pub async fn trigger_sync(&self) -> Result<SyncRun, AppError> {
        let Some(user_id) = self.auth.current_user_id() else {
            return Ok(SyncRun::NoSession);
        };

        {
            let mut drains = self.drains.lock().await;
            if let Some(state) = drains.get_mut(&user_id) {
                state.follow_up = true;
                tracing::debug!(
                    target: "agrisync::sync",
                    user_id = %user_id,
                    "drain already running; recorded follow-up"
                );
                return Ok(SyncRun::Deferred);
            }
            drains.insert(user_id.clone(), DrainState::default());
        }

        let mut total = SyncResult::default();
        loop {
            let pass = match self.drain(&user_id).await {
                Ok(pass) => pass,
                Err(err) => {
                    self.drains.lock().await.remove(&user_id);
                    tracing::error!(
                        target: "agrisync::sync",
                        user_id = %user_id,
                        error = %err,
                        "drain aborted"
                    );
                    return Err(err);
                }
            };
            total.absorb(pass);

            let mut drains = self.drains.lock().await;
            let follow_up = drains
                .get_mut(&user_id)
                .map(|state| std::mem::take(&mut state.follow_up))
                .unwrap_or(false);
            if total.halted.is_some() || !follow_up {
                drains.remove(&user_id);
                break;
            }
        }

        tracing::info!(
            target: "agrisync::sync",
            user_id = %user_id,
            synced = total.synced_count,
            retried = total.retried_count,
            failed = total.failed_count,
            pending = total.pending_count,
            halted = ?total.halted,
            "drain finished"
        );
        Ok(SyncRun::Completed(total))
    }

    async fn drain(&self, user_id: &UserId) -> Result<SyncResult, AppError> {
        let mut result = SyncResult::default();

        loop {
            if self.auth.current_user_id().as_ref() != Some(user_id) {
                result.halted = Some(HaltReason::SessionChanged);
                break;
            }

            let Some(operation) = self.queue.next_replayable(user_id).await? else {
                break;
            };

            let step = match self.handlers.get(&operation.entity_type) {
                Some(handler) => match handler.handle(&operation).await {
                    Ok(ack) => {
                        self.complete(handler.as_ref(), &operation, ack).await?;
                        result.synced_count += 1;
                        Step::Continue
                    }
                    Err(error) => self.fail(&operation, error, &mut result).await?,
                },
                None => {
                    let error = SyncError::NoHandler(operation.entity_type.to_string());
                    self.fail(&operation, error, &mut result).await?
                }
            };

            if let Step::Halt(reason) = step {
                result.halted = Some(reason);
                break;
            }
        }

        result.pending_count = self
            .queue
            .list_pending(user_id)
            .await?
            .iter()
            .filter(|operation| operation.is_replayable())
            .count() as u32;
        Ok(result)
    }

    async fn complete(
        &self,
        handler: &dyn EntitySyncHandler,
        operation: &PendingOperation,
        ack: SyncAck,
    ) -> Result<(), AppError> {
        // Mirror first: edits racing the settle below must already see server ids.
        self.apply_to_mirror(operation, &ack).await;
        if let Err(err) = self
            .issues
            .clear(&operation.entity_type, &operation.entity_id)
            .await
        {
            tracing::warn!(
                target: "agrisync::sync",
                entity_id = %operation.entity_id,
                error = %err,
                "failed to clear sync issue"
            );
        }
        self.settle(handler, operation, &ack).await?;

        self.metrics
            .record(ReplayOutcome::Synced, metadata(operation, None));

        tracing::debug!(
            target: "agrisync::sync",
            operation_id = %operation.id,
            entity_type = %operation.entity_type,
            operation = %operation.operation,
            "operation synced"
        );
        Ok(())
    }

    /// Removes the replayed revision from the queue. Edits that reached the
    /// entry in the meantime stay queued, or become follow-ups for a create.
    async fn settle(
        &self,
        handler: &dyn EntitySyncHandler,
        operation: &PendingOperation,
        ack: &SyncAck,
    ) -> Result<(), AppError> {
        let mut expected = operation.clone();
        let mut follow_ups = Vec::new();

        loop {
            match self.queue.settle(&expected, follow_ups).await? {
                Settlement::Settled => return Ok(()),
                Settlement::Changed(current) if operation.operation.is_create() => {
                    follow_ups = match handler.rebase(operation, Some(&current), ack) {
                        Ok(drafts) => drafts,
                        Err(error) => return self.reject_rebase(&current, error, true).await,
                    };
                    expected = current;
                }
                Settlement::Changed(current) => {
                    tracing::debug!(
                        target: "agrisync::sync",
                        operation_id = %current.id,
                        revision = current.revision,
                        "operation edited while in flight; replaying again"
                    );
                    return Ok(());
                }
                Settlement::Gone => {
                    if operation.operation.is_create() {
                        let drafts = match handler.rebase(operation, None, ack) {
                            Ok(drafts) => drafts,
                            Err(error) => {
                                return self.reject_rebase(operation, error, false).await;
                            }
                        };
                        for draft in drafts {
                            self.queue.enqueue(draft).await?;
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    async fn reject_rebase(
        &self,
        operation: &PendingOperation,
        error: SyncError,
        queued: bool,
    ) -> Result<(), AppError> {
        let message = error.to_string();
        tracing::warn!(
            target: "agrisync::sync",
            operation_id = %operation.id,
            error = %message,
            "edits made while in flight cannot follow the created records"
        );
        if queued {
            self.queue.mark_failed(&operation.id, &message).await?;
        }
        self.issues
            .record(issues::permanent_issue(operation, &error))
            .await?;
        Ok(())
    }

    async fn apply_to_mirror(&self, operation: &PendingOperation, ack: &SyncAck) {
        for confirmed in &ack.confirmed {
            if let Err(err) = self
                .mirror
                .confirm(
                    &operation.entity_type,
                    &confirmed.local_id,
                    &confirmed.server_id,
                    confirmed.data.clone(),
                )
                .await
            {
                tracing::warn!(
                    target: "agrisync::sync",
                    local_id = %confirmed.local_id,
                    server_id = %confirmed.server_id,
                    error = %err,
                    "failed to backfill server id into mirror"
                );
            }
        }
        for removed in &ack.removed {
            if let Err(err) = self.mirror.remove(&operation.entity_type, removed).await {
                tracing::warn!(
                    target: "agrisync::sync",
                    id = %removed,
                    error = %err,
                    "failed to drop mirror record"
                );
            }
        }
    }

    async fn fail(
        &self,
        operation: &PendingOperation,
        error: SyncError,
        result: &mut SyncResult,
    ) -> Result<Step, AppError> {
        let message = error.to_string();

        match self.policy.classify(&error) {
            FailureClass::Unauthenticated => {
                tracing::info!(
                    target: "agrisync::sync",
                    operation_id = %operation.id,
                    "not authenticated; leaving queue untouched"
                );
                Ok(Step::Halt(HaltReason::Unauthenticated))
            }
            FailureClass::Transient => {
                let retries = self.queue.increment_retry(&operation.id, &message).await?;
                if self.policy.is_exhausted(retries) {
                    self.queue.mark_failed(&operation.id, &message).await?;
                    self.issues
                        .record(issues::exhausted_issue(operation, &error))
                        .await?;
                    result.failed_count += 1;
                    self.metrics.record(
                        ReplayOutcome::Failed,
                        metadata(operation, Some((retries, message.as_str()))),
                    );
                    tracing::warn!(
                        target: "agrisync::sync",
                        operation_id = %operation.id,
                        retries,
                        error = %message,
                        "operation exhausted its retries"
                    );
                } else {
                    result.retried_count += 1;
                    self.metrics.record(
                        ReplayOutcome::Retried,
                        metadata(operation, Some((retries, message.as_str()))),
                    );
                    tracing::info!(
                        target: "agrisync::sync",
                        operation_id = %operation.id,
                        retries,
                        max_retries = self.policy.max_retries,
                        error = %message,
                        "transient failure; halting drain"
                    );
                }
                Ok(Step::Halt(HaltReason::TransientFailure))
            }
            FailureClass::Permanent => {
                self.queue.mark_failed(&operation.id, &message).await?;
                self.issues
                    .record(issues::permanent_issue(operation, &error))
                    .await?;
                result.failed_count += 1;
                self.metrics.record(
                    ReplayOutcome::Failed,
                    metadata(operation, Some((operation.retries, message.as_str()))),
                );
                tracing::warn!(
                    target: "agrisync::sync",
                    operation_id = %operation.id,
                    entity_type = %operation.entity_type,
                    entity_id = %operation.entity_id,
                    error = %message,
                    "operation rejected by server"
                );
                Ok(Step::Continue)
            }
        }
    }

    pub fn metrics(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether a drain is currently running for `user_id`.
    pub async fn is_draining(&self, user_id: &UserId) -> bool {
        self.drains.lock().await.contains_key(user_id)
    }

    pub fn schedule_sync(&self, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                if let Err(e) = service.trigger_sync().await {
                    tracing::error!(target: "agrisync::sync", "Scheduled sync error: {}", e);
                }
            }
        })
    }

    /// Triggers a drain every time connectivity goes from offline to online.
    pub fn watch_connectivity(
        &self,
        mut online: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            while online.changed().await.is_ok() {
                let is_online = *online.borrow_and_update();
                if is_online && !was_online {
                    tracing::info!(target: "agrisync::sync", "back online; draining queue");
                    if let Err(e) = service.trigger_sync().await {
                        tracing::error!(target: "agrisync::sync", "Reconnect sync error: {}", e);
                    }
                }
                was_online = is_online;
            }
        })
    }
}

impl SyncTrigger for SyncService {
    fn request_sync(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(target: "agrisync::sync", "no runtime; sync request dropped");
            return;
        };

        let service = self.clone();
        runtime.spawn(async move {
            if let Err(e) = service.trigger_sync().await {
                tracing::error!(target: "agrisync::sync", "Background sync error: {}", e);
            }
        });
    }
}

impl Clone for SyncService {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            issues: self.issues.clone(),
            mirror: self.mirror.clone(),
            auth: self.auth.clone(),
            handlers: self.handlers.clone(),
            policy: self.policy.clone(),
            drains: self.drains.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

fn metadata(operation: &PendingOperation, failure: Option<(u32, &str)>) -> ReplayMetadata {
    ReplayMetadata {
        operation_id: Some(operation.id.to_string()),
        entity_type: Some(operation.entity_type.to_string()),
        user_id: Some(operation.user_id.to_string()),
        retry_count: failure.map(|(retries, _)| retries),
        error: failure.map(|(_, error)| error.to_string()),
    }
}
