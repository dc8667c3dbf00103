use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOutcome {
    Synced,
    Retried,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub total_synced: u64,
    pub total_retried: u64,
    pub total_failed: u64,
    pub consecutive_failure: u64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
    pub last_outcome: Option<ReplayOutcome>,
    pub last_operation_id: Option<String>,
    pub last_entity_type: Option<String>,
    pub last_user_id: Option<String>,
    pub last_retry_count: Option<u32>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayMetadata {
    pub operation_id: Option<String>,
    pub entity_type: Option<String>,
    pub user_id: Option<String>,
    pub retry_count: Option<u32>,
    pub error: Option<String>,
}

#[derive(Default, Clone)]
struct LastReplay {
    outcome: Option<ReplayOutcome>,
    metadata: ReplayMetadata,
}

/// Replay counters owned by one sync service.
#[derive(Default)]
pub struct SyncMetrics {
    synced: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    consecutive_failure: AtomicU64,
    last_success_ms: AtomicU64,
    last_failure_ms: AtomicU64,
    last: Mutex<LastReplay>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: ReplayOutcome, metadata: ReplayMetadata) {
        match outcome {
            ReplayOutcome::Synced => {
                self.synced.fetch_add(1, Ordering::Relaxed);
                self.last_success_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.store(0, Ordering::Relaxed);
            }
            ReplayOutcome::Retried | ReplayOutcome::Failed => {
                let counter = if outcome == ReplayOutcome::Retried {
                    &self.retried
                } else {
                    &self.failed
                };
                counter.fetch_add(1, Ordering::Relaxed);
                self.last_failure_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Ok(mut guard) = self.last.lock() {
            guard.outcome = Some(outcome);
            guard.metadata = metadata;
        }
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let last = self
            .last
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        SyncMetricsSnapshot {
            total_synced: self.synced.load(Ordering::Relaxed),
            total_retried: self.retried.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
            consecutive_failure: self.consecutive_failure.load(Ordering::Relaxed),
            last_success_ms: to_option(self.last_success_ms.load(Ordering::Relaxed)),
            last_failure_ms: to_option(self.last_failure_ms.load(Ordering::Relaxed)),
            last_outcome: last.outcome,
            last_operation_id: last.metadata.operation_id,
            last_entity_type: last.metadata.entity_type,
            last_user_id: last.metadata.user_id,
            last_retry_count: last.metadata.retry_count,
            last_error: last.metadata.error,
        }
    }
}

fn to_option(value: u64) -> Option<u64> {
    if value == 0 { None } else { Some(value) }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
