pub mod error;
pub mod handler;
pub mod issues;
pub mod metrics;
pub mod parcel_handler;
pub mod policy;

pub use error::{ErrorEnvelope, FieldError, RemoteError, SyncError};
pub use handler::{ConfirmedRecord, EntitySyncHandler, HandlerRegistry, SyncAck};
pub use metrics::{ReplayMetadata, ReplayOutcome, SyncMetrics, SyncMetricsSnapshot};
pub use parcel_handler::ParcelSyncHandler;
pub use policy::{FailureClass, RetryPolicy};
