pub mod auth_context;
pub mod connectivity;
pub mod mirror_store;
pub mod operation_queue;
pub mod remote_api;
pub mod sync_issue_store;
pub mod sync_trigger;

pub use auth_context::AuthContext;
pub use connectivity::Connectivity;
pub use mirror_store::MirrorStore;
pub use operation_queue::OperationQueue;
pub use remote_api::{ActorApi, ParcelApi};
pub use sync_issue_store::SyncIssueStore;
pub use sync_trigger::SyncTrigger;
