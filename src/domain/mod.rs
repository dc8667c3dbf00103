pub mod entities;
pub mod value_objects;

pub use entities::{MirrorRecord, Parcel, PendingOperation, SyncIssue};
pub use value_objects::{EntityId, EntityType, OperationId, OperationKind, UserId};
