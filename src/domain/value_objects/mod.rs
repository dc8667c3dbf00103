pub mod mirror;
pub mod offline;

pub use mirror::{LocalId, ServerId};
pub use offline::{
    AuthToken, EntityId, EntityType, OperationId, OperationKind, OperationPayload,
    OperationStatus, UserId,
};
