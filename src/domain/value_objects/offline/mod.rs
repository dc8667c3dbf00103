pub mod auth_token;
pub mod entity_id;
pub mod entity_type;
pub mod operation_id;
pub mod operation_kind;
pub mod operation_status;
pub mod payload;
pub mod user_id;

pub use auth_token::AuthToken;
pub use entity_id::EntityId;
pub use entity_type::EntityType;
pub use operation_id::OperationId;
pub use operation_kind::OperationKind;
pub use operation_status::OperationStatus;
pub use payload::OperationPayload;
pub use user_id::UserId;
