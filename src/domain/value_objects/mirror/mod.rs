pub mod local_id;
pub mod server_id;

pub use local_id::LocalId;
pub use server_id::ServerId;
