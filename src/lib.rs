//! Offline-first write queue, synchronizer and local mirror for the
//! agricultural supply-chain client.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::repositories::{ActorRepository, ParcelRepository};
pub use application::services::SyncService;
pub use shared::{init_logging, AppConfig, AppError, Result};
pub use state::AppState;
