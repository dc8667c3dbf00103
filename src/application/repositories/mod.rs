pub mod actor_repository;
pub mod parcel_repository;
pub mod read_path;

pub use actor_repository::ActorRepository;
pub use parcel_repository::ParcelRepository;
pub use read_path::ReadPath;
