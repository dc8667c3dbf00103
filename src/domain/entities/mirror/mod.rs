pub mod mirror_record;

pub use mirror_record::{DataSource, Loaded, MirrorRecord};
