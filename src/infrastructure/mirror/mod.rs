pub mod mappers;
pub mod rows;
pub mod sqlite_mirror;

pub use sqlite_mirror::SqliteMirrorStore;
