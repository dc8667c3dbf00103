pub mod api;
pub mod database;
pub mod mirror;
pub mod network;
pub mod offline;
pub mod session;
