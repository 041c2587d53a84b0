//! SQLite-backed persistence for resolved storage shapes

pub mod codec;
mod sqlite_repo;

pub use sqlite_repo::{SqliteConnector, SqliteStore};
