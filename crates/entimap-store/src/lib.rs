//! entimap store - SQLite backing store
//!
//! Provides:
//! - Connection management (`db`)
//! - DDL generated from resolved storage shapes, applied through a
//!   checksummed `schema_version` ledger (`migrations`)
//! - `SqliteStore`, a `BackingStore` that applies each commit batch in one
//!   SQLite transaction (`repo`)

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use errors::Result;
pub use repo::{SqliteConnector, SqliteStore};
