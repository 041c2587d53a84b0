//! Schema creation
//!
//! Provides:
//! - DDL generated from resolved storage shapes
//! - A `schema_version` ledger with one checksummed entry per table
//! - Idempotent application

mod checksums;
pub(crate) mod ddl;
mod runner;

pub use checksums::compute_checksum;
pub use ddl::{create_table_sql, migrations_for, quote_ident, Migration};
pub use runner::{apply_migrations, applied_migrations};
