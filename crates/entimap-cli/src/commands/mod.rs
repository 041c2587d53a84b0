//! CLI commands

pub mod describe;
pub mod insert;
pub mod show;

use std::path::Path;

use entimap_core::{ConnectionDescriptor, SessionFactory};
use entimap_store::SqliteConnector;

use crate::model;

/// Session factory over the SQLite file at `db`, creating its directory
pub fn open_factory(
    db: &Path,
) -> Result<SessionFactory<SqliteConnector>, Box<dyn std::error::Error>> {
    if let Some(parent) = db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let descriptor = ConnectionDescriptor::new(db.to_string_lossy().into_owned());
    let factory = SessionFactory::new(model::registry()?, SqliteConnector::new(), descriptor)?;
    Ok(factory)
}
