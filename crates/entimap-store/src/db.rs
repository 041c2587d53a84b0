//! Database connection management

use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a lock held by another session
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Descriptor value selecting a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Open the database a connection descriptor names and configure it
pub fn open_descriptor(descriptor: &str) -> Result<Connection> {
    let conn = if descriptor == IN_MEMORY {
        open_in_memory()?
    } else {
        open(descriptor)?
    };
    configure(&conn, descriptor != IN_MEMORY)?;
    Ok(conn)
}

/// Enforce foreign keys and use WAL for file databases
pub fn configure(conn: &Connection, file_backed: bool) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(from_rusqlite)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(from_rusqlite)?;

    if file_backed {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(from_rusqlite)?;
    }

    Ok(())
}
