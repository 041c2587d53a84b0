//! Error handling for entimap-store
//!
//! Connection and migration helpers return the core `ExError`; batch
//! application reports `StoreRejection`s classified from SQLite's extended
//! result codes.

use entimap_core::errors::{ExError, ExErrorKind};
use entimap_core::{RejectionKind, StoreRejection};
use rusqlite::ffi;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::ConstraintViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Turn a connection or schema error into a store rejection
pub fn unavailable(err: ExError) -> StoreRejection {
    StoreRejection::new(RejectionKind::Unavailable, err.to_string())
}

/// Classify a SQLite failure
pub fn classify(err: &rusqlite::Error) -> RejectionKind {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                RejectionKind::UniqueViolation
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => RejectionKind::ForeignKeyViolation,
            ffi::SQLITE_CONSTRAINT_NOTNULL => RejectionKind::NotNullViolation,
            _ => match failure.code {
                rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::CannotOpen
                | rusqlite::ErrorCode::ReadOnly
                | rusqlite::ErrorCode::DiskFull
                | rusqlite::ErrorCode::SystemIoFailure => RejectionKind::Unavailable,
                _ => RejectionKind::Other,
            },
        },
        _ => RejectionKind::Other,
    }
}

/// Create a store rejection from rusqlite::Error
pub fn rejection(err: rusqlite::Error) -> StoreRejection {
    StoreRejection::new(classify(&err), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn failing(sql: &str) -> rusqlite::Error {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE p (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             CREATE TABLE c (id INTEGER PRIMARY KEY, p_id INTEGER REFERENCES p (id));
             INSERT INTO p (id, name) VALUES (1, 'a');",
        )
        .unwrap();
        conn.execute_batch(sql).unwrap_err()
    }

    #[test]
    fn test_classify_constraint_failures() {
        assert_eq!(
            classify(&failing("INSERT INTO p (id, name) VALUES (2, 'a')")),
            RejectionKind::UniqueViolation
        );
        assert_eq!(
            classify(&failing("INSERT INTO p (id, name) VALUES (1, 'b')")),
            RejectionKind::UniqueViolation
        );
        assert_eq!(
            classify(&failing("INSERT INTO p (id, name) VALUES (3, NULL)")),
            RejectionKind::NotNullViolation
        );
        assert_eq!(
            classify(&failing("INSERT INTO c (id, p_id) VALUES (1, 9)")),
            RejectionKind::ForeignKeyViolation
        );
    }

    #[test]
    fn test_other_errors_are_not_constraints() {
        assert_eq!(
            classify(&failing("INSERT INTO missing VALUES (1)")),
            RejectionKind::Other
        );
    }
}
