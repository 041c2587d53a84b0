//! Backing store abstraction
//!
//! A session hands its staged changes to a [`BackingStore`] as one batch.
//! Stores report failures as a [`StoreRejection`] whose [`RejectionKind`]
//! classifies the cause; the session wraps it into `CommitFailure` without
//! losing it.

mod memory;

pub use memory::{MemoryConnector, MemoryStore};

use std::collections::BTreeMap;
use std::sync::Arc;

use entimap_core_types::Sensitive;
use thiserror::Error;

use crate::model::Value;
use crate::resolver::StorageShape;
use crate::session::{ChangeId, StagedChange};

/// Why a store refused an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    UniqueViolation,
    ForeignKeyViolation,
    NotNullViolation,
    /// The store could not produce a key value (e.g. byte key exhausted)
    KeyGenerationConflict,
    /// Update or delete matched no row
    RowNotFound,
    /// The batch may or may not have been applied; verify with a read
    OutcomeUnknown,
    /// Connection or schema setup failed
    Unavailable,
    Other,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::UniqueViolation => "unique_violation",
            RejectionKind::ForeignKeyViolation => "foreign_key_violation",
            RejectionKind::NotNullViolation => "not_null_violation",
            RejectionKind::KeyGenerationConflict => "key_generation_conflict",
            RejectionKind::RowNotFound => "row_not_found",
            RejectionKind::OutcomeUnknown => "outcome_unknown",
            RejectionKind::Unavailable => "unavailable",
            RejectionKind::Other => "other",
        }
    }
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a backing store
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct StoreRejection {
    pub kind: RejectionKind,
    pub message: String,
    /// The staged change being applied when the store refused, if known
    pub change_id: Option<ChangeId>,
}

impl StoreRejection {
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            change_id: None,
        }
    }

    pub fn with_change(mut self, change_id: ChangeId) -> Self {
        self.change_id = Some(change_id);
        self
    }

    /// A retry is only safe after a read confirms nothing was applied
    pub fn possibly_applied(&self) -> bool {
        self.kind == RejectionKind::OutcomeUnknown
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreRejection>;

/// Stored row, keyed by field name
pub type Row = BTreeMap<String, Value>;

/// Per-change result of a successful batch
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedRow {
    pub change_id: ChangeId,
    /// Key value assigned by the store, for inserts with a generated key
    pub generated_key: Option<Value>,
}

/// Storage engine behind a session
pub trait BackingStore: Send {
    /// Create whatever the given shapes need; must be idempotent
    ///
    /// # Errors
    ///
    /// `Unavailable` when the schema cannot be created.
    fn ensure_schema(&mut self, shapes: &[Arc<StorageShape>]) -> StoreResult<()>;

    /// Apply every change in order, all or nothing
    ///
    /// # Errors
    ///
    /// The first rejection; no change of the batch is visible afterwards
    /// unless the kind is `OutcomeUnknown`.
    fn apply_batch(&mut self, changes: &[StagedChange]) -> StoreResult<Vec<CommittedRow>>;

    /// Row with the given primary key values, in key order
    ///
    /// # Errors
    ///
    /// Read failures of the underlying store.
    fn find(&self, shape: &StorageShape, key: &[Value]) -> StoreResult<Option<Row>>;

    /// Rows whose `fields` equal `values` pairwise
    ///
    /// # Errors
    ///
    /// Read failures of the underlying store.
    fn find_by(
        &self,
        shape: &StorageShape,
        fields: &[String],
        values: &[Value],
    ) -> StoreResult<Vec<Row>>;
}

/// Opens backing stores for sessions
pub trait StoreConnector: Send + Sync {
    type Store: BackingStore;

    /// # Errors
    ///
    /// `Unavailable` when the store cannot be reached.
    fn connect(&self, descriptor: &ConnectionDescriptor) -> StoreResult<Self::Store>;
}

/// Called before each change of a batch is applied
///
/// A rejection aborts the batch exactly like a store-side failure, which
/// makes atomicity observable in tests.
pub trait ApplyHook: Send + Sync {
    /// # Errors
    ///
    /// A rejection aborts the batch.
    fn before_apply(&self, index: usize, change: &StagedChange) -> StoreResult<()>;
}

/// Rejects the batch once `applied` changes went through
#[derive(Debug, Clone)]
pub struct FailAfterHook {
    applied: usize,
    kind: RejectionKind,
}

impl FailAfterHook {
    pub fn new(applied: usize) -> Self {
        Self {
            applied,
            kind: RejectionKind::Other,
        }
    }

    pub fn with_kind(mut self, kind: RejectionKind) -> Self {
        self.kind = kind;
        self
    }
}

impl ApplyHook for FailAfterHook {
    fn before_apply(&self, index: usize, change: &StagedChange) -> StoreResult<()> {
        if index >= self.applied {
            return Err(StoreRejection::new(
                self.kind,
                format!("injected failure after {} applied changes", self.applied),
            )
            .with_change(change.id));
        }
        Ok(())
    }
}

/// Where a store lives: a file path, `:memory:`, or a DSN
///
/// Held as a capability: `Debug` never shows the value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDescriptor(Sensitive<String>);

impl ConnectionDescriptor {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(Sensitive::new(descriptor.into()))
    }

    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_is_redacted_in_debug() {
        let descriptor = ConnectionDescriptor::new("/var/lib/blog.db");
        let debug = format!("{:?}", descriptor);
        assert!(!debug.contains("blog.db"));
        assert_eq!(descriptor.expose(), "/var/lib/blog.db");
    }

    #[test]
    fn test_only_outcome_unknown_is_possibly_applied() {
        assert!(StoreRejection::new(RejectionKind::OutcomeUnknown, "commit").possibly_applied());
        assert!(!StoreRejection::new(RejectionKind::UniqueViolation, "dup").possibly_applied());
    }

    #[test]
    fn test_rejection_display_carries_kind() {
        let rejection = StoreRejection::new(RejectionKind::ForeignKeyViolation, "Post.BlogId");
        assert_eq!(rejection.to_string(), "foreign_key_violation: Post.BlogId");
    }
}
