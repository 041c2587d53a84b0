use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{EntityInstance, Value};
use crate::resolver::StorageShape;

/// Position of a staged change within its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeId(u64);

impl ChangeId {
    pub(crate) fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn seq(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "change-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated change waiting for commit
///
/// `values` holds only storable fields: ignored fields are dropped, an
/// unassigned generated key is left out on insert, and a delete carries
/// just the key.
#[derive(Debug, Clone)]
pub struct StagedChange {
    pub id: ChangeId,
    pub operation: ChangeOperation,
    pub shape: Arc<StorageShape>,
    pub values: BTreeMap<String, Value>,
    instance: EntityInstance,
}

impl StagedChange {
    pub(crate) fn new(
        id: ChangeId,
        operation: ChangeOperation,
        shape: Arc<StorageShape>,
        values: BTreeMap<String, Value>,
        instance: EntityInstance,
    ) -> Self {
        Self {
            id,
            operation,
            shape,
            values,
            instance,
        }
    }

    pub fn entity(&self) -> &str {
        &self.shape.entity
    }

    /// The instance as the caller staged it
    pub fn instance(&self) -> &EntityInstance {
        &self.instance
    }

    pub(crate) fn into_instance(self) -> EntityInstance {
        self.instance
    }

    /// Primary key values in key order; absent components are Null
    pub fn key_values(&self) -> Vec<Value> {
        self.shape
            .primary_key
            .fields
            .iter()
            .map(|f| self.values.get(f).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
