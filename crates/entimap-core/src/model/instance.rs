use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// In-memory instance of an entity: the unit that sessions stage and reads
/// return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInstance {
    entity: String,
    values: BTreeMap<String, Value>,
}

impl EntityInstance {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: BTreeMap::new(),
        }
    }

    pub(crate) fn from_values(entity: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Self {
            entity: entity.into(),
            values,
        }
    }

    /// Builder-style setter
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}
