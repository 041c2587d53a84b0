use serde::{Deserialize, Serialize};

/// How primary key values are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyGeneration {
    /// The caller supplies every key value
    None,
    /// The store assigns ascending values on insert
    AutoIncrement,
}

/// Explicit primary key declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyDefinition {
    pub fields: Vec<String>,
    pub generation: KeyGeneration,
}

impl PrimaryKeyDefinition {
    /// Single-field key with caller-supplied values
    pub fn simple(field: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
            generation: KeyGeneration::None,
        }
    }

    /// Single-field key generated by the store
    pub fn auto_increment(field: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
            generation: KeyGeneration::AutoIncrement,
        }
    }

    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            generation: KeyGeneration::None,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }
}
