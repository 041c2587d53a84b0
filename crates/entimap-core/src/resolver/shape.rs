use serde::{Deserialize, Serialize};

use crate::model::{DefaultValue, FieldType, KeyGeneration, RelationKind};

/// Storage table, optionally schema-qualified
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    /// `schema.name`, or just `name` when unqualified
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

/// One stored column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnShape {
    pub field: String,
    pub column: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub max_length: Option<usize>,
    pub default: Option<DefaultValue>,
    pub computed: Option<String>,
    pub store_type: Option<String>,
    pub comment: Option<String>,
    /// Added by the resolver for a relation without an explicit foreign key
    pub synthesized: bool,
}

impl ColumnShape {
    pub fn read_only(&self) -> bool {
        self.computed.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyShape {
    pub fields: Vec<String>,
    pub generation: KeyGeneration,
}

impl KeyShape {
    pub fn is_generated(&self) -> bool {
        self.generation == KeyGeneration::AutoIncrement
    }
}

/// Foreign key held by the dependent entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyShape {
    pub kind: RelationKind,
    /// Navigation from the principal to this entity
    pub navigation: String,
    /// Navigation from this entity to the principal
    pub inverse_navigation: String,
    pub fields: Vec<String>,
    pub principal_entity: String,
    pub principal_table: TableName,
    pub principal_fields: Vec<String>,
    pub principal_columns: Vec<String>,
}

/// Resolved physical mapping of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageShape {
    pub entity: String,
    pub table: TableName,
    pub columns: Vec<ColumnShape>,
    pub primary_key: KeyShape,
    pub foreign_keys: Vec<ForeignKeyShape>,
    /// Field-name lists that must be unique (alternate keys and one-to-one
    /// foreign keys)
    pub unique_constraints: Vec<Vec<String>>,
    /// Declared fields kept out of storage
    pub ignored_fields: Vec<String>,
    pub exclude_from_migrations: bool,
}

impl StorageShape {
    pub fn column(&self, field: &str) -> Option<&ColumnShape> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Column names for a list of field names (unknown fields are skipped)
    pub fn column_names(&self, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .filter_map(|f| self.column(f).map(|c| c.column.clone()))
            .collect()
    }

    pub fn is_key_field(&self, field: &str) -> bool {
        self.primary_key.fields.iter().any(|f| f == field)
    }

    /// The single store-generated key field, if any
    pub fn generated_key_field(&self) -> Option<&str> {
        if self.primary_key.is_generated() {
            self.primary_key.fields.first().map(String::as_str)
        } else {
            None
        }
    }

    pub fn read_only_fields(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.read_only())
            .map(|c| c.field.as_str())
            .collect()
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignored_fields.iter().any(|f| f == field)
    }

    pub fn foreign_key_by_navigation(&self, navigation: &str) -> Option<&ForeignKeyShape> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.inverse_navigation == navigation)
    }
}
