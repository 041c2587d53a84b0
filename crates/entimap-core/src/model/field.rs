use serde::{Deserialize, Serialize};

use super::value::Value;

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Decimal,
    String,
    DateTime,
    Binary,
    Byte,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::String => "string",
            FieldType::DateTime => "date_time",
            FieldType::Binary => "binary",
            FieldType::Byte => "byte",
        }
    }

    /// Types a store can generate ascending key values for
    pub fn supports_auto_increment(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Byte)
    }
}

/// Value a store fills in when an insert omits the field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// A literal value
    Value(Value),
    /// A store-side SQL expression such as `CURRENT_TIMESTAMP`
    Expression(String),
}

/// Declaration of a single entity field
///
/// `String` and `Binary` fields start out nullable, every other type starts
/// out required; `nullable()` / `required()` override that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub max_length: Option<usize>,
    pub default: Option<DefaultValue>,
    /// `false` keeps the field in memory only
    pub mapped: bool,
    /// Store-side expression; makes the field read-only
    pub computed: Option<String>,
    pub column_name: Option<String>,
    /// Store type override, e.g. `varchar(200)` or `decimal(5,2)`
    pub column_type: Option<String>,
    pub comment: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: matches!(field_type, FieldType::String | FieldType::Binary),
            max_length: None,
            default: None,
            mapped: true,
            computed: None,
            column_name: None,
            column_type: None,
            comment: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Decimal)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Binary)
    }

    pub fn byte(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Byte)
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_sql(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Expression(expression.into()));
        self
    }

    pub fn computed(mut self, expression: impl Into<String>) -> Self {
        self.computed = Some(expression.into());
        self
    }

    pub fn not_mapped(mut self) -> Self {
        self.mapped = false;
        self
    }

    pub fn column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Storage column name (override or field name)
    pub fn column_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_read_only(&self) -> bool {
        self.computed.is_some()
    }
}
