pub mod entity;
pub mod field;
pub mod instance;
pub mod key;
pub mod relation;
pub mod value;

pub use entity::{EntityBuilder, EntityDefinition};
pub use field::{DefaultValue, FieldDefinition, FieldType};
pub use instance::EntityInstance;
pub use key::{KeyGeneration, PrimaryKeyDefinition};
pub use relation::{RelationDefinition, RelationKind};
pub use value::Value;
