//! entimap core - entity registry, mapping resolver and persistence session
//!
//! This crate provides the declarative mapping layer:
//! - Entity, field, key and relation definitions built with `EntityBuilder`
//! - A sealed `EntityRegistry` holding every known entity
//! - `MappingResolver`, which derives a `StorageShape` (columns, keys,
//!   foreign keys, unique constraints) from definitions
//! - `Session`, a unit of work that validates, stages and atomically
//!   commits changes through a `BackingStore`
//! - An in-memory `MemoryStore` backing store
//! - Error and logging facilities shared with the store and CLI crates

pub mod backing;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod session;

#[doc(hidden)]
pub use entimap_core_types;

// Re-export commonly used types
pub use backing::{
    ApplyHook, BackingStore, ConnectionDescriptor, FailAfterHook, MemoryConnector, MemoryStore,
    RejectionKind, StoreConnector, StoreRejection,
};
pub use errors::{ExError, ExErrorKind, FieldViolation, MapError, Result, ViolationKind};
pub use model::{
    DefaultValue, EntityBuilder, EntityDefinition, EntityInstance, FieldDefinition, FieldType,
    KeyGeneration, PrimaryKeyDefinition, RelationDefinition, RelationKind, Value,
};
pub use registry::EntityRegistry;
pub use resolver::{MappingResolver, StorageShape};
pub use session::{
    ChangeId, ChangeOperation, CommitReceipt, LoadOptions, LoadedEntity, Session, SessionFactory,
    SessionState, StagedChange,
};
