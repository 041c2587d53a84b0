//! Entity registry
//!
//! Holds every known `EntityDefinition`. The registry is filled during a
//! registration phase, then sealed; after sealing it is shared read-only
//! (typically behind an `Arc`) and needs no locking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::{MapError, Result};
use crate::model::{EntityDefinition, RelationDefinition};
use crate::resolver::TableName;

/// Registry of entity definitions
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<Arc<EntityDefinition>>,
    by_name: HashMap<String, usize>,
    default_schema: Option<String>,
    sealed: bool,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema applied to entities that do not name one
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Register an entity definition
    ///
    /// # Errors
    ///
    /// * `DuplicateEntity` - the name is already registered (the prior
    ///   definition is left untouched, sealed or not)
    /// * `RegistrySealed` - the registry no longer accepts definitions
    /// * `DuplicateField` / `ConflictingFieldConfig` - invalid field set
    /// * `InvalidRelation` - a relation does not involve this entity
    /// * `NameCollision` - another entity already maps to the same table
    pub fn register(&mut self, definition: EntityDefinition) -> Result<()> {
        if self.by_name.contains_key(&definition.name) {
            return Err(MapError::DuplicateEntity {
                entity: definition.name,
            });
        }

        if self.sealed {
            return Err(MapError::RegistrySealed {
                entity: definition.name,
            });
        }

        validate_fields(&definition)?;
        validate_relations(&definition)?;
        self.check_name_collision(&definition)?;

        tracing::debug!(
            entity = %definition.name,
            fields = definition.fields.len(),
            relations = definition.relations.len(),
            "entity registered"
        );

        self.by_name
            .insert(definition.name.clone(), self.entities.len());
        self.entities.push(Arc::new(definition));
        Ok(())
    }

    /// Freeze the registry; later `register` calls fail
    pub fn seal(&mut self) {
        if !self.sealed {
            tracing::debug!(entities = self.entities.len(), "registry sealed");
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Look up a definition by entity name
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if no entity has this name.
    pub fn lookup(&self, name: &str) -> Result<&Arc<EntityDefinition>> {
        self.by_name
            .get(name)
            .and_then(|idx| self.entities.get(*idx))
            .ok_or_else(|| MapError::UnknownEntity {
                entity: name.to_string(),
            })
    }

    /// Definitions in registration order
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDefinition>> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    /// Storage table for a definition, with the default schema applied
    pub fn table_for(&self, definition: &EntityDefinition) -> TableName {
        TableName {
            schema: definition
                .schema
                .clone()
                .or_else(|| self.default_schema.clone()),
            name: definition.table_name().to_string(),
        }
    }

    /// Every relation that involves `entity`, wherever it was declared
    ///
    /// A relation declared on both sides is reported once.
    pub fn relations_involving(&self, entity: &str) -> Vec<&RelationDefinition> {
        let mut seen = HashSet::new();
        self.entities
            .iter()
            .flat_map(|e| e.relations.iter())
            .filter(|r| r.involves(entity))
            .filter(|r| {
                seen.insert((
                    r.principal.as_str(),
                    r.dependent.as_str(),
                    r.navigation_name(),
                ))
            })
            .collect()
    }

    fn check_name_collision(&self, definition: &EntityDefinition) -> Result<()> {
        let table = definition.table_name();
        for existing in &self.entities {
            if !existing.table_name().eq_ignore_ascii_case(table) {
                continue;
            }
            let separated = match (&existing.schema, &definition.schema) {
                (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
                _ => false,
            };
            if !separated {
                return Err(MapError::NameCollision {
                    entity: definition.name.clone(),
                    existing: existing.name.clone(),
                    table: self.table_for(definition).qualified(),
                });
            }
        }
        Ok(())
    }
}

fn validate_fields(definition: &EntityDefinition) -> Result<()> {
    let mut names = HashSet::new();
    for field in &definition.fields {
        if !names.insert(field.name.to_ascii_lowercase()) {
            return Err(MapError::DuplicateField {
                entity: definition.name.clone(),
                field: field.name.clone(),
            });
        }
        if field.computed.is_some() && field.default.is_some() {
            return Err(MapError::ConflictingFieldConfig {
                entity: definition.name.clone(),
                field: field.name.clone(),
                reason: "computed expression and default value are mutually exclusive"
                    .to_string(),
            });
        }
    }
    Ok(())
}

fn validate_relations(definition: &EntityDefinition) -> Result<()> {
    for relation in &definition.relations {
        if !relation.involves(&definition.name) {
            return Err(MapError::InvalidRelation {
                entity: definition.name.clone(),
                reason: format!(
                    "relation {} -> {} does not involve the declaring entity",
                    relation.principal, relation.dependent
                ),
            });
        }
        if !relation.principal_key.is_empty()
            && !relation.foreign_key.is_empty()
            && relation.principal_key.len() != relation.foreign_key.len()
        {
            return Err(MapError::InvalidRelation {
                entity: definition.name.clone(),
                reason: format!(
                    "relation {} declares {} foreign key fields for {} principal key fields",
                    relation.navigation_name(),
                    relation.foreign_key.len(),
                    relation.principal_key.len()
                ),
            });
        }
    }
    Ok(())
}
