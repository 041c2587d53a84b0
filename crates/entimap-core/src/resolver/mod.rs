//! Mapping resolver
//!
//! Derives the storage shape of an entity from its declaration:
//!
//! 1. Unmapped fields are dropped, computed fields become read-only columns
//! 2. The primary key is the explicit key, or an integer field named `Id`
//!    (any case) as an auto-increment key; anything else is `NoPrimaryKey`
//! 3. Every relation where the entity is the dependent contributes a
//!    foreign key, explicit (type-checked against the principal key) or
//!    synthesized as `<Principal>Id`
//! 4. Composite key components must be non-nullable
//!
//! Resolution is pure. Shapes of registered definitions are cached once the
//! registry is sealed.

mod shape;

pub use shape::{ColumnShape, ForeignKeyShape, KeyShape, StorageShape, TableName};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::errors::{MapError, Result};
use crate::model::{
    EntityDefinition, FieldDefinition, FieldType, KeyGeneration, RelationDefinition, RelationKind,
};
use crate::registry::EntityRegistry;

/// Resolves entity definitions into storage shapes
#[derive(Debug)]
pub struct MappingResolver {
    registry: Arc<EntityRegistry>,
    cache: RwLock<HashMap<String, Arc<StorageShape>>>,
}

impl MappingResolver {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// Resolve one definition
    ///
    /// # Errors
    ///
    /// Any configuration error of the entity, its key or its relations:
    /// `NoPrimaryKey`, `KeyTypeMismatch`, `NullableKeyComponent`,
    /// `UnknownField`, `InvalidKeyGeneration`, `PrincipalKeyNotUnique`,
    /// `InvalidRelation` (unmapped field shadowing a foreign key),
    /// `UnknownEntity` (relation to an unregistered principal).
    pub fn resolve(&self, definition: &EntityDefinition) -> Result<Arc<StorageShape>> {
        let cacheable = self.registry.is_sealed()
            && self
                .registry
                .lookup(&definition.name)
                .map(|registered| std::ptr::eq(registered.as_ref(), definition))
                .unwrap_or(false);

        if cacheable {
            let cache = self.cache.read().map_err(|_| MapError::Internal {
                message: "resolver cache lock poisoned".to_string(),
            })?;
            if let Some(shape) = cache.get(&definition.name) {
                return Ok(shape.clone());
            }
        }

        let shape = Arc::new(resolve_shape(&self.registry, definition)?);
        tracing::debug!(
            entity = %shape.entity,
            table = %shape.table,
            columns = shape.columns.len(),
            foreign_keys = shape.foreign_keys.len(),
            "entity resolved"
        );

        if cacheable {
            let mut cache = self.cache.write().map_err(|_| MapError::Internal {
                message: "resolver cache lock poisoned".to_string(),
            })?;
            cache.insert(definition.name.clone(), shape.clone());
        }
        Ok(shape)
    }

    /// Resolve a registered entity by name
    ///
    /// # Errors
    ///
    /// `UnknownEntity`, or any error of [`MappingResolver::resolve`].
    pub fn resolve_name(&self, entity: &str) -> Result<Arc<StorageShape>> {
        let definition = self.registry.lookup(entity)?.clone();
        self.resolve(&definition)
    }

    /// Resolve every registered entity, in registration order
    ///
    /// # Errors
    ///
    /// The first configuration error encountered.
    pub fn resolve_all(&self) -> Result<Vec<Arc<StorageShape>>> {
        self.registry
            .entities()
            .map(|definition| self.resolve(definition))
            .collect()
    }
}

fn resolve_shape(registry: &EntityRegistry, definition: &EntityDefinition) -> Result<StorageShape> {
    let mut columns = Vec::new();
    let mut ignored_fields = Vec::new();
    for field in &definition.fields {
        if field.mapped {
            columns.push(column_from_field(field));
        } else {
            ignored_fields.push(field.name.clone());
        }
    }

    let primary_key = resolve_key(definition)?;
    for field in &primary_key.fields {
        if let Some(column) = columns.iter_mut().find(|c| &c.field == field) {
            column.nullable = false;
        }
    }

    let mut unique_constraints = Vec::new();
    for constraint in &definition.unique_constraints {
        for field in constraint {
            require_mapped(definition, field)?;
        }
        unique_constraints.push(constraint.clone());
    }

    let mut foreign_keys = Vec::new();
    for relation in dependent_relations(registry, definition) {
        let principal = if relation.principal == definition.name {
            definition
        } else {
            registry.lookup(&relation.principal)?.as_ref()
        };

        let principal_fields = resolve_principal_key(principal, &relation)?;
        let principal_types: Vec<FieldType> = principal_fields
            .iter()
            .map(|f| principal.mapped_field(f).map(|pf| pf.field_type))
            .collect::<Option<_>>()
            .ok_or_else(|| MapError::UnknownField {
                entity: principal.name.clone(),
                field: principal_fields.join(","),
            })?;

        let fields = if relation.foreign_key.is_empty() {
            synthesize_foreign_key(
                definition,
                &relation,
                &principal_fields,
                &principal_types,
                &mut columns,
            )?
        } else {
            check_explicit_foreign_key(definition, &relation, &principal_types)?;
            relation.foreign_key.clone()
        };

        if relation.kind == RelationKind::OneToOne && !unique_constraints.contains(&fields) {
            unique_constraints.push(fields.clone());
        }

        let principal_columns = principal_fields
            .iter()
            .filter_map(|f| principal.mapped_field(f).map(|pf| pf.column_name().to_string()))
            .collect();

        foreign_keys.push(ForeignKeyShape {
            kind: relation.kind,
            navigation: relation.navigation_name().to_string(),
            inverse_navigation: relation.inverse_name().to_string(),
            fields,
            principal_entity: principal.name.clone(),
            principal_table: registry.table_for(principal),
            principal_fields,
            principal_columns,
        });
    }

    Ok(StorageShape {
        entity: definition.name.clone(),
        table: registry.table_for(definition),
        columns,
        primary_key,
        foreign_keys,
        unique_constraints,
        ignored_fields,
        exclude_from_migrations: definition.exclude_from_migrations,
    })
}

fn column_from_field(field: &FieldDefinition) -> ColumnShape {
    ColumnShape {
        field: field.name.clone(),
        column: field.column_name().to_string(),
        field_type: field.field_type,
        nullable: field.nullable,
        max_length: field.max_length,
        default: field.default.clone(),
        computed: field.computed.clone(),
        store_type: field.column_type.clone(),
        comment: field.comment.clone(),
        synthesized: false,
    }
}

fn require_mapped<'a>(definition: &'a EntityDefinition, field: &str) -> Result<&'a FieldDefinition> {
    definition
        .mapped_field(field)
        .ok_or_else(|| MapError::UnknownField {
            entity: definition.name.clone(),
            field: field.to_string(),
        })
}

/// Primary key of a definition: explicit, inferred from `Id`, or an error
pub(crate) fn resolve_key(definition: &EntityDefinition) -> Result<KeyShape> {
    let key = match &definition.primary_key {
        Some(explicit) => {
            if explicit.fields.is_empty() {
                return Err(MapError::NoPrimaryKey {
                    entity: definition.name.clone(),
                });
            }
            for field in &explicit.fields {
                let declared = require_mapped(definition, field)?;
                if declared.is_read_only() {
                    return Err(MapError::InvalidKeyGeneration {
                        entity: definition.name.clone(),
                        reason: format!("computed field {} cannot be part of the key", field),
                    });
                }
            }
            if explicit.generation == KeyGeneration::AutoIncrement {
                if explicit.is_composite() {
                    return Err(MapError::InvalidKeyGeneration {
                        entity: definition.name.clone(),
                        reason: "auto-increment is only allowed on a single-field key"
                            .to_string(),
                    });
                }
                let field = require_mapped(definition, &explicit.fields[0])?;
                if !field.field_type.supports_auto_increment() {
                    return Err(MapError::InvalidKeyGeneration {
                        entity: definition.name.clone(),
                        reason: format!(
                            "auto-increment key {} must be integer or byte, not {}",
                            field.name,
                            field.field_type.as_str()
                        ),
                    });
                }
            }
            KeyShape {
                fields: explicit.fields.clone(),
                generation: explicit.generation,
            }
        }
        None => {
            let inferred = definition.fields.iter().find(|f| {
                f.mapped
                    && !f.is_read_only()
                    && f.name.eq_ignore_ascii_case("id")
                    && matches!(f.field_type, FieldType::Integer | FieldType::Byte)
            });
            match inferred {
                Some(field) => KeyShape {
                    fields: vec![field.name.clone()],
                    generation: KeyGeneration::AutoIncrement,
                },
                None => {
                    return Err(MapError::NoPrimaryKey {
                        entity: definition.name.clone(),
                    })
                }
            }
        }
    };

    if key.fields.len() > 1 {
        for field in &key.fields {
            let declared = require_mapped(definition, field)?;
            if declared.nullable {
                return Err(MapError::NullableKeyComponent {
                    entity: definition.name.clone(),
                    field: field.clone(),
                });
            }
        }
    }

    Ok(key)
}

/// Relations in which `definition` is the dependent, declared on either side
fn dependent_relations(
    registry: &EntityRegistry,
    definition: &EntityDefinition,
) -> Vec<RelationDefinition> {
    let mut seen = HashSet::new();
    definition
        .relations
        .iter()
        .chain(registry.relations_involving(&definition.name))
        .filter(|r| r.dependent == definition.name)
        .filter(|r| {
            seen.insert((
                r.principal.clone(),
                r.navigation_name().to_string(),
                r.inverse_name().to_string(),
            ))
        })
        .cloned()
        .collect()
}

fn resolve_principal_key(
    principal: &EntityDefinition,
    relation: &RelationDefinition,
) -> Result<Vec<String>> {
    let primary = resolve_key(principal)?;
    if relation.principal_key.is_empty() {
        return Ok(primary.fields);
    }

    for field in &relation.principal_key {
        require_mapped(principal, field)?;
    }

    let wanted: HashSet<&String> = relation.principal_key.iter().collect();
    let matches = |fields: &[String]| {
        fields.len() == wanted.len() && fields.iter().all(|f| wanted.contains(f))
    };
    let unique = matches(&primary.fields)
        || principal
            .unique_constraints
            .iter()
            .any(|constraint| matches(constraint));

    if !unique {
        return Err(MapError::PrincipalKeyNotUnique {
            entity: principal.name.clone(),
            relation: relation.navigation_name().to_string(),
            fields: relation.principal_key.clone(),
        });
    }
    Ok(relation.principal_key.clone())
}

fn check_explicit_foreign_key(
    dependent: &EntityDefinition,
    relation: &RelationDefinition,
    principal_types: &[FieldType],
) -> Result<()> {
    let mut foreign = Vec::with_capacity(relation.foreign_key.len());
    for field in &relation.foreign_key {
        foreign.push(require_mapped(dependent, field)?.field_type);
    }
    if foreign != principal_types {
        return Err(MapError::KeyTypeMismatch {
            entity: dependent.name.clone(),
            relation: relation.navigation_name().to_string(),
            foreign,
            principal: principal_types.to_vec(),
        });
    }
    Ok(())
}

fn synthesize_foreign_key(
    dependent: &EntityDefinition,
    relation: &RelationDefinition,
    principal_fields: &[String],
    principal_types: &[FieldType],
    columns: &mut Vec<ColumnShape>,
) -> Result<Vec<String>> {
    let names: Vec<String> = if principal_fields.len() == 1 {
        vec![format!("{}Id", relation.principal)]
    } else {
        principal_fields
            .iter()
            .map(|f| format!("{}{}", relation.principal, f))
            .collect()
    };

    let mut foreign = Vec::with_capacity(names.len());
    for (name, principal_type) in names.iter().zip(principal_types) {
        if dependent.field(name).map(|f| !f.mapped).unwrap_or(false) {
            return Err(MapError::InvalidRelation {
                entity: dependent.name.clone(),
                reason: format!(
                    "{} needs foreign key {}, which is declared but not mapped",
                    relation.navigation_name(),
                    name
                ),
            });
        }
        match columns.iter().find(|c| &c.field == name) {
            Some(existing) => foreign.push(existing.field_type),
            None => {
                columns.push(ColumnShape {
                    field: name.clone(),
                    column: name.clone(),
                    field_type: *principal_type,
                    nullable: true,
                    max_length: None,
                    default: None,
                    computed: None,
                    store_type: None,
                    comment: None,
                    synthesized: true,
                });
                foreign.push(*principal_type);
            }
        }
    }

    if foreign != principal_types {
        return Err(MapError::KeyTypeMismatch {
            entity: dependent.name.clone(),
            relation: relation.navigation_name().to_string(),
            foreign,
            principal: principal_types.to_vec(),
        });
    }
    Ok(names)
}
