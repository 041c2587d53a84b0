use serde::{Deserialize, Serialize};

use super::field::FieldDefinition;
use super::key::PrimaryKeyDefinition;
use super::relation::{RelationDefinition, RelationKind};

/// Declarative description of one entity
///
/// Built with [`EntityBuilder`] and handed to the registry, after which it
/// is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub primary_key: Option<PrimaryKeyDefinition>,
    pub relations: Vec<RelationDefinition>,
    /// Table name override (defaults to the entity name)
    pub table: Option<String>,
    /// Explicit schema qualifier
    pub schema: Option<String>,
    /// Alternate keys; each entry is an ordered list of field names
    pub unique_constraints: Vec<Vec<String>>,
    /// Table is managed outside of schema creation
    pub exclude_from_migrations: bool,
}

impl EntityDefinition {
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder::new(name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn mapped_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.field(name).filter(|f| f.mapped)
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }
}

/// Fluent builder for [`EntityDefinition`]
///
/// ```
/// use entimap_core::{EntityDefinition, FieldDefinition};
///
/// let blog = EntityDefinition::builder("Blog")
///     .field(FieldDefinition::integer("Id"))
///     .field(FieldDefinition::string("url").column("Blogurl").max_length(200))
///     .has_many("Post")
///     .build();
/// assert_eq!(blog.relations.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    definition: EntityDefinition,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: EntityDefinition {
                name: name.into(),
                fields: Vec::new(),
                primary_key: None,
                relations: Vec::new(),
                table: None,
                schema: None,
                unique_constraints: Vec::new(),
                exclude_from_migrations: false,
            },
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.definition.fields.push(field);
        self
    }

    pub fn key(mut self, key: PrimaryKeyDefinition) -> Self {
        self.definition.primary_key = Some(key);
        self
    }

    /// Mark a declared field as not mapped to storage
    pub fn ignore(mut self, field: &str) -> Self {
        if let Some(f) = self.definition.fields.iter_mut().find(|f| f.name == field) {
            f.mapped = false;
        }
        self
    }

    pub fn to_table(mut self, table: impl Into<String>) -> Self {
        self.definition.table = Some(table.into());
        self
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.definition.schema = Some(schema.into());
        self
    }

    pub fn unique<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition
            .unique_constraints
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude_from_migrations(mut self) -> Self {
        self.definition.exclude_from_migrations = true;
        self
    }

    pub fn relation(mut self, relation: RelationDefinition) -> Self {
        self.definition.relations.push(relation);
        self
    }

    /// One-to-many from this entity to `dependent` with a conventional key
    pub fn has_many(self, dependent: impl Into<String>) -> Self {
        let principal = self.definition.name.clone();
        self.relation(RelationDefinition::new(
            RelationKind::OneToMany,
            principal,
            dependent,
        ))
    }

    /// One-to-one from this entity to `dependent` with a conventional key
    pub fn has_one(self, dependent: impl Into<String>) -> Self {
        let principal = self.definition.name.clone();
        self.relation(RelationDefinition::new(
            RelationKind::OneToOne,
            principal,
            dependent,
        ))
    }

    /// Dependent-side declaration of a one-to-many relation
    pub fn belongs_to(self, principal: impl Into<String>) -> Self {
        let dependent = self.definition.name.clone();
        self.relation(RelationDefinition::new(
            RelationKind::OneToMany,
            principal,
            dependent,
        ))
    }

    pub fn build(self) -> EntityDefinition {
        self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_marks_field_unmapped() {
        let blog = EntityDefinition::builder("Blog")
            .field(FieldDefinition::integer("Id"))
            .field(FieldDefinition::date_time("dateTime"))
            .ignore("dateTime")
            .build();

        assert!(blog.mapped_field("dateTime").is_none());
        assert!(blog.field("dateTime").is_some());
    }

    #[test]
    fn test_relation_helpers_fill_in_declaring_entity() {
        let post = EntityDefinition::builder("Post0")
            .field(FieldDefinition::integer("Id"))
            .belongs_to("Blog0")
            .build();
        assert_eq!(post.relations[0].principal, "Blog0");
        assert_eq!(post.relations[0].dependent, "Post0");

        let blog = EntityDefinition::builder("Blog0").has_one("BlogImage").build();
        assert_eq!(blog.relations[0].kind, RelationKind::OneToOne);
        assert_eq!(blog.relations[0].principal, "Blog0");
    }

    #[test]
    fn test_table_name_defaults_to_entity_name() {
        let post = EntityDefinition::builder("Post").build();
        assert_eq!(post.table_name(), "Post");
        let post = EntityDefinition::builder("Post").to_table("Posts").build();
        assert_eq!(post.table_name(), "Posts");
    }
}
