//! The blog model served by the CLI

use std::sync::Arc;

use entimap_core::{EntityDefinition, EntityRegistry, FieldDefinition, MapError};

/// Category { Id: byte (inferred auto key), Name: string(50) }
fn category() -> EntityDefinition {
    EntityDefinition::builder("Category")
        .field(FieldDefinition::byte("Id"))
        .field(FieldDefinition::string("Name").max_length(50).required())
        .build()
}

fn blog() -> EntityDefinition {
    EntityDefinition::builder("Blog")
        .field(FieldDefinition::integer("Id"))
        .field(
            FieldDefinition::string("url")
                .column("Blogurl")
                .column_type("varchar(200)")
                .max_length(200)
                .required(),
        )
        .field(
            FieldDefinition::decimal("Rating")
                .column_type("decimal(5,2)")
                .nullable()
                .comment("Average rating of the posts"),
        )
        .field(FieldDefinition::date_time("CreatedOn").default_sql("CURRENT_TIMESTAMP"))
        .in_schema("blogging")
        .has_many("Post")
        .build()
}

fn post() -> EntityDefinition {
    EntityDefinition::builder("Post")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("Title").max_length(200).required())
        .field(FieldDefinition::string("Content"))
        .field(FieldDefinition::byte("CategoryId").nullable())
        .to_table("Posts")
        .in_schema("blogging")
        .belongs_to("Category")
        .build()
}

fn author() -> EntityDefinition {
    EntityDefinition::builder("Author")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("FirstName").required())
        .field(FieldDefinition::string("LastName").required())
        .field(
            FieldDefinition::string("DisplayName")
                .computed("\"LastName\" || ', ' || \"FirstName\""),
        )
        .build()
}

/// Register and seal every entity of the blog model
pub fn registry() -> Result<Arc<EntityRegistry>, MapError> {
    let mut registry = EntityRegistry::new();
    for definition in [category(), blog(), post(), author()] {
        registry.register(definition)?;
    }
    registry.seal();
    Ok(Arc::new(registry))
}
