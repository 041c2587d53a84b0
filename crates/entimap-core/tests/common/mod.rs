use std::sync::Arc;

use entimap_core::{
    ConnectionDescriptor, DefaultValue, EntityDefinition, EntityRegistry, FieldDefinition,
    MemoryConnector, PrimaryKeyDefinition, RelationDefinition, SessionFactory, Value,
};

/// Category { Id: int (inferred auto key), Name: string(50) }
#[allow(dead_code)]
pub fn category() -> EntityDefinition {
    EntityDefinition::builder("Category")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("Name").max_length(50))
        .build()
}

/// Blog with one-to-many Posts, a renamed column and an ignored field
#[allow(dead_code)]
pub fn blog() -> EntityDefinition {
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
                .nullable()
                .comment("Rating the posts"),
        )
        .field(FieldDefinition::date_time("dateTime"))
        .ignore("dateTime")
        .has_many("Post")
        .build()
}

#[allow(dead_code)]
pub fn post() -> EntityDefinition {
    EntityDefinition::builder("Post")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("Title"))
        .field(FieldDefinition::string("Content"))
        .build()
}

/// Author with a computed DisplayName
#[allow(dead_code)]
pub fn author() -> EntityDefinition {
    EntityDefinition::builder("Author")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("FirstName"))
        .field(FieldDefinition::string("LastName"))
        .field(FieldDefinition::string("DisplayName").computed("LastName || ', ' || FirstName"))
        .build()
}

/// Book with an explicit key and literal/expression defaults
#[allow(dead_code)]
pub fn book() -> EntityDefinition {
    EntityDefinition::builder("Book")
        .field(FieldDefinition::integer("Bookkey"))
        .field(FieldDefinition::string("Title"))
        .field(FieldDefinition::integer("Rating").default_value(Value::Integer(2)))
        .field(FieldDefinition::date_time("PublishOn").default_sql("GETDATE()"))
        .key(PrimaryKeyDefinition::simple("Bookkey"))
        .build()
}

/// Car whose sales records reference the alternate key LicensePlate
#[allow(dead_code)]
pub fn car() -> EntityDefinition {
    EntityDefinition::builder("Car")
        .field(FieldDefinition::integer("CarId"))
        .field(FieldDefinition::string("Model"))
        .field(FieldDefinition::string("LicensePlate").required())
        .field(FieldDefinition::string("Status").required())
        .key(PrimaryKeyDefinition::auto_increment("CarId"))
        .unique(["LicensePlate"])
        .build()
}

#[allow(dead_code)]
pub fn record_of_sales() -> EntityDefinition {
    EntityDefinition::builder("RecordOfSales")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::decimal("Price"))
        .field(FieldDefinition::string("CarLicensePlate"))
        .relation(
            RelationDefinition::one_to_many("Car", "RecordOfSales")
                .named("RecordsOfSales")
                .with_inverse("Car")
                .with_foreign_key(["CarLicensePlate"])
                .with_principal_key(["LicensePlate"]),
        )
        .build()
}

/// Genre keyed by a generated byte
#[allow(dead_code)]
pub fn genre() -> EntityDefinition {
    EntityDefinition::builder("Genre")
        .field(FieldDefinition::byte("Id"))
        .field(FieldDefinition::string("Label"))
        .key(PrimaryKeyDefinition::auto_increment("Id"))
        .build()
}

/// Seal a registry holding the given definitions
#[allow(dead_code)]
pub fn sealed_registry(definitions: Vec<EntityDefinition>) -> Arc<EntityRegistry> {
    let mut registry = EntityRegistry::new();
    for definition in definitions {
        registry
            .register(definition)
            .expect("test definitions should register");
    }
    registry.seal();
    Arc::new(registry)
}

/// Session factory over a fresh in-memory store
#[allow(dead_code)]
pub fn memory_factory(definitions: Vec<EntityDefinition>) -> SessionFactory<MemoryConnector> {
    SessionFactory::new(
        sealed_registry(definitions),
        MemoryConnector::new(),
        ConnectionDescriptor::in_memory(),
    )
    .expect("test model should resolve")
}

#[allow(dead_code)]
pub fn is_expression_default(value: &Option<DefaultValue>) -> bool {
    matches!(value, Some(DefaultValue::Expression(_)))
}
