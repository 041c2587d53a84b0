use std::path::Path;
use std::sync::Arc;

use entimap_core::{
    ConnectionDescriptor, EntityDefinition, EntityRegistry, FieldDefinition,
    PrimaryKeyDefinition, RelationDefinition, SessionFactory, Value,
};
use entimap_store::SqliteConnector;

#[allow(dead_code)]
pub fn category() -> EntityDefinition {
    EntityDefinition::builder("Category")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("Name").max_length(50))
        .build()
}

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
                .column_type("decimal(5,2)")
                .nullable(),
        )
        .in_schema("blogging")
        .has_many("Post")
        .build()
}

#[allow(dead_code)]
pub fn post() -> EntityDefinition {
    EntityDefinition::builder("Post")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("Title"))
        .to_table("Posts")
        .in_schema("blogging")
        .build()
}

#[allow(dead_code)]
pub fn author() -> EntityDefinition {
    EntityDefinition::builder("Author")
        .field(FieldDefinition::integer("Id"))
        .field(FieldDefinition::string("FirstName"))
        .field(FieldDefinition::string("LastName"))
        .field(FieldDefinition::string("DisplayName").computed("LastName || ', ' || FirstName"))
        .build()
}

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

#[allow(dead_code)]
pub fn car() -> EntityDefinition {
    EntityDefinition::builder("Car")
        .field(FieldDefinition::integer("CarId"))
        .field(FieldDefinition::string("LicensePlate").required())
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

/// Genre keyed by a one-byte generated key
#[allow(dead_code)]
pub fn genre() -> EntityDefinition {
    EntityDefinition::builder("Genre")
        .field(FieldDefinition::byte("Id"))
        .field(FieldDefinition::string("Label"))
        .key(PrimaryKeyDefinition::auto_increment("Id"))
        .build()
}

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

/// Session factory over a SQLite file at `path`
#[allow(dead_code)]
pub fn sqlite_factory(
    path: &Path,
    definitions: Vec<EntityDefinition>,
) -> SessionFactory<SqliteConnector> {
    sqlite_factory_with(path, definitions, SqliteConnector::new())
}

#[allow(dead_code)]
pub fn sqlite_factory_with(
    path: &Path,
    definitions: Vec<EntityDefinition>,
    connector: SqliteConnector,
) -> SessionFactory<SqliteConnector> {
    SessionFactory::new(
        sealed_registry(definitions),
        connector,
        ConnectionDescriptor::new(path.to_string_lossy().into_owned()),
    )
    .expect("test model should resolve")
}
