//! DDL generation from storage shapes

use std::sync::Arc;

use entimap_core::resolver::{ColumnShape, StorageShape};
use entimap_core::{DefaultValue, FieldType, Value};

use crate::repo::codec;

/// One schema step recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: String,
    pub sql: String,
}

/// One `create:<table>` migration per shape, skipping excluded tables
pub fn migrations_for(shapes: &[Arc<StorageShape>]) -> Vec<Migration> {
    shapes
        .iter()
        .filter(|shape| !shape.exclude_from_migrations)
        .map(|shape| Migration {
            id: format!("create:{}", shape.table.qualified()),
            sql: create_table_sql(shape),
        })
        .collect()
}

/// Double-quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` statement for a shape
///
/// A schema-qualified table becomes one identifier (`"schema.table"`),
/// SQLite having no schemas inside a single database file.
pub fn create_table_sql(shape: &StorageShape) -> String {
    let inline_key = shape.generated_key_field();
    let mut lines = Vec::new();

    for column in &shape.columns {
        let mut line = String::new();
        if let Some(comment) = &column.comment {
            for part in comment.lines() {
                line.push_str(&format!("    -- {}\n", part));
            }
        }
        line.push_str("    ");
        line.push_str(&column_sql(column, inline_key == Some(column.field.as_str())));
        lines.push(line);
    }

    if inline_key.is_none() {
        lines.push(format!(
            "    PRIMARY KEY ({})",
            quoted_list(&shape.column_names(&shape.primary_key.fields))
        ));
    }

    for constraint in &shape.unique_constraints {
        lines.push(format!(
            "    UNIQUE ({})",
            quoted_list(&shape.column_names(constraint))
        ));
    }

    for fk in &shape.foreign_keys {
        lines.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {} ({})",
            quoted_list(&shape.column_names(&fk.fields)),
            quote_ident(&fk.principal_table.qualified()),
            quoted_list(&fk.principal_columns)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        quote_ident(&shape.table.qualified()),
        lines.join(",\n")
    )
}

fn column_sql(column: &ColumnShape, auto_key: bool) -> String {
    let name = quote_ident(&column.column);

    if auto_key {
        let mut sql = format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name);
        if column.field_type == FieldType::Byte {
            sql.push_str(&byte_check(column));
        }
        return sql;
    }

    let mut sql = format!("{} {}", name, declared_type(column));

    if let Some(expr) = &column.computed {
        sql.push_str(&format!(" GENERATED ALWAYS AS ({}) VIRTUAL", expr));
        return sql;
    }

    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", default_sql(default)));
    }
    if let Some(max) = column.max_length {
        if matches!(column.field_type, FieldType::String | FieldType::Binary) {
            sql.push_str(&format!(" CHECK (length({}) <= {})", name, max));
        }
    }
    if column.field_type == FieldType::Byte {
        sql.push_str(&byte_check(column));
    }
    sql
}

fn byte_check(column: &ColumnShape) -> String {
    format!(
        " CONSTRAINT {} CHECK ({} BETWEEN 0 AND 255)",
        quote_ident(&byte_check_name(&column.column)),
        quote_ident(&column.column)
    )
}

/// Name of the range check on a byte column
pub(crate) fn byte_check_name(column: &str) -> String {
    format!("{}_byte_range", column)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

/// SQLite's type-affinity rules for a declared column type
fn affinity(declared: &str) -> Affinity {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("INT") {
        Affinity::Integer
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        Affinity::Text
    } else if upper.contains("BLOB") || upper.trim().is_empty() {
        Affinity::Blob
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

fn canonical_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer | FieldType::Byte => "INTEGER",
        FieldType::Decimal | FieldType::String | FieldType::DateTime => "TEXT",
        FieldType::Binary => "BLOB",
    }
}

/// The store-type override when it keeps the affinity the codec relies on
///
/// `decimal(5,2)` would give NUMERIC affinity and turn decimal text into
/// floating point, so such overrides fall back to the canonical type.
fn declared_type(column: &ColumnShape) -> String {
    let canonical = canonical_type(column.field_type);
    match &column.store_type {
        Some(store_type) if affinity(store_type) == affinity(canonical) => store_type.clone(),
        _ => canonical.to_string(),
    }
}

fn default_sql(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Value(value) => literal(value),
        DefaultValue::Expression(expr) => {
            let normalized = expr.trim().to_ascii_uppercase();
            match normalized.as_str() {
                "CURRENT_TIMESTAMP" | "GETDATE()" | "NOW()" => "CURRENT_TIMESTAMP".to_string(),
                _ => format!("({})", expr),
            }
        }
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Byte(v) => v.to_string(),
        Value::Decimal(v) => quote_text(&v.to_string()),
        Value::String(v) => quote_text(v),
        Value::DateTime(v) => quote_text(&codec::format_date_time(v)),
        Value::Binary(v) => format!("X'{}'", hex::encode(v)),
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use entimap_core::{EntityDefinition, EntityRegistry, FieldDefinition, MappingResolver};

    fn shape_of(definitions: Vec<EntityDefinition>, entity: &str) -> Arc<StorageShape> {
        let mut registry = EntityRegistry::new();
        for d in definitions {
            registry.register(d).unwrap();
        }
        registry.seal();
        MappingResolver::new(Arc::new(registry))
            .resolve_name(entity)
            .unwrap()
    }

    #[test]
    fn test_category_ddl() {
        let shape = shape_of(
            vec![EntityDefinition::builder("Category")
                .field(FieldDefinition::integer("Id"))
                .field(FieldDefinition::string("Name").max_length(50))
                .build()],
            "Category",
        );

        assert_eq!(
            create_table_sql(&shape),
            "CREATE TABLE IF NOT EXISTS \"Category\" (\n    \"Id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n    \"Name\" TEXT CHECK (length(\"Name\") <= 50)\n);"
        );
    }

    #[test]
    fn test_numeric_store_type_falls_back_to_text() {
        let shape = shape_of(
            vec![EntityDefinition::builder("Blog")
                .field(FieldDefinition::integer("Id"))
                .field(FieldDefinition::string("url").column("Blogurl").column_type("varchar(200)"))
                .field(FieldDefinition::decimal("Rating").column_type("decimal(5,2)").comment("Rating the posts"))
                .build()],
            "Blog",
        );
        let sql = create_table_sql(&shape);

        assert!(sql.contains("\"Blogurl\" varchar(200)"));
        assert!(sql.contains("\"Rating\" TEXT NOT NULL"));
        assert!(sql.contains("-- Rating the posts\n"));
    }

    #[test]
    fn test_defaults_and_computed_columns() {
        let shape = shape_of(
            vec![EntityDefinition::builder("Book")
                .field(FieldDefinition::integer("Id"))
                .field(FieldDefinition::integer("Rating").default_value(2))
                .field(FieldDefinition::date_time("PublishOn").default_sql("GETDATE()"))
                .field(FieldDefinition::string("Title"))
                .field(FieldDefinition::string("Label").computed("upper(\"Title\")"))
                .build()],
            "Book",
        );
        let sql = create_table_sql(&shape);

        assert!(sql.contains("\"Rating\" INTEGER NOT NULL DEFAULT 2"));
        assert!(sql.contains("\"PublishOn\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("\"Label\" TEXT GENERATED ALWAYS AS (upper(\"Title\")) VIRTUAL"));
    }

    #[test]
    fn test_foreign_key_and_schema_qualified_tables() {
        let blog = EntityDefinition::builder("Blog")
            .field(FieldDefinition::integer("Id"))
            .in_schema("bloging")
            .has_many("Post")
            .build();
        let post = EntityDefinition::builder("Post")
            .field(FieldDefinition::integer("Id"))
            .to_table("Posts")
            .in_schema("bloging")
            .build();
        let shape = shape_of(vec![blog, post], "Post");
        let sql = create_table_sql(&shape);

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"bloging.Posts\""));
        assert!(sql.contains("\"BlogId\" INTEGER,"));
        assert!(sql.contains("FOREIGN KEY (\"BlogId\") REFERENCES \"bloging.Blog\" (\"Id\")"));
    }

    #[test]
    fn test_excluded_tables_get_no_migration() {
        let shape = shape_of(
            vec![EntityDefinition::builder("Blog")
                .field(FieldDefinition::integer("Id"))
                .exclude_from_migrations()
                .build()],
            "Blog",
        );
        assert!(migrations_for(&[shape]).is_empty());
    }

    #[test]
    fn test_affinity_rules() {
        assert_eq!(affinity("varchar(200)"), Affinity::Text);
        assert_eq!(affinity("decimal(5,2)"), Affinity::Numeric);
        assert_eq!(affinity("BIGINT"), Affinity::Integer);
        assert_eq!(affinity("double"), Affinity::Real);
        assert_eq!(affinity(""), Affinity::Blob);
    }
}
