//! SQLite backing store
//!
//! A commit runs every staged change inside one SQLite transaction; any
//! rejection drops the transaction, which rolls the batch back.

use std::sync::Arc;

use entimap_core::backing::{
    ApplyHook, BackingStore, CommittedRow, ConnectionDescriptor, RejectionKind, Row,
    StoreConnector, StoreRejection, StoreResult,
};
use entimap_core::resolver::StorageShape;
use entimap_core::{ChangeOperation, FieldType, StagedChange, Value};
use rusqlite::{params_from_iter, Connection, Transaction};

use crate::db;
use crate::errors::{classify, rejection, unavailable};
use crate::migrations::{apply_migrations, ddl, migrations_for, quote_ident};
use crate::repo::codec;

/// Opens one SQLite connection per session
#[derive(Clone, Default)]
pub struct SqliteConnector {
    hook: Option<Arc<dyn ApplyHook>>,
}

impl SqliteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a hook consulted before each change of every batch
    pub fn with_apply_hook(mut self, hook: Arc<dyn ApplyHook>) -> Self {
        self.hook = Some(hook);
        self
    }
}

impl std::fmt::Debug for SqliteConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnector")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl StoreConnector for SqliteConnector {
    type Store = SqliteStore;

    fn connect(&self, descriptor: &ConnectionDescriptor) -> StoreResult<SqliteStore> {
        let mut store = SqliteStore::open(descriptor)?;
        store.hook = self.hook.clone();
        Ok(store)
    }
}

/// Backing store over a single SQLite connection
pub struct SqliteStore {
    conn: Connection,
    hook: Option<Arc<dyn ApplyHook>>,
}

impl SqliteStore {
    /// # Errors
    ///
    /// `Unavailable` when the database cannot be opened or configured.
    pub fn open(descriptor: &ConnectionDescriptor) -> StoreResult<Self> {
        let conn = db::open_descriptor(descriptor.expose()).map_err(unavailable)?;
        Ok(Self { conn, hook: None })
    }

    /// Wrap an already configured connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn, hook: None }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn select(
        &self,
        shape: &StorageShape,
        fields: &[String],
        values: &[Value],
    ) -> StoreResult<Vec<Row>> {
        let columns = shape
            .columns
            .iter()
            .map(|c| quote_ident(&c.column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            columns,
            quote_ident(&shape.table.qualified()),
            where_clause(shape, fields, 1)
        );

        let mut stmt = self.conn.prepare(&sql).map_err(rejection)?;
        let params = values.iter().map(codec::to_sql).collect::<Vec<_>>();
        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(rejection)?;

        let mut found = Vec::new();
        while let Some(raw) = rows.next().map_err(rejection)? {
            let mut row = Row::new();
            for (index, column) in shape.columns.iter().enumerate() {
                let value_ref = raw.get_ref(index).map_err(rejection)?;
                let value = codec::from_sql(column.field_type, value_ref).map_err(|reason| {
                    StoreRejection::new(
                        RejectionKind::Other,
                        format!("{}.{}: {}", shape.table, column.column, reason),
                    )
                })?;
                row.insert(column.field.clone(), value);
            }
            found.push(row);
        }
        Ok(found)
    }
}

impl BackingStore for SqliteStore {
    fn ensure_schema(&mut self, shapes: &[Arc<StorageShape>]) -> StoreResult<()> {
        apply_migrations(&mut self.conn, &migrations_for(shapes)).map_err(unavailable)?;
        Ok(())
    }

    fn apply_batch(&mut self, changes: &[StagedChange]) -> StoreResult<Vec<CommittedRow>> {
        let tx = self.conn.transaction().map_err(rejection)?;

        let mut committed = Vec::with_capacity(changes.len());
        for (index, change) in changes.iter().enumerate() {
            if let Some(hook) = &self.hook {
                hook.before_apply(index, change)?;
            }
            let generated_key = apply_change(&tx, change).map_err(|r| r.with_change(change.id))?;
            committed.push(CommittedRow {
                change_id: change.id,
                generated_key,
            });
        }

        tx.commit().map_err(|e| {
            StoreRejection::new(
                RejectionKind::OutcomeUnknown,
                format!("commit did not complete: {}", e),
            )
        })?;

        tracing::debug!(changes = committed.len(), "sqlite batch committed");
        Ok(committed)
    }

    fn find(&self, shape: &StorageShape, key: &[Value]) -> StoreResult<Option<Row>> {
        let mut rows = self.select(shape, &shape.primary_key.fields, key)?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    fn find_by(
        &self,
        shape: &StorageShape,
        fields: &[String],
        values: &[Value],
    ) -> StoreResult<Vec<Row>> {
        if fields.len() != values.len() {
            return Err(StoreRejection::new(
                RejectionKind::Other,
                format!("{} fields but {} values", fields.len(), values.len()),
            ));
        }
        self.select(shape, fields, values)
    }
}

fn apply_change(tx: &Transaction<'_>, change: &StagedChange) -> StoreResult<Option<Value>> {
    match change.operation {
        ChangeOperation::Insert => insert(tx, change),
        ChangeOperation::Update => update(tx, change).map(|_| None),
        ChangeOperation::Delete => delete(tx, change).map(|_| None),
    }
}

fn insert(tx: &Transaction<'_>, change: &StagedChange) -> StoreResult<Option<Value>> {
    let shape = &change.shape;
    let table = quote_ident(&shape.table.qualified());

    let mut columns = Vec::with_capacity(change.values.len());
    let mut params = Vec::with_capacity(change.values.len());
    for (field, value) in &change.values {
        columns.push(quote_ident(&column_of(shape, field)?));
        params.push(codec::to_sql(value));
    }

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders(1, columns.len())
        )
    };

    tx.execute(&sql, params_from_iter(params.iter()))
        .map_err(|e| insert_rejection(shape, e))?;

    let key_field = match shape.generated_key_field() {
        Some(field) if !change.values.contains_key(field) => field,
        _ => return Ok(None),
    };
    let rowid = tx.last_insert_rowid();
    let key_type = shape
        .column(key_field)
        .map(|c| c.field_type)
        .unwrap_or(FieldType::Integer);
    let generated = match key_type {
        FieldType::Byte => u8::try_from(rowid).map(Value::Byte).map_err(|_| {
            StoreRejection::new(
                RejectionKind::KeyGenerationConflict,
                format!("{}.{} exhausted its byte key range", shape.table, key_field),
            )
        })?,
        _ => Value::Integer(rowid),
    };
    Ok(Some(generated))
}

fn update(tx: &Transaction<'_>, change: &StagedChange) -> StoreResult<()> {
    let shape = &change.shape;
    let key_fields = &shape.primary_key.fields;

    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for (field, value) in &change.values {
        if shape.is_key_field(field) {
            continue;
        }
        params.push(codec::to_sql(value));
        assignments.push(format!(
            "{} = ?{}",
            quote_ident(&column_of(shape, field)?),
            params.len()
        ));
    }
    if assignments.is_empty() {
        // Nothing but the key: touch the row so a missing one is still reported.
        let first = key_fields.first().map(String::as_str).unwrap_or_default();
        let column = quote_ident(&column_of(shape, first)?);
        assignments.push(format!("{} = {}", column, column));
    }

    let where_sql = where_clause(shape, key_fields, params.len() + 1);
    params.extend(change.key_values().iter().map(codec::to_sql));

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(&shape.table.qualified()),
        assignments.join(", "),
        where_sql
    );
    let affected = tx
        .execute(&sql, params_from_iter(params.iter()))
        .map_err(rejection)?;
    expect_one_row(shape, affected, change)
}

fn delete(tx: &Transaction<'_>, change: &StagedChange) -> StoreResult<()> {
    let shape = &change.shape;
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        quote_ident(&shape.table.qualified()),
        where_clause(shape, &shape.primary_key.fields, 1)
    );
    let params = change
        .key_values()
        .iter()
        .map(codec::to_sql)
        .collect::<Vec<_>>();
    let affected = tx
        .execute(&sql, params_from_iter(params.iter()))
        .map_err(rejection)?;
    expect_one_row(shape, affected, change)
}

fn expect_one_row(shape: &StorageShape, affected: usize, change: &StagedChange) -> StoreResult<()> {
    if affected == 0 {
        return Err(StoreRejection::new(
            RejectionKind::RowNotFound,
            format!("no {} row with key {:?}", shape.table, change.key_values()),
        ));
    }
    Ok(())
}

/// A byte key past 255 trips the column's range check, not a unique index
fn insert_rejection(shape: &StorageShape, err: rusqlite::Error) -> StoreRejection {
    let message = err.to_string();
    if classify(&err) == RejectionKind::Other {
        if let Some(key_field) = shape.generated_key_field() {
            if let Some(column) = shape.column(key_field) {
                if message.contains(&ddl::byte_check_name(&column.column)) {
                    return StoreRejection::new(RejectionKind::KeyGenerationConflict, message);
                }
            }
        }
    }
    rejection(err)
}

fn column_of(shape: &StorageShape, field: &str) -> StoreResult<String> {
    shape
        .column(field)
        .map(|c| c.column.clone())
        .ok_or_else(|| {
            StoreRejection::new(
                RejectionKind::Other,
                format!("{} has no column for field {}", shape.table, field),
            )
        })
}

fn where_clause(shape: &StorageShape, fields: &[String], first: usize) -> String {
    if fields.is_empty() {
        return "1 = 1".to_string();
    }
    shape
        .column_names(fields)
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ?{}", quote_ident(column), first + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
