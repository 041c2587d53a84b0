//! In-memory backing store
//!
//! State lives behind an `Arc<Mutex<_>>` shared by every store a connector
//! hands out, so separate sessions see each other's commits. A batch is
//! applied to a clone of the state and swapped in only when every change
//! succeeded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::{
    ApplyHook, BackingStore, CommittedRow, ConnectionDescriptor, RejectionKind, Row,
    StoreConnector, StoreRejection, StoreResult,
};
use crate::model::{DefaultValue, FieldType, Value};
use crate::resolver::StorageShape;
use crate::session::{ChangeOperation, StagedChange};

#[derive(Debug, Clone)]
struct MemoryTable {
    shape: Arc<StorageShape>,
    rows: Vec<Row>,
    last_key: i64,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
}

/// Connector handing out stores over one shared in-memory state
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
    hook: Option<Arc<dyn ApplyHook>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a hook consulted before each change of every batch
    pub fn with_apply_hook(mut self, hook: Arc<dyn ApplyHook>) -> Self {
        self.hook = Some(hook);
        self
    }
}

impl std::fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    fn connect(&self, _descriptor: &ConnectionDescriptor) -> StoreResult<MemoryStore> {
        Ok(MemoryStore {
            state: self.state.clone(),
            hook: self.hook.clone(),
        })
    }
}

/// Backing store over shared in-memory tables
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    hook: Option<Arc<dyn ApplyHook>>,
}

impl MemoryStore {
    /// Stand-alone store with its own empty state
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            hook: None,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| {
            StoreRejection::new(RejectionKind::Unavailable, "memory store lock poisoned")
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for MemoryStore {
    fn ensure_schema(&mut self, shapes: &[Arc<StorageShape>]) -> StoreResult<()> {
        let mut state = self.lock()?;
        for shape in shapes {
            let table = shape.table.qualified();
            if !state.tables.contains_key(&table) {
                tracing::debug!(table = %table, "memory table created");
                state.tables.insert(
                    table,
                    MemoryTable {
                        shape: shape.clone(),
                        rows: Vec::new(),
                        last_key: 0,
                    },
                );
            }
        }
        Ok(())
    }

    fn apply_batch(&mut self, changes: &[StagedChange]) -> StoreResult<Vec<CommittedRow>> {
        let mut state = self.lock()?;
        let mut working = state.clone();
        let mut committed = Vec::with_capacity(changes.len());

        for (index, change) in changes.iter().enumerate() {
            if let Some(hook) = &self.hook {
                hook.before_apply(index, change)?;
            }
            let generated_key =
                apply_change(&mut working, change).map_err(|r| r.with_change(change.id))?;
            committed.push(CommittedRow {
                change_id: change.id,
                generated_key,
            });
        }

        *state = working;
        tracing::debug!(changes = changes.len(), "memory batch applied");
        Ok(committed)
    }

    fn find(&self, shape: &StorageShape, key: &[Value]) -> StoreResult<Option<Row>> {
        let rows = self.find_by(shape, &shape.primary_key.fields, key)?;
        Ok(rows.into_iter().next())
    }

    fn find_by(
        &self,
        shape: &StorageShape,
        fields: &[String],
        values: &[Value],
    ) -> StoreResult<Vec<Row>> {
        let state = self.lock()?;
        let table = table(&state, shape)?;
        Ok(table
            .rows
            .iter()
            .filter(|row| matches_values(row, fields, values))
            .cloned()
            .collect())
    }
}

fn table<'a>(state: &'a MemoryState, shape: &StorageShape) -> StoreResult<&'a MemoryTable> {
    state.tables.get(&shape.table.qualified()).ok_or_else(|| {
        StoreRejection::new(
            RejectionKind::Other,
            format!("no such table: {}", shape.table),
        )
    })
}

fn matches_values(row: &Row, fields: &[String], values: &[Value]) -> bool {
    fields.len() == values.len()
        && fields
            .iter()
            .zip(values)
            .all(|(f, v)| !v.is_null() && row.get(f) == Some(v))
}

fn values_of(row: &Row, fields: &[String]) -> Vec<Value> {
    fields
        .iter()
        .map(|f| row.get(f).cloned().unwrap_or(Value::Null))
        .collect()
}

fn apply_change(state: &mut MemoryState, change: &StagedChange) -> StoreResult<Option<Value>> {
    match change.operation {
        ChangeOperation::Insert => insert(state, change),
        ChangeOperation::Update => update(state, change).map(|_| None),
        ChangeOperation::Delete => delete(state, change).map(|_| None),
    }
}

fn insert(state: &mut MemoryState, change: &StagedChange) -> StoreResult<Option<Value>> {
    let shape = &change.shape;
    let mut row = Row::new();
    for column in &shape.columns {
        let value = if column.read_only() {
            Value::Null
        } else if let Some(value) = change.values.get(&column.field) {
            value.clone()
        } else {
            column
                .default
                .as_ref()
                .map(evaluate_default)
                .unwrap_or(Value::Null)
        };
        row.insert(column.field.clone(), value);
    }

    let name = shape.table.qualified();
    let mut generated = None;
    if let Some(key_field) = shape.generated_key_field() {
        let table = table_mut(state, &name)?;
        let current = row.get(key_field).cloned().unwrap_or(Value::Null);
        if current.is_unassigned_key() {
            let next = table.last_key + 1;
            let key_type = shape
                .column(key_field)
                .map(|c| c.field_type)
                .unwrap_or(FieldType::Integer);
            let value = match key_type {
                FieldType::Byte => u8::try_from(next).map(Value::Byte).map_err(|_| {
                    StoreRejection::new(
                        RejectionKind::KeyGenerationConflict,
                        format!("{}.{} exhausted its byte key range", name, key_field),
                    )
                })?,
                _ => Value::Integer(next),
            };
            table.last_key = next;
            row.insert(key_field.to_string(), value.clone());
            generated = Some(value);
        } else if let Some(explicit) = current.as_i64() {
            table.last_key = table.last_key.max(explicit);
        }
    }

    check_not_null(shape, &row)?;
    check_unique(state, shape, &row, None)?;
    check_references(state, shape, &row)?;

    table_mut(state, &name)?.rows.push(row);
    Ok(generated)
}

fn update(state: &mut MemoryState, change: &StagedChange) -> StoreResult<()> {
    let shape = &change.shape;
    let name = shape.table.qualified();
    let key = change.key_values();
    let index = position_of(table_mut(state, &name)?, shape, &key)?;

    let previous = table_mut(state, &name)?.rows[index].clone();
    let mut row = previous.clone();
    for (field, value) in &change.values {
        row.insert(field.clone(), value.clone());
    }

    check_not_null(shape, &row)?;
    check_unique(state, shape, &row, Some(index))?;
    check_references(state, shape, &row)?;
    check_dependents(state, shape, &previous, Some(&row))?;

    table_mut(state, &name)?.rows[index] = row;
    Ok(())
}

fn delete(state: &mut MemoryState, change: &StagedChange) -> StoreResult<()> {
    let shape = &change.shape;
    let name = shape.table.qualified();
    let key = change.key_values();
    let index = position_of(table_mut(state, &name)?, shape, &key)?;
    let row = table_mut(state, &name)?.rows[index].clone();
    check_dependents(state, shape, &row, None)?;

    table_mut(state, &name)?.rows.remove(index);
    Ok(())
}

fn table_mut<'a>(state: &'a mut MemoryState, name: &str) -> StoreResult<&'a mut MemoryTable> {
    state
        .tables
        .get_mut(name)
        .ok_or_else(|| StoreRejection::new(RejectionKind::Other, format!("no such table: {}", name)))
}

fn position_of(table: &MemoryTable, shape: &StorageShape, key: &[Value]) -> StoreResult<usize> {
    table
        .rows
        .iter()
        .position(|row| matches_values(row, &shape.primary_key.fields, key))
        .ok_or_else(|| {
            StoreRejection::new(
                RejectionKind::RowNotFound,
                format!("no {} row with key {:?}", shape.table, key),
            )
        })
}

fn evaluate_default(default: &DefaultValue) -> Value {
    match default {
        DefaultValue::Value(value) => value.clone(),
        DefaultValue::Expression(expr) => {
            let normalized = expr.trim().to_ascii_uppercase();
            match normalized.as_str() {
                "CURRENT_TIMESTAMP" | "GETDATE()" | "NOW()" => Value::DateTime(Utc::now()),
                _ => Value::Null,
            }
        }
    }
}

fn check_not_null(shape: &StorageShape, row: &Row) -> StoreResult<()> {
    for column in shape.columns.iter().filter(|c| !c.nullable && !c.read_only()) {
        if row.get(&column.field).map(Value::is_null).unwrap_or(true) {
            return Err(StoreRejection::new(
                RejectionKind::NotNullViolation,
                format!("{}.{} may not be null", shape.table, column.column),
            ));
        }
    }
    Ok(())
}

fn check_unique(
    state: &MemoryState,
    shape: &StorageShape,
    row: &Row,
    skip: Option<usize>,
) -> StoreResult<()> {
    let table = table(state, shape)?;
    let constraints =
        std::iter::once(&shape.primary_key.fields).chain(shape.unique_constraints.iter());

    for fields in constraints {
        let values = values_of(row, fields);
        if values.iter().any(Value::is_null) {
            continue;
        }
        let clash = table
            .rows
            .iter()
            .enumerate()
            .any(|(i, existing)| Some(i) != skip && matches_values(existing, fields, &values));
        if clash {
            return Err(StoreRejection::new(
                RejectionKind::UniqueViolation,
                format!(
                    "{} ({}) already exists",
                    shape.table,
                    shape.column_names(fields).join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn check_references(state: &MemoryState, shape: &StorageShape, row: &Row) -> StoreResult<()> {
    for fk in &shape.foreign_keys {
        let values = values_of(row, &fk.fields);
        if values.iter().any(Value::is_null) {
            continue;
        }
        let principal = state.tables.get(&fk.principal_table.qualified());
        let found = principal
            .map(|t| {
                t.rows
                    .iter()
                    .any(|r| matches_values(r, &fk.principal_fields, &values))
            })
            .unwrap_or(false);
        if !found {
            return Err(StoreRejection::new(
                RejectionKind::ForeignKeyViolation,
                format!(
                    "{}.{} references a missing {} row",
                    shape.table,
                    shape.column_names(&fk.fields).join(","),
                    fk.principal_table
                ),
            ));
        }
    }
    Ok(())
}

/// Reject when dependents still reference `previous` through a principal
/// key that `replacement` removes or changes; `None` removes the row.
fn check_dependents(
    state: &MemoryState,
    shape: &StorageShape,
    previous: &Row,
    replacement: Option<&Row>,
) -> StoreResult<()> {
    for dependent in state.tables.values() {
        for fk in &dependent.shape.foreign_keys {
            if fk.principal_table != shape.table {
                continue;
            }
            let principal_values = values_of(previous, &fk.principal_fields);
            if let Some(row) = replacement {
                if values_of(row, &fk.principal_fields) == principal_values {
                    continue;
                }
            }
            if dependent
                .rows
                .iter()
                .any(|r| matches_values(r, &fk.fields, &principal_values))
            {
                return Err(StoreRejection::new(
                    RejectionKind::ForeignKeyViolation,
                    format!(
                        "{} row is still referenced by {}",
                        shape.table, dependent.shape.table
                    ),
                ));
            }
        }
    }
    Ok(())
}
