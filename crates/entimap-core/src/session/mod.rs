//! Persistence session
//!
//! A [`Session`] is a unit of work over one backing store connection. Changes
//! are validated and queued by [`Session::stage`], then applied together by
//! [`Session::commit`]:
//!
//! ```text
//! Open --commit ok--> Committed
//! Open --commit err-> Open        (staged changes kept for inspection/retry)
//! Open --rollback/drop--> Closed
//! ```
//!
//! Store-generated keys reach the caller only through the [`CommitReceipt`],
//! i.e. only after the batch was durably applied.

mod change;
mod factory;
mod validate;

pub use change::{ChangeId, ChangeOperation, StagedChange};
pub use factory::SessionFactory;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use entimap_core_types::SessionId;

use crate::backing::{BackingStore, Row};
use crate::errors::{FieldViolation, MapError, Result, ViolationKind};
use crate::model::{EntityInstance, Value};
use crate::resolver::StorageShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Committed,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Open => "open",
            SessionState::Committed => "committed",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change as committed, with any generated key filled in
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedChange {
    pub change_id: ChangeId,
    pub operation: ChangeOperation,
    pub instance: EntityInstance,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub session_id: SessionId,
    pub changes: Vec<CommittedChange>,
}

impl CommitReceipt {
    pub fn instance(&self, change_id: ChangeId) -> Option<&EntityInstance> {
        self.changes
            .iter()
            .find(|c| c.change_id == change_id)
            .map(|c| &c.instance)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Relations to load together with an entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    relations: Vec<String>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the relation reachable through `navigation`
    pub fn include(mut self, navigation: impl Into<String>) -> Self {
        self.relations.push(navigation.into());
        self
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }
}

/// An entity read together with some of its relations
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEntity {
    pub instance: EntityInstance,
    pub related: BTreeMap<String, Vec<EntityInstance>>,
}

impl LoadedEntity {
    /// Instances loaded for `navigation`; empty if it was not requested
    pub fn related(&self, navigation: &str) -> &[EntityInstance] {
        self.related
            .get(navigation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Unit of work over one backing store connection
///
/// Owned by a single caller; every mutating method takes `&mut self`.
/// Dropping an open session discards its staged changes.
pub struct Session<S: BackingStore> {
    id: SessionId,
    state: SessionState,
    store: S,
    shapes: Arc<HashMap<String, Arc<StorageShape>>>,
    staged: Vec<StagedChange>,
    next_change: u64,
}

impl<S: BackingStore> Session<S> {
    pub(crate) fn new(store: S, shapes: Arc<HashMap<String, Arc<StorageShape>>>) -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Open,
            store,
            shapes,
            staged: Vec::new(),
            next_change: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Changes queued for the next commit, in staging order
    pub fn staged(&self) -> &[StagedChange] {
        &self.staged
    }

    /// Resolved shape of an entity known to this session
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for names outside the registry.
    pub fn shape(&self, entity: &str) -> Result<&Arc<StorageShape>> {
        self.shapes
            .get(entity)
            .ok_or_else(|| MapError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    /// Validate and queue a change
    ///
    /// # Errors
    ///
    /// * `SessionClosed` - the session is committed or closed
    /// * `UnknownEntity` - the instance names an unregistered entity
    /// * `ReadOnlyFieldWrite` - insert or update sets a computed field
    /// * `ValidationError` - every field-level violation found
    pub fn stage(&mut self, operation: ChangeOperation, instance: EntityInstance) -> Result<ChangeId> {
        let start = Instant::now();
        crate::log_op_start!(
            "session_stage",
            session_id = %self.id,
            entity = instance.entity(),
            operation = operation.as_str()
        );

        match self.stage_inner(operation, instance) {
            Ok(change_id) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                crate::log_op_end!(
                    "session_stage",
                    duration_ms = duration_ms,
                    session_id = %self.id,
                    change_id = %change_id,
                    staged_len = self.staged.len()
                );
                Ok(change_id)
            }
            Err(e) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                crate::log_op_error!(
                    "session_stage",
                    e.clone(),
                    duration_ms = duration_ms,
                    session_id = %self.id
                );
                Err(e)
            }
        }
    }

    fn stage_inner(&mut self, operation: ChangeOperation, instance: EntityInstance) -> Result<ChangeId> {
        self.ensure_open()?;
        let shape = self.shape(instance.entity())?.clone();
        let values = validate::validate_instance(&shape, operation, &instance)?;

        self.next_change += 1;
        let change_id = ChangeId::new(self.next_change);
        self.staged.push(StagedChange::new(
            change_id, operation, shape, values, instance,
        ));
        Ok(change_id)
    }

    /// Apply every staged change as one atomic batch
    ///
    /// # Errors
    ///
    /// * `SessionClosed` - the session is committed or closed
    /// * `CommitFailure` - the store rejected the batch; nothing was applied
    ///   (unless the cause is `OutcomeUnknown`) and the session stays open
    ///   with its staged changes
    pub fn commit(&mut self) -> Result<CommitReceipt> {
        let start = Instant::now();
        crate::log_op_start!(
            "session_commit",
            session_id = %self.id,
            staged_len = self.staged.len()
        );

        match self.commit_inner() {
            Ok(receipt) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                crate::log_op_end!(
                    "session_commit",
                    duration_ms = duration_ms,
                    session_id = %self.id,
                    staged_len = receipt.len()
                );
                Ok(receipt)
            }
            Err(e) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                crate::log_op_error!(
                    "session_commit",
                    e.clone(),
                    duration_ms = duration_ms,
                    session_id = %self.id
                );
                Err(e)
            }
        }
    }

    fn commit_inner(&mut self) -> Result<CommitReceipt> {
        self.ensure_open()?;

        let rows = self
            .store
            .apply_batch(&self.staged)
            .map_err(|cause| MapError::CommitFailure {
                session_id: self.id.to_string(),
                staged: self.staged.len(),
                cause,
            })?;

        let mut generated: HashMap<ChangeId, Value> = rows
            .into_iter()
            .filter_map(|row| row.generated_key.map(|key| (row.change_id, key)))
            .collect();

        let changes = std::mem::take(&mut self.staged)
            .into_iter()
            .map(|change| {
                let key = generated.remove(&change.id);
                let key_field = change.shape.generated_key_field().map(str::to_string);
                let (change_id, operation) = (change.id, change.operation);
                let mut instance = change.into_instance();
                if let (Some(field), Some(key)) = (key_field, key) {
                    instance.set(field, key);
                }
                CommittedChange {
                    change_id,
                    operation,
                    instance,
                }
            })
            .collect();

        self.state = SessionState::Committed;
        Ok(CommitReceipt {
            session_id: self.id.clone(),
            changes,
        })
    }

    /// Discard every staged change and close the session
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session is already committed or closed.
    pub fn rollback(&mut self) -> Result<()> {
        let start = Instant::now();
        crate::log_op_start!("session_rollback", session_id = %self.id);

        if let Err(e) = self.ensure_open() {
            let duration_ms = start.elapsed().as_millis() as u64;
            crate::log_op_error!(
                "session_rollback",
                e.clone(),
                duration_ms = duration_ms,
                session_id = %self.id
            );
            return Err(e);
        }

        let discarded = self.staged.len();
        self.staged.clear();
        self.state = SessionState::Closed;

        let duration_ms = start.elapsed().as_millis() as u64;
        crate::log_op_end!(
            "session_rollback",
            duration_ms = duration_ms,
            session_id = %self.id,
            staged_len = discarded
        );
        Ok(())
    }

    /// Committed state of the entity with the given key, in key order
    ///
    /// Staged but uncommitted changes are not visible.
    ///
    /// # Errors
    ///
    /// * `SessionClosed` - the session was rolled back
    /// * `UnknownEntity` - unregistered entity
    /// * `ValidationError` - missing key components or a key value of the wrong type
    /// * `StoreUnavailable` - the read failed
    pub fn find(&self, entity: &str, key: &[Value]) -> Result<Option<EntityInstance>> {
        self.ensure_readable()?;
        let shape = self.shape(entity)?;
        check_key(shape, key)?;

        let row = self
            .store
            .find(shape, key)
            .map_err(|cause| MapError::StoreUnavailable { cause })?;
        Ok(row.map(|row| instance_from_row(shape, row)))
    }

    /// Like [`Session::find`], loading the relations named in `options`
    ///
    /// # Errors
    ///
    /// Those of [`Session::find`], plus `UnknownRelation`.
    pub fn find_with(
        &self,
        entity: &str,
        key: &[Value],
        options: &LoadOptions,
    ) -> Result<Option<LoadedEntity>> {
        let instance = match self.find(entity, key)? {
            Some(instance) => instance,
            None => return Ok(None),
        };

        let mut related = BTreeMap::new();
        for navigation in options.relations() {
            let loaded = self.load_related(&instance, navigation)?;
            related.insert(navigation.clone(), loaded);
        }
        Ok(Some(LoadedEntity { instance, related }))
    }

    /// Read the instances on the other side of a relation
    ///
    /// `navigation` is either the dependent-to-principal name (yielding at
    /// most one principal) or the principal-to-dependent name (yielding
    /// every dependent row).
    ///
    /// # Errors
    ///
    /// * `SessionClosed` - the session was rolled back
    /// * `UnknownEntity` / `UnknownRelation` - nothing matches
    /// * `StoreUnavailable` - the read failed
    pub fn load_related(
        &self,
        instance: &EntityInstance,
        navigation: &str,
    ) -> Result<Vec<EntityInstance>> {
        self.ensure_readable()?;
        let shape = self.shape(instance.entity())?;

        if let Some(fk) = shape.foreign_key_by_navigation(navigation) {
            let principal = self.shape(&fk.principal_entity)?;
            let values = key_values(instance, &fk.fields);
            return self.read_matching(principal, &fk.principal_fields, &values);
        }

        for dependent in self.shapes.values() {
            let fk = dependent.foreign_keys.iter().find(|fk| {
                fk.principal_entity == shape.entity && fk.navigation == navigation
            });
            if let Some(fk) = fk {
                let values = key_values(instance, &fk.principal_fields);
                return self.read_matching(dependent, &fk.fields, &values);
            }
        }

        Err(MapError::UnknownRelation {
            entity: shape.entity.clone(),
            relation: navigation.to_string(),
        })
    }

    fn read_matching(
        &self,
        shape: &StorageShape,
        fields: &[String],
        values: &[Value],
    ) -> Result<Vec<EntityInstance>> {
        if values.iter().any(Value::is_null) {
            return Ok(Vec::new());
        }
        let rows = self
            .store
            .find_by(shape, fields, values)
            .map_err(|cause| MapError::StoreUnavailable { cause })?;
        Ok(rows
            .into_iter()
            .map(|row| instance_from_row(shape, row))
            .collect())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state != SessionState::Open {
            return Err(self.closed_error());
        }
        Ok(())
    }

    fn ensure_readable(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(self.closed_error());
        }
        Ok(())
    }

    fn closed_error(&self) -> MapError {
        MapError::SessionClosed {
            session_id: self.id.to_string(),
            state: self.state.to_string(),
        }
    }
}

impl<S: BackingStore> Drop for Session<S> {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            if !self.staged.is_empty() {
                tracing::debug!(
                    session_id = %self.id,
                    staged_len = self.staged.len(),
                    "session dropped; staged changes discarded"
                );
            }
            self.staged.clear();
            self.state = SessionState::Closed;
        }
    }
}

impl<S: BackingStore> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("staged", &self.staged.len())
            .finish()
    }
}

fn check_key(shape: &StorageShape, key: &[Value]) -> Result<()> {
    let mut violations = Vec::new();
    for (i, field) in shape.primary_key.fields.iter().enumerate() {
        let value = match key.get(i) {
            Some(value) if !value.is_null() => value,
            _ => {
                violations.push(FieldViolation::new(field.clone(), ViolationKind::MissingKey));
                continue;
            }
        };
        if let Some(column) = shape.column(field) {
            if value.field_type() != Some(column.field_type) {
                violations.push(FieldViolation::new(
                    field.clone(),
                    ViolationKind::TypeMismatch {
                        expected: column.field_type,
                        actual: value.type_name(),
                    },
                ));
            }
        }
    }
    if violations.is_empty() && key.len() == shape.primary_key.fields.len() {
        return Ok(());
    }
    Err(MapError::ValidationError {
        entity: shape.entity.clone(),
        violations,
    })
}

fn key_values(instance: &EntityInstance, fields: &[String]) -> Vec<Value> {
    fields
        .iter()
        .map(|f| instance.get(f).cloned().unwrap_or(Value::Null))
        .collect()
}

fn instance_from_row(shape: &StorageShape, row: Row) -> EntityInstance {
    EntityInstance::from_values(shape.entity.clone(), row)
}
