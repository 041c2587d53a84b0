//! Field validation performed by `Session::stage`

use std::collections::BTreeMap;

use crate::errors::{FieldViolation, MapError, Result, ViolationKind};
use crate::model::{EntityInstance, Value};
use crate::resolver::StorageShape;

use super::change::ChangeOperation;

/// Check an instance against its shape and return the storable values
///
/// Read-only writes fail fast; every other problem is collected so the
/// caller sees all violations at once.
pub(crate) fn validate_instance(
    shape: &StorageShape,
    operation: ChangeOperation,
    instance: &EntityInstance,
) -> Result<BTreeMap<String, Value>> {
    if operation != ChangeOperation::Delete {
        let read_only: Vec<String> = instance
            .values()
            .keys()
            .filter(|f| shape.column(f).map(|c| c.read_only()).unwrap_or(false))
            .cloned()
            .collect();
        if !read_only.is_empty() {
            return Err(MapError::ReadOnlyFieldWrite {
                entity: shape.entity.clone(),
                fields: read_only,
            });
        }
    }

    let generated_key = match operation {
        ChangeOperation::Insert => shape.generated_key_field(),
        _ => None,
    };

    let mut violations = Vec::new();
    let mut values = BTreeMap::new();

    for (field, value) in instance.values() {
        if shape.is_ignored(field) {
            continue;
        }
        let column = match shape.column(field) {
            Some(column) => column,
            None => {
                violations.push(FieldViolation::new(field.clone(), ViolationKind::UnknownField));
                continue;
            }
        };
        let is_key = shape.is_key_field(field);

        if operation == ChangeOperation::Delete && !is_key {
            continue;
        }

        if generated_key == Some(field.as_str()) && value.is_unassigned_key() {
            continue;
        }

        if value.is_null() {
            if is_key && operation != ChangeOperation::Insert {
                violations.push(FieldViolation::new(field.clone(), ViolationKind::MissingKey));
            } else if !column.nullable {
                violations.push(FieldViolation::new(
                    field.clone(),
                    ViolationKind::NullNotAllowed,
                ));
            } else {
                values.insert(field.clone(), Value::Null);
            }
            continue;
        }

        if value.field_type() != Some(column.field_type) {
            violations.push(FieldViolation::new(
                field.clone(),
                ViolationKind::TypeMismatch {
                    expected: column.field_type,
                    actual: value.type_name(),
                },
            ));
            continue;
        }

        if let Some(max) = column.max_length {
            let actual = match value {
                Value::String(s) => s.chars().count(),
                Value::Binary(b) => b.len(),
                _ => 0,
            };
            if actual > max {
                violations.push(FieldViolation::new(
                    field.clone(),
                    ViolationKind::MaxLengthExceeded { max, actual },
                ));
                continue;
            }
        }

        values.insert(field.clone(), value.clone());
    }

    match operation {
        ChangeOperation::Insert => {
            for column in &shape.columns {
                let required = !column.nullable
                    && !column.read_only()
                    && column.default.is_none()
                    && generated_key != Some(column.field.as_str());
                if required && instance.get(&column.field).is_none() {
                    violations.push(FieldViolation::new(
                        column.field.clone(),
                        ViolationKind::MissingRequired,
                    ));
                }
            }
        }
        ChangeOperation::Update | ChangeOperation::Delete => {
            for field in &shape.primary_key.fields {
                if instance.get(field).is_none() {
                    violations.push(FieldViolation::new(field.clone(), ViolationKind::MissingKey));
                }
            }
        }
    }

    if !violations.is_empty() {
        return Err(MapError::ValidationError {
            entity: shape.entity.clone(),
            violations,
        });
    }
    Ok(values)
}
