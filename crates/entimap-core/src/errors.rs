use entimap_core_types::SessionId;
use thiserror::Error;

use crate::backing::StoreRejection;
use crate::model::FieldType;

/// Result type alias using MapError
pub type Result<T> = std::result::Result<T, MapError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers, tests and log
/// consumers can match on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Configuration
    DuplicateEntity,
    NameCollision,
    NoPrimaryKey,
    KeyTypeMismatch,
    NullableKeyComponent,
    UnknownField,
    InvalidConfiguration,
    RegistrySealed,
    RegistryNotSealed,

    // Lookup
    NotFound,

    // Staging
    ValidationFailed,
    ReadOnlyField,

    // Commit / store
    CommitFailed,
    ConstraintViolation,
    OutcomeUnknown,
    Persistence,

    // Misuse
    SessionClosed,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::DuplicateEntity => "ERR_DUPLICATE_ENTITY",
            ExErrorKind::NameCollision => "ERR_NAME_COLLISION",
            ExErrorKind::NoPrimaryKey => "ERR_NO_PRIMARY_KEY",
            ExErrorKind::KeyTypeMismatch => "ERR_KEY_TYPE_MISMATCH",
            ExErrorKind::NullableKeyComponent => "ERR_NULLABLE_KEY_COMPONENT",
            ExErrorKind::UnknownField => "ERR_UNKNOWN_FIELD",
            ExErrorKind::InvalidConfiguration => "ERR_INVALID_CONFIGURATION",
            ExErrorKind::RegistrySealed => "ERR_REGISTRY_SEALED",
            ExErrorKind::RegistryNotSealed => "ERR_REGISTRY_NOT_SEALED",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::ValidationFailed => "ERR_VALIDATION_FAILED",
            ExErrorKind::ReadOnlyField => "ERR_READ_ONLY_FIELD",
            ExErrorKind::CommitFailed => "ERR_COMMIT_FAILED",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::OutcomeUnknown => "ERR_OUTCOME_UNKNOWN",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::SessionClosed => "ERR_SESSION_CLOSED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification plus optional context (operation, entity,
/// field, session) for logging and programmatic handling.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    field: Option<String>,
    session_id: Option<SessionId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            field: None,
            session_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity name context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add field name context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add session context
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
        }
        if let Some(source) = &self.source {
            write!(f, " <- {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// A single rejected field in a staged change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub kind: ViolationKind,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.kind)
    }
}

/// Why a field value was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The field is not part of the entity's storage shape
    UnknownField,
    /// The value's type differs from the declared field type
    TypeMismatch {
        expected: FieldType,
        actual: &'static str,
    },
    /// Null assigned to a non-nullable field
    NullNotAllowed,
    /// String or binary longer than the declared max length
    MaxLengthExceeded { max: usize, actual: usize },
    /// Non-nullable field without default missing on insert
    MissingRequired,
    /// Key component missing or null on update, delete or lookup
    MissingKey,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::UnknownField => write!(f, "unknown field"),
            ViolationKind::TypeMismatch { expected, actual } => {
                write!(f, "expected {}, got {}", expected.as_str(), actual)
            }
            ViolationKind::NullNotAllowed => write!(f, "null not allowed"),
            ViolationKind::MaxLengthExceeded { max, actual } => {
                write!(f, "length {} exceeds max length {}", actual, max)
            }
            ViolationKind::MissingRequired => write!(f, "required value missing"),
            ViolationKind::MissingKey => write!(f, "key value missing"),
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error taxonomy for registry, resolver and session operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    // ===== Configuration Errors =====
    /// An entity with this name is already registered
    #[error("Entity already registered: {entity}")]
    DuplicateEntity { entity: String },

    /// Two entities map to the same storage table
    #[error("Entity {entity} maps to table {table}, already used by {existing}")]
    NameCollision {
        entity: String,
        existing: String,
        table: String,
    },

    /// No explicit key and no integer `Id` field to infer one from
    #[error("Entity {entity} has no resolvable primary key")]
    NoPrimaryKey { entity: String },

    /// Foreign key fields do not match the principal key types
    #[error("Relation {relation} on {entity}: foreign key types {foreign:?} do not match principal key types {principal:?}")]
    KeyTypeMismatch {
        entity: String,
        relation: String,
        foreign: Vec<FieldType>,
        principal: Vec<FieldType>,
    },

    /// A composite key component is declared nullable
    #[error("Key component {field} of entity {entity} is nullable")]
    NullableKeyComponent { entity: String, field: String },

    /// A key, relation or constraint names a field the entity does not have
    #[error("Entity {entity} has no mapped field {field}")]
    UnknownField { entity: String, field: String },

    /// Two fields of an entity share a name
    #[error("Entity {entity} declares field {field} more than once")]
    DuplicateField { entity: String, field: String },

    /// A field declares both a default and a computed expression
    #[error("Field {field} of entity {entity}: {reason}")]
    ConflictingFieldConfig {
        entity: String,
        field: String,
        reason: String,
    },

    /// Key generation strategy not applicable to the key
    #[error("Entity {entity}: {reason}")]
    InvalidKeyGeneration { entity: String, reason: String },

    /// Explicit principal key is neither the primary key nor a unique constraint
    #[error("Relation {relation}: principal key {fields:?} of {entity} is not unique")]
    PrincipalKeyNotUnique {
        entity: String,
        relation: String,
        fields: Vec<String>,
    },

    /// A relation is malformed or does not involve its declaring entity
    #[error("Invalid relation on {entity}: {reason}")]
    InvalidRelation { entity: String, reason: String },

    /// Registration attempted after the registry was sealed
    #[error("Registry is sealed; cannot register {entity}")]
    RegistrySealed { entity: String },

    /// Sessions require a sealed registry
    #[error("Registry must be sealed before sessions are opened")]
    RegistryNotSealed,

    // ===== Lookup Errors =====
    /// Entity name not present in the registry
    #[error("Unknown entity: {entity}")]
    UnknownEntity { entity: String },

    /// Relation name not present on the entity
    #[error("Entity {entity} has no relation named {relation}")]
    UnknownRelation { entity: String, relation: String },

    // ===== Staging Errors =====
    /// Field values failed validation; every violation is listed
    #[error("Validation failed for {entity}: {}", join_violations(.violations))]
    ValidationError {
        entity: String,
        violations: Vec<FieldViolation>,
    },

    /// Write to a computed (read-only) field
    #[error("Cannot write read-only fields {fields:?} of entity {entity}")]
    ReadOnlyFieldWrite { entity: String, fields: Vec<String> },

    // ===== Commit Errors =====
    /// The backing store rejected the batch; nothing was applied
    #[error("Commit of {staged} staged changes failed in session {session_id}: {cause}")]
    CommitFailure {
        session_id: String,
        staged: usize,
        #[source]
        cause: StoreRejection,
    },

    /// Connecting, reading or creating schema failed
    #[error("Backing store unavailable: {cause}")]
    StoreUnavailable {
        #[source]
        cause: StoreRejection,
    },

    // ===== Misuse =====
    /// Operation on a committed or closed session
    #[error("Session {session_id} is {state}")]
    SessionClosed { session_id: String, state: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl MapError {
    /// Whether the error belongs to the configuration group
    ///
    /// Configuration errors surface at registration or resolution time and
    /// are always fatal to that registration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MapError::DuplicateEntity { .. }
                | MapError::NameCollision { .. }
                | MapError::NoPrimaryKey { .. }
                | MapError::KeyTypeMismatch { .. }
                | MapError::NullableKeyComponent { .. }
                | MapError::UnknownField { .. }
                | MapError::DuplicateField { .. }
                | MapError::ConflictingFieldConfig { .. }
                | MapError::InvalidKeyGeneration { .. }
                | MapError::PrincipalKeyNotUnique { .. }
                | MapError::InvalidRelation { .. }
                | MapError::RegistrySealed { .. }
                | MapError::RegistryNotSealed
        )
    }
}

impl From<StoreRejection> for ExError {
    fn from(rejection: StoreRejection) -> Self {
        use crate::backing::RejectionKind;

        let kind = match rejection.kind {
            RejectionKind::UniqueViolation
            | RejectionKind::ForeignKeyViolation
            | RejectionKind::NotNullViolation
            | RejectionKind::KeyGenerationConflict
            | RejectionKind::RowNotFound => ExErrorKind::ConstraintViolation,
            RejectionKind::OutcomeUnknown => ExErrorKind::OutcomeUnknown,
            RejectionKind::Unavailable | RejectionKind::Other => ExErrorKind::Persistence,
        };
        ExError::new(kind)
            .with_op("store")
            .with_message(rejection.to_string())
    }
}

/// Conversion from MapError to the structured facility
impl From<MapError> for ExError {
    fn from(err: MapError) -> Self {
        let message = err.to_string();
        match err {
            MapError::DuplicateEntity { entity } => ExError::new(ExErrorKind::DuplicateEntity)
                .with_op("register")
                .with_entity(entity)
                .with_message(message),

            MapError::NameCollision { entity, .. } => ExError::new(ExErrorKind::NameCollision)
                .with_op("register")
                .with_entity(entity)
                .with_message(message),

            MapError::RegistrySealed { entity } => ExError::new(ExErrorKind::RegistrySealed)
                .with_op("register")
                .with_entity(entity)
                .with_message(message),

            MapError::DuplicateField { entity, field }
            | MapError::ConflictingFieldConfig { entity, field, .. } => {
                ExError::new(ExErrorKind::InvalidConfiguration)
                    .with_op("register")
                    .with_entity(entity)
                    .with_field(field)
                    .with_message(message)
            }

            MapError::InvalidRelation { entity, .. }
            | MapError::InvalidKeyGeneration { entity, .. }
            | MapError::PrincipalKeyNotUnique { entity, .. } => {
                ExError::new(ExErrorKind::InvalidConfiguration)
                    .with_op("resolve")
                    .with_entity(entity)
                    .with_message(message)
            }

            MapError::NoPrimaryKey { entity } => ExError::new(ExErrorKind::NoPrimaryKey)
                .with_op("resolve")
                .with_entity(entity)
                .with_message(message),

            MapError::KeyTypeMismatch { entity, .. } => ExError::new(ExErrorKind::KeyTypeMismatch)
                .with_op("resolve")
                .with_entity(entity)
                .with_message(message),

            MapError::NullableKeyComponent { entity, field } => {
                ExError::new(ExErrorKind::NullableKeyComponent)
                    .with_op("resolve")
                    .with_entity(entity)
                    .with_field(field)
                    .with_message(message)
            }

            MapError::UnknownField { entity, field } => ExError::new(ExErrorKind::UnknownField)
                .with_op("resolve")
                .with_entity(entity)
                .with_field(field)
                .with_message(message),

            MapError::RegistryNotSealed => ExError::new(ExErrorKind::RegistryNotSealed)
                .with_op("open_session")
                .with_message(message),

            MapError::UnknownEntity { entity } => ExError::new(ExErrorKind::NotFound)
                .with_op("lookup")
                .with_entity(entity)
                .with_message(message),

            MapError::UnknownRelation { entity, relation } => ExError::new(ExErrorKind::NotFound)
                .with_op("load_related")
                .with_entity(entity)
                .with_field(relation)
                .with_message(message),

            MapError::ValidationError { entity, violations } => {
                let mut ex = ExError::new(ExErrorKind::ValidationFailed)
                    .with_op("stage")
                    .with_entity(entity)
                    .with_message(message);
                if let [only] = violations.as_slice() {
                    ex = ex.with_field(only.field.clone());
                }
                ex
            }

            MapError::ReadOnlyFieldWrite { entity, fields } => {
                ExError::new(ExErrorKind::ReadOnlyField)
                    .with_op("stage")
                    .with_entity(entity)
                    .with_field(fields.join(","))
                    .with_message(message)
            }

            MapError::CommitFailure {
                session_id, cause, ..
            } => ExError::new(ExErrorKind::CommitFailed)
                .with_op("commit")
                .with_session_id(SessionId::from_string(session_id))
                .with_message(message)
                .with_source(cause.into()),

            MapError::StoreUnavailable { cause } => ExError::new(ExErrorKind::Persistence)
                .with_op("store")
                .with_message(message)
                .with_source(cause.into()),

            MapError::SessionClosed { session_id, .. } => {
                ExError::new(ExErrorKind::SessionClosed)
                    .with_session_id(SessionId::from_string(session_id))
                    .with_message(message)
            }

            MapError::Internal { .. } => ExError::new(ExErrorKind::Internal).with_message(message),
        }
    }
}
