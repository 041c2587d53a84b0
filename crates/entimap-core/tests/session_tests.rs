#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use entimap_core::{
    ChangeOperation, ConnectionDescriptor, EntityInstance, EntityRegistry, FailAfterHook,
    LoadOptions, MapError, MemoryConnector, RejectionKind, SessionFactory, SessionState, Value,
    ViolationKind,
};

#[test]
fn test_round_trip_science_fiction_category() {
    // GIVEN a session over Category { Id: int(auto), Name: string(50) }
    let factory = common::memory_factory(vec![common::category()]);
    let mut session = factory.open_session().unwrap();

    // WHEN an insert with Name = "Science Fiction" is staged and committed
    let change = session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Category").with("Name", "Science Fiction"),
        )
        .unwrap();
    let receipt = session.commit().unwrap();

    // THEN the receipt carries a non-zero generated Id
    let committed = receipt.instance(change).unwrap();
    let id = committed.get("Id").cloned().unwrap();
    assert!(matches!(id, Value::Integer(n) if n > 0));

    // AND a lookup returns the stored record
    let found = session.find("Category", &[id]).unwrap().unwrap();
    assert_eq!(
        found.get("Name"),
        Some(&Value::String("Science Fiction".to_string()))
    );
    assert_eq!(session.state(), SessionState::Committed);
}

#[test]
fn test_generated_key_is_not_visible_before_commit() {
    // GIVEN a staged insert
    let factory = common::memory_factory(vec![common::category()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Category").with("Name", "Poetry"),
        )
        .unwrap();

    // THEN the staged instance still has no key
    assert!(session.staged()[0].instance().get("Id").is_none());
    assert!(session.staged()[0].values.get("Id").is_none());
}

#[test]
fn test_validation_reports_every_violation() {
    // GIVEN a Blog session
    let factory = common::memory_factory(vec![common::blog(), common::post()]);
    let mut session = factory.open_session().unwrap();

    // WHEN an insert with a wrong type, a too long url and an unknown field is staged
    let long_url = "x".repeat(201);
    let result = session.stage(
        ChangeOperation::Insert,
        EntityInstance::new("Blog")
            .with("url", long_url)
            .with("Rating", "five")
            .with("Owner", "ann"),
    );

    // THEN all three violations are listed
    let violations = match result {
        Err(MapError::ValidationError { violations, .. }) => violations,
        other => panic!("expected ValidationError, got {:?}", other),
    };
    assert_eq!(violations.len(), 3);
    assert!(violations
        .iter()
        .any(|v| v.field == "Owner" && v.kind == ViolationKind::UnknownField));
    assert!(violations.iter().any(|v| v.field == "Rating"
        && matches!(v.kind, ViolationKind::TypeMismatch { .. })));
    assert!(violations.iter().any(|v| v.field == "url"
        && v.kind
            == ViolationKind::MaxLengthExceeded {
                max: 200,
                actual: 201
            }));

    // AND nothing was queued
    assert!(session.staged().is_empty());
}

#[test]
fn test_missing_required_field_and_null() {
    let factory = common::memory_factory(vec![common::blog(), common::post()]);
    let mut session = factory.open_session().unwrap();

    let missing = session.stage(ChangeOperation::Insert, EntityInstance::new("Blog"));
    assert!(matches!(missing, Err(MapError::ValidationError { ref violations, .. })
        if violations[0].field == "url" && violations[0].kind == ViolationKind::MissingRequired));

    let null = session.stage(
        ChangeOperation::Insert,
        EntityInstance::new("Blog").with("url", Value::Null),
    );
    assert!(matches!(null, Err(MapError::ValidationError { ref violations, .. })
        if violations[0].kind == ViolationKind::NullNotAllowed));
}

#[test]
fn test_ignored_field_is_dropped_silently() {
    // GIVEN a Blog instance carrying its ignored dateTime field
    let factory = common::memory_factory(vec![common::blog(), common::post()]);
    let mut session = factory.open_session().unwrap();
    let instance = EntityInstance::new("Blog")
        .with("url", "https://blog.example")
        .with("dateTime", chrono::Utc::now());

    // WHEN staged
    session.stage(ChangeOperation::Insert, instance).unwrap();

    // THEN it is accepted and the ignored value is not stored
    assert!(session.staged()[0].values.get("dateTime").is_none());
}

#[test]
fn test_write_to_computed_field_is_rejected() {
    // GIVEN an Author session
    let factory = common::memory_factory(vec![common::author()]);
    let mut session = factory.open_session().unwrap();

    // WHEN an insert sets DisplayName
    let result = session.stage(
        ChangeOperation::Insert,
        EntityInstance::new("Author")
            .with("FirstName", "Ursula")
            .with("DisplayName", "Le Guin, Ursula"),
    );

    // THEN ReadOnlyFieldWrite lists it
    assert_eq!(
        result.unwrap_err(),
        MapError::ReadOnlyFieldWrite {
            entity: "Author".to_string(),
            fields: vec!["DisplayName".to_string()]
        }
    );
}

#[test]
fn test_defaults_apply_on_insert() {
    // GIVEN Book with Rating default 2 and PublishOn default GETDATE()
    let factory = common::memory_factory(vec![common::book()]);
    let mut session = factory.open_session().unwrap();

    // WHEN a book is inserted with only its key and title
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Book")
                .with("Bookkey", 7)
                .with("Title", "Dune"),
        )
        .unwrap();
    session.commit().unwrap();

    // THEN the stored row carries both defaults
    let book = session.find("Book", &[Value::Integer(7)]).unwrap().unwrap();
    assert_eq!(book.get("Rating"), Some(&Value::Integer(2)));
    assert!(matches!(book.get("PublishOn"), Some(Value::DateTime(_))));
}

#[test]
fn test_failure_midway_applies_nothing() {
    // GIVEN a store that rejects the third change of a batch
    let registry = common::sealed_registry(vec![common::category()]);
    let connector = MemoryConnector::new().with_apply_hook(Arc::new(FailAfterHook::new(2)));
    let factory =
        SessionFactory::new(registry, connector, ConnectionDescriptor::in_memory()).unwrap();
    let mut session = factory.open_session().unwrap();

    // AND three staged inserts
    for name in ["Drama", "Poetry", "History"] {
        session
            .stage(
                ChangeOperation::Insert,
                EntityInstance::new("Category").with("Name", name),
            )
            .unwrap();
    }

    // WHEN committed
    let result = session.commit();

    // THEN CommitFailure preserves the store cause
    match result {
        Err(MapError::CommitFailure { staged, cause, .. }) => {
            assert_eq!(staged, 3);
            assert_eq!(cause.kind, RejectionKind::Other);
        }
        other => panic!("expected CommitFailure, got {:?}", other),
    }

    // AND none of the rows exist
    for id in 1..=3 {
        assert!(session
            .find("Category", &[Value::Integer(id)])
            .unwrap()
            .is_none());
    }

    // AND the session is still open with its changes staged
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.staged().len(), 3);
}

#[test]
fn test_unique_violation_then_retry_after_fix() {
    // GIVEN a committed Car with plate ABC-1
    let factory = common::memory_factory(vec![common::car(), common::record_of_sales()]);
    let mut first = factory.open_session().unwrap();
    first
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Car")
                .with("LicensePlate", "ABC-1")
                .with("Status", "new"),
        )
        .unwrap();
    first.commit().unwrap();

    // WHEN another session inserts the same plate
    let mut second = factory.open_session().unwrap();
    second
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Car")
                .with("LicensePlate", "ABC-1")
                .with("Status", "used"),
        )
        .unwrap();
    let result = second.commit();

    // THEN the commit fails with a unique violation and the session stays open
    assert!(matches!(
        result,
        Err(MapError::CommitFailure { ref cause, .. }) if cause.kind == RejectionKind::UniqueViolation
    ));
    assert_eq!(second.state(), SessionState::Open);

    // AND after rolling back a fresh session can insert a distinct plate
    second.rollback().unwrap();
    let mut third = factory.open_session().unwrap();
    third
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Car")
                .with("LicensePlate", "ABC-2")
                .with("Status", "used"),
        )
        .unwrap();
    let receipt = third.commit().unwrap();
    assert_eq!(receipt.len(), 1);
}

#[test]
fn test_rollback_discards_and_closes() {
    // GIVEN a session with a staged insert
    let factory = common::memory_factory(vec![common::category()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Category").with("Name", "Drama"),
        )
        .unwrap();

    // WHEN rolled back
    session.rollback().unwrap();

    // THEN the session is closed and further use fails
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.staged().is_empty());
    assert!(matches!(
        session.commit(),
        Err(MapError::SessionClosed { .. })
    ));
    assert!(matches!(
        session.find("Category", &[Value::Integer(1)]),
        Err(MapError::SessionClosed { .. })
    ));

    // AND nothing reached the store
    let reader = factory.open_session().unwrap();
    assert!(reader
        .find("Category", &[Value::Integer(1)])
        .unwrap()
        .is_none());
}

#[test]
fn test_dropping_open_session_discards_changes() {
    let factory = common::memory_factory(vec![common::category()]);
    {
        let mut session = factory.open_session().unwrap();
        session
            .stage(
                ChangeOperation::Insert,
                EntityInstance::new("Category").with("Name", "Drama"),
            )
            .unwrap();
    }

    let reader = factory.open_session().unwrap();
    assert!(reader
        .find("Category", &[Value::Integer(1)])
        .unwrap()
        .is_none());
}

#[test]
fn test_committed_session_rejects_staging_but_allows_reads() {
    let factory = common::memory_factory(vec![common::category()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Category").with("Name", "Drama"),
        )
        .unwrap();
    session.commit().unwrap();

    let result = session.stage(
        ChangeOperation::Insert,
        EntityInstance::new("Category").with("Name", "Poetry"),
    );
    assert!(matches!(result, Err(MapError::SessionClosed { ref state, .. }) if state == "committed"));
    assert!(session.rollback().is_err());
    assert!(session
        .find("Category", &[Value::Integer(1)])
        .unwrap()
        .is_some());
}

#[test]
fn test_update_and_delete() {
    // GIVEN a committed category
    let factory = common::memory_factory(vec![common::category()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Category").with("Name", "Drama"),
        )
        .unwrap();
    session.commit().unwrap();

    // WHEN it is renamed in one session
    let mut update = factory.open_session().unwrap();
    update
        .stage(
            ChangeOperation::Update,
            EntityInstance::new("Category")
                .with("Id", 1)
                .with("Name", "Stage Drama"),
        )
        .unwrap();
    update.commit().unwrap();

    // THEN the new name is visible
    let found = update.find("Category", &[Value::Integer(1)]).unwrap().unwrap();
    assert_eq!(found.get("Name").and_then(Value::as_str), Some("Stage Drama"));

    // WHEN it is deleted in another
    let mut delete = factory.open_session().unwrap();
    delete
        .stage(
            ChangeOperation::Delete,
            EntityInstance::new("Category").with("Id", 1),
        )
        .unwrap();
    delete.commit().unwrap();

    // THEN it is gone
    assert!(delete
        .find("Category", &[Value::Integer(1)])
        .unwrap()
        .is_none());
}

#[test]
fn test_update_of_missing_row_fails() {
    let factory = common::memory_factory(vec![common::category()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Update,
            EntityInstance::new("Category")
                .with("Id", 42)
                .with("Name", "Ghost"),
        )
        .unwrap();

    assert!(matches!(
        session.commit(),
        Err(MapError::CommitFailure { ref cause, .. }) if cause.kind == RejectionKind::RowNotFound
    ));
}

#[test]
fn test_foreign_key_must_reference_existing_principal() {
    let factory = common::memory_factory(vec![common::blog(), common::post()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Post")
                .with("Title", "Orphan")
                .with("BlogId", 99),
        )
        .unwrap();

    assert!(matches!(
        session.commit(),
        Err(MapError::CommitFailure { ref cause, .. })
            if cause.kind == RejectionKind::ForeignKeyViolation
    ));
}

#[test]
fn test_load_related_in_both_directions() {
    // GIVEN a blog with two posts committed in one batch
    let factory = common::memory_factory(vec![common::blog(), common::post()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Blog")
                .with("Id", 1)
                .with("url", "https://blog.example"),
        )
        .unwrap();
    for title in ["First", "Second"] {
        session
            .stage(
                ChangeOperation::Insert,
                EntityInstance::new("Post")
                    .with("Title", title)
                    .with("BlogId", 1),
            )
            .unwrap();
    }
    session.commit().unwrap();

    // WHEN the blog is loaded with its posts
    let loaded = session
        .find_with("Blog", &[Value::Integer(1)], &LoadOptions::new().include("Post"))
        .unwrap()
        .unwrap();

    // THEN both posts are attached
    assert_eq!(loaded.related("Post").len(), 2);

    // AND a post navigates back to its blog
    let post = &loaded.related("Post")[0];
    let blogs = session.load_related(post, "Blog").unwrap();
    assert_eq!(blogs.len(), 1);
    assert_eq!(
        blogs[0].get("url").and_then(Value::as_str),
        Some("https://blog.example")
    );

    // AND unknown navigations are reported
    assert!(matches!(
        session.load_related(post, "Comments"),
        Err(MapError::UnknownRelation { .. })
    ));
}

#[test]
fn test_computed_field_reads_back_as_null() {
    let factory = common::memory_factory(vec![common::author()]);
    let mut session = factory.open_session().unwrap();
    let change = session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Author")
                .with("FirstName", "Ursula")
                .with("LastName", "Le Guin"),
        )
        .unwrap();
    let receipt = session.commit().unwrap();
    let id = receipt.instance(change).unwrap().get("Id").cloned().unwrap();

    let author = session.find("Author", &[id]).unwrap().unwrap();
    assert_eq!(author.get("DisplayName"), Some(&Value::Null));
}

#[test]
fn test_factory_requires_sealed_registry() {
    let mut registry = EntityRegistry::new();
    registry.register(common::category()).unwrap();

    let result = SessionFactory::new(
        Arc::new(registry),
        MemoryConnector::new(),
        ConnectionDescriptor::in_memory(),
    );
    assert_eq!(result.unwrap_err(), MapError::RegistryNotSealed);
}

#[test]
fn test_factory_surfaces_configuration_errors() {
    let tag = entimap_core::EntityDefinition::builder("Tag")
        .field(entimap_core::FieldDefinition::string("Label"))
        .build();
    let result = SessionFactory::new(
        common::sealed_registry(vec![tag]),
        MemoryConnector::new(),
        ConnectionDescriptor::in_memory(),
    );
    assert!(matches!(result, Err(MapError::NoPrimaryKey { .. })));
}

#[test]
fn test_explicit_auto_key_value_is_kept() {
    let factory = common::memory_factory(vec![common::category()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Category")
                .with("Id", 10)
                .with("Name", "Drama"),
        )
        .unwrap();
    let change = session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Category").with("Name", "Poetry"),
        )
        .unwrap();
    let receipt = session.commit().unwrap();

    assert_eq!(
        receipt.instance(change).unwrap().get("Id"),
        Some(&Value::Integer(11))
    );
}

#[test]
fn test_changing_a_referenced_alternate_key_is_rejected() {
    // GIVEN a car with a sales record pointing at its license plate
    let factory = common::memory_factory(vec![common::car(), common::record_of_sales()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Car")
                .with("Model", "Coupe")
                .with("LicensePlate", "XYZ-9")
                .with("Status", "sold"),
        )
        .unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("RecordOfSales").with("CarLicensePlate", "XYZ-9"),
        )
        .unwrap();
    session.commit().unwrap();

    // WHEN the plate is changed
    let mut update = factory.open_session().unwrap();
    update
        .stage(
            ChangeOperation::Update,
            EntityInstance::new("Car")
                .with("CarId", 1)
                .with("LicensePlate", "ABC-1"),
        )
        .unwrap();

    // THEN the commit fails like a delete of the referenced row would
    assert!(matches!(
        update.commit(),
        Err(MapError::CommitFailure { ref cause, .. })
            if cause.kind == RejectionKind::ForeignKeyViolation
    ));

    // AND the car keeps its plate
    let reader = factory.open_session().unwrap();
    let car = reader.find("Car", &[Value::Integer(1)]).unwrap().unwrap();
    assert_eq!(car.get("LicensePlate").and_then(Value::as_str), Some("XYZ-9"));

    // AND updating a field nothing references still succeeds
    let mut status = factory.open_session().unwrap();
    status
        .stage(
            ChangeOperation::Update,
            EntityInstance::new("Car")
                .with("CarId", 1)
                .with("Status", "returned"),
        )
        .unwrap();
    status.commit().unwrap();
}

#[test]
fn test_find_rejects_key_of_the_wrong_type() {
    // GIVEN a committed genre with a generated byte key
    let factory = common::memory_factory(vec![common::genre()]);
    let mut session = factory.open_session().unwrap();
    session
        .stage(
            ChangeOperation::Insert,
            EntityInstance::new("Genre").with("Label", "Noir"),
        )
        .unwrap();
    session.commit().unwrap();

    // WHEN it is looked up with an integer key
    let result = session.find("Genre", &[Value::Integer(1)]);

    // THEN the key is reported as a type mismatch instead of a miss
    let violations = match result {
        Err(MapError::ValidationError { violations, .. }) => violations,
        other => panic!("expected ValidationError, got {:?}", other),
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field, "Id");
    assert!(matches!(violations[0].kind, ViolationKind::TypeMismatch { .. }));

    // AND the byte key finds the row
    assert!(session
        .find("Genre", &[Value::Byte(1)])
        .unwrap()
        .is_some());
}
