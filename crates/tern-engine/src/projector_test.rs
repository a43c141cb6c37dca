use super::*;
use crate::operation::Operation;
use tern_core::{EntityName, FieldName, FieldState, FieldType, MigrationKey, SchemaChange};

fn initial() -> Migration {
    Migration::new("shop", "0001_initial")
        .initial()
        .operation(SchemaChange::CreateEntity {
            name: EntityName::new("product"),
            table: None,
            fields: vec![FieldState::new("id", FieldType::Integer).primary_key()],
        })
}

fn second() -> Migration {
    Migration::new("shop", "0002_sku")
        .depends_on(MigrationKey::new("shop", "0001_initial"))
        .operation(SchemaChange::AddField {
            entity: EntityName::new("product"),
            field: FieldState::new("sku", FieldType::Text).nullable(),
        })
        .operation(Operation::sql(vec!["UPDATE shop_product SET sku = 'x'".into()], None))
        .operation(SchemaChange::RenameField {
            entity: EntityName::new("product"),
            old_name: FieldName::new("sku"),
            new_name: FieldName::new("code"),
        })
}

#[test]
fn test_project_folds_in_order() {
    let state = project([&initial(), &second()]).unwrap();
    let product = state.require_entity("shop", "product").unwrap();
    assert!(product.field("code").is_some());
    assert!(product.field("sku").is_none());
}

#[test]
fn test_project_empty() {
    let state = project(std::iter::empty()).unwrap();
    assert!(state.is_empty());
}

#[test]
fn test_snapshots_per_operation() {
    let start = project([&initial()]).unwrap();
    let migration = second();
    let states = snapshots(&start, &migration).unwrap();
    assert_eq!(states.len(), 4);
    assert_eq!(states[0], start);

    let field_names = |i: usize| -> Vec<String> {
        states[i]
            .require_entity("shop", "product")
            .unwrap()
            .fields
            .keys()
            .map(ToString::to_string)
            .collect()
    };
    assert_eq!(field_names(1), vec!["id", "sku"]);
    // data operation leaves the state alone
    assert_eq!(states[2], states[1]);
    assert_eq!(field_names(3), vec!["code", "id"]);
}

#[test]
fn test_prefix_matches_snapshots() {
    let start = project([&initial()]).unwrap();
    let migration = second();
    let states = snapshots(&start, &migration).unwrap();
    for count in 0..=migration.operations.len() {
        assert_eq!(project_prefix(&start, &migration, count).unwrap(), states[count]);
    }
}

#[test]
fn test_earlier_snapshot_unaffected_by_later_fold() {
    let mut state = project([&initial()]).unwrap();
    let kept = state.clone();
    advance(&mut state, &second()).unwrap();
    assert!(kept
        .require_entity("shop", "product")
        .unwrap()
        .field("sku")
        .is_none());
    assert_ne!(kept, state);
}

#[test]
fn test_invalid_fold_reports_error() {
    let err = project([&second()]).unwrap_err();
    assert!(matches!(err, tern_core::CoreError::EntityNotFound { .. }));
}
