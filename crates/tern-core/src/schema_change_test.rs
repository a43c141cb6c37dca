use super::*;
use crate::error::CoreError;
use crate::state::FieldType;

fn ns() -> Namespace {
    Namespace::new("shop")
}

fn create_product() -> SchemaChange {
    SchemaChange::CreateEntity {
        name: EntityName::new("product"),
        table: None,
        fields: vec![
            FieldState::new("id", FieldType::Integer).primary_key(),
            FieldState::new("name", FieldType::Text),
        ],
    }
}

fn with_product() -> ProjectState {
    let mut state = ProjectState::new();
    create_product().state_forward(&ns(), &mut state).unwrap();
    state
}

/// Fold `changes` forward, then undo them in reverse order using the
/// snapshot recorded before each change.
fn round_trip(start: &ProjectState, changes: &[SchemaChange]) -> ProjectState {
    let mut state = start.clone();
    let mut befores = Vec::new();
    for change in changes {
        befores.push(state.clone());
        change.state_forward(&ns(), &mut state).unwrap();
    }
    for (change, before) in changes.iter().zip(befores.iter()).rev() {
        change.state_backward(&ns(), &mut state, before).unwrap();
    }
    state
}

#[test]
fn test_create_entity() {
    let state = with_product();
    let product = state.require_entity("shop", "product").unwrap();
    assert_eq!(product.table, "shop_product");
    assert_eq!(product.fields.len(), 2);
}

#[test]
fn test_create_existing_entity_fails() {
    let mut state = with_product();
    let err = create_product().state_forward(&ns(), &mut state).unwrap_err();
    assert!(matches!(err, CoreError::EntityExists { .. }));
}

#[test]
fn test_add_field_to_missing_entity_fails_without_mutation() {
    let mut state = ProjectState::new();
    let change = SchemaChange::AddField {
        entity: EntityName::new("product"),
        field: FieldState::new("sku", FieldType::Text),
    };
    let err = change.state_forward(&ns(), &mut state).unwrap_err();
    assert!(matches!(err, CoreError::EntityNotFound { .. }));
    assert!(state.is_empty());
}

#[test]
fn test_add_then_alter_field() {
    let mut state = with_product();
    SchemaChange::AddField {
        entity: EntityName::new("product"),
        field: FieldState::new("sku", FieldType::Text).nullable(),
    }
    .state_forward(&ns(), &mut state)
    .unwrap();

    let intermediate = state.clone();
    SchemaChange::AlterField {
        entity: EntityName::new("product"),
        field: FieldState::new("sku", FieldType::Text).unique(),
    }
    .state_forward(&ns(), &mut state)
    .unwrap();

    let before = intermediate.require_entity("shop", "product").unwrap();
    let sku_before = before.field("sku").unwrap();
    assert!(sku_before.nullable);
    assert!(!sku_before.unique);

    let after = state.require_entity("shop", "product").unwrap();
    let sku_after = after.field("sku").unwrap();
    assert!(!sku_after.nullable);
    assert!(sku_after.unique);
}

#[test]
fn test_alter_missing_field_fails() {
    let mut state = with_product();
    let err = SchemaChange::AlterField {
        entity: EntityName::new("product"),
        field: FieldState::new("missing", FieldType::Text),
    }
    .state_forward(&ns(), &mut state)
    .unwrap_err();
    assert!(matches!(err, CoreError::FieldNotFound { .. }));
}

#[test]
fn test_rename_entity_moves_default_table() {
    let mut state = with_product();
    SchemaChange::RenameEntity {
        old_name: EntityName::new("product"),
        new_name: EntityName::new("item"),
    }
    .state_forward(&ns(), &mut state)
    .unwrap();

    assert!(state.entity("shop", "product").is_none());
    assert_eq!(state.require_entity("shop", "item").unwrap().table, "shop_item");
}

#[test]
fn test_rename_entity_keeps_custom_table() {
    let mut state = ProjectState::new();
    SchemaChange::CreateEntity {
        name: EntityName::new("product"),
        table: Some("catalog".to_string()),
        fields: vec![],
    }
    .state_forward(&ns(), &mut state)
    .unwrap();
    SchemaChange::RenameEntity {
        old_name: EntityName::new("product"),
        new_name: EntityName::new("item"),
    }
    .state_forward(&ns(), &mut state)
    .unwrap();
    assert_eq!(state.require_entity("shop", "item").unwrap().table, "catalog");
}

#[test]
fn test_rename_field_onto_existing_fails() {
    let mut state = with_product();
    let err = SchemaChange::RenameField {
        entity: EntityName::new("product"),
        old_name: FieldName::new("name"),
        new_name: FieldName::new("id"),
    }
    .state_forward(&ns(), &mut state)
    .unwrap_err();
    assert!(matches!(err, CoreError::FieldExists { .. }));
}

#[test]
fn test_reverse_of_remove_field_restores_definition() {
    let before = with_product();
    let change = SchemaChange::RemoveField {
        entity: EntityName::new("product"),
        name: FieldName::new("name"),
    };
    let reversed = change.reverse(&ns(), &before).unwrap();
    assert_eq!(
        reversed,
        SchemaChange::AddField {
            entity: EntityName::new("product"),
            field: FieldState::new("name", FieldType::Text),
        }
    );
}

#[test]
fn test_round_trip_returns_to_prior_state() {
    let start = with_product();
    let changes = vec![
        SchemaChange::AddField {
            entity: EntityName::new("product"),
            field: FieldState::new("sku", FieldType::Text).nullable(),
        },
        SchemaChange::AlterField {
            entity: EntityName::new("product"),
            field: FieldState::new("sku", FieldType::Text).unique(),
        },
        SchemaChange::RenameField {
            entity: EntityName::new("product"),
            old_name: FieldName::new("name"),
            new_name: FieldName::new("title"),
        },
        SchemaChange::RemoveField {
            entity: EntityName::new("product"),
            name: FieldName::new("title"),
        },
        SchemaChange::RenameEntity {
            old_name: EntityName::new("product"),
            new_name: EntityName::new("item"),
        },
        SchemaChange::CreateEntity {
            name: EntityName::new("order"),
            table: None,
            fields: vec![FieldState::new("id", FieldType::BigInteger).primary_key()],
        },
        SchemaChange::DeleteEntity {
            name: EntityName::new("item"),
        },
    ];

    assert_eq!(round_trip(&start, &changes), start);
}

#[test]
fn test_round_trip_from_empty_state() {
    let start = ProjectState::new();
    let changes = vec![create_product()];
    assert_eq!(round_trip(&start, &changes), start);
}

#[test]
fn test_display() {
    let change = SchemaChange::AddField {
        entity: EntityName::new("product"),
        field: FieldState::new("sku", FieldType::Text),
    };
    assert_eq!(change.to_string(), "Add field sku to product");
    assert_eq!(change.entity(), "product");
}
