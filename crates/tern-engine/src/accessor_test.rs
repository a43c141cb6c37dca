use super::*;
use serde_json::json;
use tern_core::{DatabaseAlias, EntityName, FieldState, SchemaChange};
use tern_db::{DuckDbBackend, SchemaEditor};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

async fn setup() -> (DuckDbBackend, ProjectState, Namespace) {
    let ns = Namespace::new("shop");
    let mut state = ProjectState::new();
    SchemaChange::CreateEntity {
        name: EntityName::new("product"),
        table: None,
        fields: vec![
            FieldState::new("id", FieldType::Integer).primary_key(),
            FieldState::new("name", FieldType::Text),
            FieldState::new("price", FieldType::Float).nullable(),
            FieldState::new("ref", FieldType::Uuid).nullable(),
        ],
    }
    .state_forward(&ns, &mut state)
    .unwrap();

    let db = DuckDbBackend::in_memory(DatabaseAlias::new("default")).unwrap();
    db.create_entity(state.require_entity("shop", "product").unwrap())
        .await
        .unwrap();
    (db, state, ns)
}

#[tokio::test]
async fn test_crud_through_handle() {
    let (db, state, ns) = setup().await;
    let models = ModelAccessor::new(&state, &ns, &db);
    let products = models.entity("product").unwrap();
    assert_eq!(products.table(), "shop_product");

    products
        .insert(&row(&[("id", json!(1)), ("name", json!("pen"))]))
        .await
        .unwrap();
    products
        .insert(&row(&[
            ("id", json!(2)),
            ("name", json!("ink")),
            ("price", json!(2.5)),
        ]))
        .await
        .unwrap();
    assert_eq!(products.count().await.unwrap(), 2);

    let updated = products
        .update(&json!(1), &row(&[("price", json!(1.25))]))
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let pen = products.get(&row(&[("id", json!(1))])).await.unwrap();
    assert_eq!(pen["price"], json!(1.25));

    let deleted = products.delete(&row(&[("name", json!("ink"))])).await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(products.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_entity() {
    let (db, state, ns) = setup().await;
    let models = ModelAccessor::new(&state, &ns, &db);
    let err = models.entity("order").err().unwrap();
    assert!(matches!(
        err,
        EngineError::Core(tern_core::CoreError::EntityNotFound { .. })
    ));
    assert!(models.entity_in("billing", "product").is_err());
}

#[tokio::test]
async fn test_unknown_field_rejected() {
    let (db, state, ns) = setup().await;
    let products = ModelAccessor::new(&state, &ns, &db)
        .entity("product")
        .unwrap();

    let err = products
        .insert(&row(&[("id", json!(1)), ("name", json!("pen")), ("colour", json!("red"))]))
        .await
        .unwrap_err();
    match err {
        EngineError::VirtualShape { entity, message } => {
            assert_eq!(entity, "shop.product");
            assert!(message.contains("colour"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(products
        .filter(&row(&[("colour", json!("red"))]))
        .await
        .is_err());
}

#[tokio::test]
async fn test_null_and_type_checks() {
    let (db, state, ns) = setup().await;
    let products = ModelAccessor::new(&state, &ns, &db)
        .entity("product")
        .unwrap();

    // null only fails on writes to non-nullable fields
    let err = products
        .insert(&row(&[("id", json!(1)), ("name", Value::Null)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::VirtualShape { .. }));
    assert!(products
        .filter(&row(&[("price", Value::Null)]))
        .await
        .unwrap()
        .is_empty());

    let err = products
        .insert(&row(&[("id", json!("one")), ("name", json!("pen"))]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("integer"));

    let err = products
        .insert(&row(&[
            ("id", json!(1)),
            ("name", json!("pen")),
            ("ref", json!("not-a-uuid")),
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::VirtualShape { .. }));

    products
        .insert(&row(&[
            ("id", json!(1)),
            ("name", json!("pen")),
            ("ref", json!("6f1c1a8e-3a2b-4c6d-9e0f-1a2b3c4d5e6f")),
        ]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_requires_single_row() {
    let (db, state, ns) = setup().await;
    let products = ModelAccessor::new(&state, &ns, &db)
        .entity("product")
        .unwrap();
    let err = products.get(&row(&[("id", json!(7))])).await.unwrap_err();
    assert!(err.to_string().contains("found 0"));
}

#[tokio::test]
async fn test_update_without_primary_key() {
    let ns = Namespace::new("shop");
    let mut state = ProjectState::new();
    SchemaChange::CreateEntity {
        name: EntityName::new("tag"),
        table: None,
        fields: vec![FieldState::new("label", FieldType::Text)],
    }
    .state_forward(&ns, &mut state)
    .unwrap();
    let db = DuckDbBackend::in_memory(DatabaseAlias::new("default")).unwrap();

    let tags = ModelAccessor::new(&state, &ns, &db).entity("tag").unwrap();
    let err = tags
        .update(&json!(1), &row(&[("label", json!("x"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPrimaryKey { .. }));
}
