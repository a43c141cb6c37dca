use super::*;
use serde_json::json;
use tern_core::{EntityName, Namespace};

fn entity(fields: &[FieldState]) -> EntityState {
    EntityState::new(
        &Namespace::new("shop"),
        &EntityName::new("product"),
        None,
        fields,
    )
    .unwrap()
}

#[test]
fn test_quote_ident_escapes_quotes() {
    assert_eq!(quote_ident("name"), "\"name\"");
    assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    assert_eq!(quote_literal("it's"), "'it''s'");
}

#[test]
fn test_sql_literal() {
    assert_eq!(sql_literal(&json!(null), FieldType::Text), "NULL");
    assert_eq!(sql_literal(&json!(true), FieldType::Boolean), "TRUE");
    assert_eq!(sql_literal(&json!(42), FieldType::Integer), "42");
    assert_eq!(sql_literal(&json!("a'b"), FieldType::Text), "'a''b'");
    assert_eq!(
        sql_literal(&json!("2024-01-01 00:00:00"), FieldType::Timestamp),
        "CAST('2024-01-01 00:00:00' AS TIMESTAMP)"
    );
}

#[test]
fn test_create_entity_with_unique_index() {
    let product = entity(&[
        FieldState::new("id", FieldType::Integer).primary_key(),
        FieldState::new("sku", FieldType::Text).unique(),
        FieldState::new("note", FieldType::Text)
            .nullable()
            .with_default("n/a"),
    ]);
    let statements = create_entity(&product);
    assert_eq!(
        statements,
        vec![
            "CREATE TABLE \"shop_product\" (\"id\" INTEGER PRIMARY KEY, \"note\" VARCHAR DEFAULT 'n/a', \"sku\" VARCHAR NOT NULL)",
            "CREATE UNIQUE INDEX \"uq_shop_product_sku\" ON \"shop_product\" (\"sku\")",
        ]
    );
}

#[test]
fn test_add_not_null_field_sets_constraint_after_adding() {
    let before = entity(&[FieldState::new("id", FieldType::Integer)]);
    let field = FieldState::new("qty", FieldType::Integer).with_default(0);
    let after = entity(&[FieldState::new("id", FieldType::Integer), field.clone()]);

    let statements = add_field(&before, &after, &field).unwrap();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE \"shop_product\" ADD COLUMN \"qty\" INTEGER DEFAULT 0",
            "ALTER TABLE \"shop_product\" ALTER COLUMN \"qty\" SET NOT NULL",
        ]
    );
}

#[test]
fn test_add_primary_key_not_supported() {
    let before = entity(&[]);
    let field = FieldState::new("id", FieldType::Integer).primary_key();
    let after = entity(&[field.clone()]);
    assert!(matches!(
        add_field(&before, &after, &field),
        Err(DbError::NotSupported { .. })
    ));
}

#[test]
fn test_alter_field_to_unique_not_null() {
    let old = FieldState::new("sku", FieldType::Text).nullable();
    let new = FieldState::new("sku", FieldType::Text).unique();
    let before = entity(&[old.clone()]);
    let after = entity(&[new.clone()]);

    let statements = alter_field(&before, &after, &old, &new).unwrap();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE \"shop_product\" ALTER COLUMN \"sku\" SET NOT NULL",
            "CREATE UNIQUE INDEX \"uq_shop_product_sku\" ON \"shop_product\" (\"sku\")",
        ]
    );

    // and back again
    let statements = alter_field(&after, &before, &new, &old).unwrap();
    assert_eq!(
        statements,
        vec![
            "DROP INDEX IF EXISTS \"uq_shop_product_sku\"",
            "ALTER TABLE \"shop_product\" ALTER COLUMN \"sku\" DROP NOT NULL",
        ]
    );
}

#[test]
fn test_alter_without_changes_is_empty() {
    let field = FieldState::new("sku", FieldType::Text);
    let state = entity(&[field.clone()]);
    assert!(alter_field(&state, &state, &field, &field)
        .unwrap()
        .is_empty());
}

#[test]
fn test_rename_entity_moves_indexes() {
    let sku = FieldState::new("sku", FieldType::Text).unique();
    let before = entity(&[sku.clone()]);
    let after = EntityState::new(
        &Namespace::new("shop"),
        &EntityName::new("item"),
        None,
        &[sku],
    )
    .unwrap();

    assert_eq!(
        rename_entity(&before, &after),
        vec![
            "DROP INDEX IF EXISTS \"uq_shop_product_sku\"",
            "ALTER TABLE \"shop_product\" RENAME TO \"shop_item\"",
            "CREATE UNIQUE INDEX \"uq_shop_item_sku\" ON \"shop_item\" (\"sku\")",
        ]
    );
    assert!(rename_entity(&before, &before).is_empty());
}

#[test]
fn test_row_clauses() {
    let product = entity(&[
        FieldState::new("id", FieldType::Integer),
        FieldState::new("sku", FieldType::Text).nullable(),
        FieldState::new("created", FieldType::Timestamp),
    ]);
    let mut filter = Row::new();
    filter.insert("id".into(), json!(3));
    filter.insert("sku".into(), json!(null));

    assert_eq!(
        where_clause(&product, &filter),
        " WHERE \"id\" = 3 AND \"sku\" IS NULL"
    );
    assert_eq!(where_clause(&product, &Row::new()), "");
    assert_eq!(
        select_list(&product),
        "CAST(\"created\" AS VARCHAR) AS \"created\", \"id\", \"sku\""
    );

    let mut row = Row::new();
    row.insert("id".into(), json!(1));
    row.insert("sku".into(), json!("x"));
    assert_eq!(
        insert(&product, &row),
        "INSERT INTO \"shop_product\" (\"id\", \"sku\") VALUES (1, 'x')"
    );
    assert_eq!(set_clause(&product, &row), "\"id\" = 1, \"sku\" = 'x'");
}
