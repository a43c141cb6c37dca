use super::*;
use crate::operation::{DataChange, OperationKind};
use tempfile::TempDir;
use tern_core::FieldType;

const INITIAL: &str = r#"
initial: true
operations:
  - op: create_entity
    name: product
    fields:
      - { name: id, type: integer, primary_key: true }
      - { name: name, type: text }
"#;

const SKU: &str = r#"
dependencies: ["0001_initial"]
atomic: false
hints: { target_db: primary }
operations:
  - op: add_field
    entity: product
    field: { name: sku, type: text, nullable: true }
  - op: run_sql
    sql: ["UPDATE shop_product SET sku = 'x'"]
    reverse_sql: []
    hints: { target_db: secondary }
  - op: alter_field
    entity: product
    field: { name: sku, type: text, unique: true }
"#;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_parse_migration() {
    let ns = Namespace::new("shop");
    let migration = parse_migration(&ns, "0002_sku", SKU).unwrap();

    assert_eq!(migration.key, MigrationKey::new("shop", "0002_sku"));
    assert!(!migration.atomic);
    assert!(!migration.initial);
    assert!(migration
        .dependencies
        .contains(&MigrationKey::new("shop", "0001_initial")));
    assert_eq!(migration.hints.get_str("target_db"), Some("primary"));
    assert_eq!(migration.operations.len(), 3);

    match &migration.operations[1].kind {
        OperationKind::Data(DataChange::Sql { forward, backward }) => {
            assert_eq!(forward.len(), 1);
            assert_eq!(backward.as_deref(), Some(&[][..]));
        }
        other => panic!("unexpected operation: {other:?}"),
    }
    assert_eq!(
        migration.operations[1].hints.get_str("target_db"),
        Some("secondary")
    );

    match &migration.operations[2].kind {
        OperationKind::Schema(SchemaChange::AlterField { field, .. }) => {
            assert_eq!(field.field_type, FieldType::Text);
            assert!(field.unique);
            assert!(!field.nullable);
        }
        other => panic!("unexpected operation: {other:?}"),
    }
}

#[test]
fn test_parse_defaults() {
    let ns = Namespace::new("shop");
    let migration = parse_migration(&ns, "0001_initial", INITIAL).unwrap();
    assert!(migration.initial);
    assert!(migration.atomic);
    assert!(migration.dependencies.is_empty());
    assert!(migration.is_reversible());
}

#[test]
fn test_sql_without_reverse_is_irreversible() {
    let ns = Namespace::new("shop");
    let yaml = "operations:\n  - { op: run_sql, sql: [\"DELETE FROM shop_product\"] }\n";
    let migration = parse_migration(&ns, "0003_purge", yaml).unwrap();
    assert!(!migration.is_reversible());
}

#[test]
fn test_parse_errors() {
    let ns = Namespace::new("shop");
    let err = parse_migration(&ns, "0001", "operations:\n  - { op: explode }\n").unwrap_err();
    assert!(matches!(err, EngineError::MigrationLoad { .. }));

    let err = parse_migration(&ns, "0001", "unknown_key: 1\n").unwrap_err();
    assert!(err.to_string().contains("shop.0001"));
}

#[test]
fn test_load_migrations_from_tree() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrations/shop/0001_initial.yml", INITIAL);
    write(dir.path(), "migrations/shop/0002_sku.yaml", SKU);
    write(dir.path(), "migrations/shop/README.md", "notes");
    write(
        dir.path(),
        "migrations/billing/0001_initial.yml",
        "dependencies: [shop.0001_initial]\n",
    );

    let migrations = load_migrations(&[
        dir.path().join("migrations"),
        dir.path().join("does_not_exist"),
    ])
    .unwrap();
    let keys: Vec<String> = migrations.iter().map(|m| m.key.to_string()).collect();
    assert_eq!(
        keys,
        vec!["billing.0001_initial", "shop.0001_initial", "shop.0002_sku"]
    );
    assert!(migrations[0]
        .dependencies
        .contains(&MigrationKey::new("shop", "0001_initial")));
}

#[test]
fn test_load_reports_file_path() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrations/shop/0001.yml", "operations: 12\n");
    let err = load_migrations(&[dir.path().join("migrations")]).unwrap_err();
    match err {
        EngineError::MigrationLoad { path, .. } => assert!(path.ends_with("0001.yml")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_dotted_namespace_directory_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "migrations/my.app/0001.yml", "operations: []\n");
    let err = load_migrations(&[dir.path().join("migrations")]).unwrap_err();
    match err {
        EngineError::MigrationLoad { path, message } => {
            assert!(path.ends_with("0001.yml"));
            assert!(message.contains("my.app"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
