//! Integration tests running the `tern` binary against a temporary project.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run a `tern` CLI command in `dir` and return (stdout, stderr, success).
fn run_tern(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_tern"))
        .arg("--project-dir")
        .arg(dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute tern with args {:?}: {}", args, e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "tern.yml",
        r#"
name: shop
default_database: primary
databases:
  primary: { path: primary.duckdb }
  analytics: { path: analytics.duckdb }
routers:
  - { name: by_hint, priority: 10, type: hint, key: target_db }
"#,
    );
    write(
        root,
        "migrations/shop/0001_initial.yml",
        r#"
initial: true
operations:
  - op: create_entity
    name: product
    fields:
      - { name: id, type: integer }
      - { name: name, type: text }
"#,
    );
    write(
        root,
        "migrations/shop/0002_sku.yml",
        r#"
dependencies: ["0001_initial"]
operations:
  - op: add_field
    entity: product
    field: { name: sku, type: text, nullable: true }
  - op: run_sql
    sql: ["INSERT INTO shop_product (id, name, sku) VALUES (1, 'pen', 'P-1')"]
    reverse_sql: ["DELETE FROM shop_product"]
"#,
    );
    write(
        root,
        "migrations/stats/0001_initial.yml",
        r#"
initial: true
hints: { target_db: analytics }
operations:
  - op: create_entity
    name: hit
    fields: [{ name: at, type: timestamp }]
"#,
    );
    dir
}

fn keys(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_plan_json() {
    let dir = project();
    let (stdout, stderr, ok) = run_tern(dir.path(), &["plan", "--json"]);
    assert!(ok, "plan failed: {stderr}");

    let plan: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(plan["database"], "primary");
    assert_eq!(plan["direction"], "forward");
    assert_eq!(
        keys(&plan["migrations"]),
        vec!["shop.0001_initial", "shop.0002_sku"]
    );
}

#[test]
fn test_migrate_status_and_rollback() {
    let dir = project();
    let (_, stderr, ok) = run_tern(dir.path(), &["migrate"]);
    assert!(ok, "migrate failed: {stderr}");

    let (stdout, _, ok) = run_tern(dir.path(), &["status", "--database", "primary", "--json"]);
    assert!(ok);
    let status: Value = serde_json::from_str(&stdout).unwrap();
    let ledger = status["primary"]["ledger"].as_array().unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|e| e["status"] == "applied"));
    assert_eq!(keys(&status["primary"]["pending"]), vec!["stats.0001_initial"]);

    let (stdout, _, ok) = run_tern(dir.path(), &["plan", "--backward", "--json"]);
    assert!(ok);
    let plan: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        keys(&plan["migrations"]),
        vec!["shop.0002_sku", "shop.0001_initial"]
    );

    let (_, stderr, ok) = run_tern(dir.path(), &["rollback", "--target", "shop.0001_initial"]);
    assert!(ok, "rollback failed: {stderr}");
    let (stdout, _, _) = run_tern(dir.path(), &["status", "-d", "primary", "--json"]);
    let status: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["primary"]["ledger"].as_array().unwrap().len(), 1);
}

#[test]
fn test_migrate_all() {
    let dir = project();
    let (_, stderr, ok) = run_tern(dir.path(), &["migrate", "--all"]);
    assert!(ok, "migrate --all failed: {stderr}");

    let (stdout, _, ok) = run_tern(dir.path(), &["status", "--json"]);
    assert!(ok);
    let status: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["analytics"]["ledger"].as_array().unwrap().len(), 3);
    assert_eq!(status["primary"]["ledger"].as_array().unwrap().len(), 2);
}

#[test]
fn test_resolve_and_state() {
    let dir = project();
    let (_, stderr, ok) = run_tern(
        dir.path(),
        &["resolve", "--database", "primary", "shop.0001_initial", "--mark-applied"],
    );
    assert!(ok, "resolve failed: {stderr}");

    let (stdout, _, ok) = run_tern(dir.path(), &["plan", "--json"]);
    assert!(ok);
    let plan: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(keys(&plan["migrations"]), vec!["shop.0002_sku"]);

    let (stdout, _, ok) = run_tern(dir.path(), &["state", "--target", "shop.0001_initial"]);
    assert!(ok);
    let state: Value = serde_json::from_str(&stdout).unwrap();
    let entities = state.as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["table"], "shop_product");
}

#[test]
fn test_errors_exit_non_zero() {
    let dir = project();
    let (_, stderr, ok) = run_tern(dir.path(), &["plan", "--target", "nonsense"]);
    assert!(!ok);
    assert!(stderr.contains("Invalid target"));

    let (_, _, ok) = run_tern(dir.path(), &["migrate", "--database", "nowhere"]);
    assert!(!ok);

    let empty = TempDir::new().unwrap();
    let (_, stderr, ok) = run_tern(empty.path(), &["status"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to load configuration"));
}
