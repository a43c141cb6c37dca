use super::*;

fn key(s: &str) -> MigrationKey {
    MigrationKey::parse(s).unwrap()
}

fn deps(entries: &[(&str, &[&str])]) -> Vec<(MigrationKey, BTreeSet<MigrationKey>)> {
    entries
        .iter()
        .map(|(k, ds)| (key(k), ds.iter().map(|d| key(d)).collect()))
        .collect()
}

fn build(entries: &[(&str, &[&str])]) -> CoreResult<MigrationGraph> {
    let nodes = deps(entries);
    MigrationGraph::build(nodes.iter().map(|(k, d)| (k, d)))
}

fn names(keys: &[MigrationKey]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[test]
fn test_forward_order_respects_dependencies() {
    let graph = build(&[
        ("shop.0002_orders", &["shop.0001_initial", "auth.0001_initial"]),
        ("shop.0001_initial", &[]),
        ("auth.0001_initial", &[]),
    ])
    .unwrap();

    assert_eq!(
        names(&graph.forward_order()),
        vec!["auth.0001_initial", "shop.0001_initial", "shop.0002_orders"]
    );
}

#[test]
fn test_forward_order_is_stable_across_input_order() {
    let a = build(&[
        ("b.0001", &[]),
        ("a.0001", &[]),
        ("a.0002", &["a.0001"]),
        ("b.0002", &["b.0001"]),
    ])
    .unwrap();
    let b = build(&[
        ("b.0002", &["b.0001"]),
        ("a.0002", &["a.0001"]),
        ("a.0001", &[]),
        ("b.0001", &[]),
    ])
    .unwrap();

    assert_eq!(a.forward_order(), b.forward_order());
    assert_eq!(
        names(&a.forward_order()),
        vec!["a.0001", "b.0001", "a.0002", "b.0002"]
    );
}

#[test]
fn test_forward_order_to_target() {
    let graph = build(&[
        ("app.0001", &[]),
        ("app.0002", &["app.0001"]),
        ("app.0003", &["app.0002"]),
        ("other.0001", &[]),
    ])
    .unwrap();

    assert_eq!(
        names(&graph.forward_order_to(&key("app.0002")).unwrap()),
        vec!["app.0001", "app.0002"]
    );
    assert!(matches!(
        graph.forward_order_to(&key("app.9999")),
        Err(CoreError::MigrationNotFound { .. })
    ));
}

#[test]
fn test_circular_dependency_names_every_member() {
    let result = build(&[
        ("app.a", &["app.c"]),
        ("app.b", &["app.a"]),
        ("app.c", &["app.b"]),
        ("app.d", &[]),
    ]);

    let Err(CoreError::CircularDependency { cycle }) = result else {
        panic!("expected a cycle error");
    };
    let mut members = names(&cycle);
    members.sort();
    assert_eq!(members, vec!["app.a", "app.b", "app.c"]);
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let result = build(&[("app.a", &["app.a"])]);
    assert!(matches!(
        result,
        Err(CoreError::CircularDependency { cycle }) if cycle == vec![key("app.a")]
    ));
}

#[test]
fn test_unknown_dependency() {
    let result = build(&[("app.0002", &["app.0001"])]);
    match result {
        Err(CoreError::UnknownDependency {
            migration,
            dependency,
        }) => {
            assert_eq!(migration, key("app.0002"));
            assert_eq!(dependency, key("app.0001"));
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
}

#[test]
fn test_duplicate_migration() {
    let result = build(&[("app.0001", &[]), ("app.0001", &[])]);
    assert!(matches!(result, Err(CoreError::DuplicateMigration { .. })));
}

#[test]
fn test_ancestors_and_descendants() {
    let graph = build(&[
        ("app.raw", &[]),
        ("app.stg", &["app.raw"]),
        ("app.fct", &["app.stg"]),
        ("app.side", &["app.raw"]),
    ])
    .unwrap();

    let ancestors = graph.ancestors(&key("app.fct")).unwrap();
    assert_eq!(ancestors.len(), 2);
    assert!(ancestors.contains(&key("app.raw")));
    assert!(ancestors.contains(&key("app.stg")));

    let descendants = graph.descendants(&key("app.raw")).unwrap();
    assert_eq!(descendants.len(), 3);

    assert_eq!(
        graph.dependents(&key("app.raw")).unwrap(),
        [key("app.side"), key("app.stg")].into_iter().collect()
    );
    assert_eq!(
        graph.dependencies(&key("app.fct")).unwrap(),
        [key("app.stg")].into_iter().collect()
    );
}

#[test]
fn test_depth() {
    let graph = build(&[
        ("app.a", &[]),
        ("app.b", &["app.a"]),
        ("app.c", &["app.a", "app.b"]),
    ])
    .unwrap();
    assert_eq!(graph.depth(&key("app.a")), Some(0));
    assert_eq!(graph.depth(&key("app.b")), Some(1));
    assert_eq!(graph.depth(&key("app.c")), Some(2));
    assert_eq!(graph.depth(&key("app.x")), None);
}

#[test]
fn test_leaf_and_root_nodes() {
    let graph = build(&[
        ("auth.0001", &[]),
        ("shop.0001", &["auth.0001"]),
        ("shop.0002", &["shop.0001"]),
    ])
    .unwrap();

    // a cross-namespace dependent does not hide the auth leaf
    assert_eq!(names(&graph.leaf_nodes("auth")), vec!["auth.0001"]);
    assert_eq!(names(&graph.leaf_nodes("shop")), vec!["shop.0002"]);
    assert_eq!(names(&graph.root_nodes()), vec!["auth.0001"]);
}

#[test]
fn test_empty_graph() {
    let graph = build(&[]).unwrap();
    assert!(graph.is_empty());
    assert!(graph.forward_order().is_empty());
}
