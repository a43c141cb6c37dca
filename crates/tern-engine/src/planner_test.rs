use super::*;
use crate::operation::Operation;
use tern_core::{EntityName, FieldState, FieldType, Namespace, SchemaChange};

fn key(s: &str) -> MigrationKey {
    MigrationKey::parse(s).unwrap()
}

fn create(entity: &str) -> SchemaChange {
    SchemaChange::CreateEntity {
        name: EntityName::new(entity),
        table: None,
        fields: vec![FieldState::new("id", FieldType::Integer)],
    }
}

fn migration(k: &str, deps: &[&str]) -> Migration {
    let key = key(k);
    let entity = format!("e_{}", key.name);
    deps.iter()
        .fold(Migration::with_key(key), |m, d| m.depends_on(MigrationKey::parse(d).unwrap()))
        .operation(create(&entity))
}

/// shop.0001 <- shop.0002 <- billing.0001 ; auth.0001 standalone
fn planner() -> Planner {
    Planner::build(vec![
        migration("billing.0001", &["shop.0002"]),
        migration("shop.0002", &["shop.0001"]),
        migration("auth.0001", &[]),
        migration("shop.0001", &[]),
    ])
    .unwrap()
}

fn names(keys: &[MigrationKey]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

#[test]
fn test_scenario_a_forward_order() {
    let planner = Planner::build(vec![
        migration("app.m2", &["app.m1"]),
        migration("app.m1", &[]),
    ])
    .unwrap();
    let plan = planner.plan_forward(&Target::Latest).unwrap();
    assert_eq!(names(&plan), vec!["app.m1", "app.m2"]);
}

#[test]
fn test_forward_plan_is_deterministic() {
    let planner = planner();
    let plan = planner.plan_forward(&Target::Latest).unwrap();
    assert_eq!(
        names(&plan),
        vec!["auth.0001", "shop.0001", "shop.0002", "billing.0001"]
    );
    for _ in 0..5 {
        assert_eq!(planner.plan_forward(&Target::Latest).unwrap(), plan);
    }
}

#[test]
fn test_forward_to_target_and_zero() {
    let planner = planner();
    let plan = planner
        .plan_forward(&Target::Migration(key("shop.0002")))
        .unwrap();
    assert_eq!(names(&plan), vec!["shop.0001", "shop.0002"]);

    let zero = planner
        .plan_forward(&Target::Zero(Namespace::new("shop")))
        .unwrap();
    assert!(zero.is_empty());

    assert!(matches!(
        planner.plan_forward(&Target::Migration(key("shop.0099"))),
        Err(CoreError::MigrationNotFound { .. })
    ));
}

#[test]
fn test_build_reports_cycle_and_unknown_dependency() {
    let err = Planner::build(vec![
        migration("app.a", &["app.c"]),
        migration("app.b", &["app.a"]),
        migration("app.c", &["app.b"]),
    ])
    .unwrap_err();
    match err {
        CoreError::CircularDependency { cycle } => {
            let mut ids = names(&cycle);
            ids.sort();
            assert_eq!(ids, vec!["app.a", "app.b", "app.c"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = Planner::build(vec![migration("app.a", &["app.missing"])]).unwrap_err();
    assert!(matches!(err, CoreError::UnknownDependency { .. }));
}

#[test]
fn test_backward_latest_reverses_forward() {
    let planner = planner();
    let forward = planner.plan_forward(&Target::Latest).unwrap();
    let applied: BTreeSet<MigrationKey> = forward.iter().cloned().collect();

    let backward = planner.plan_backward(&applied, &Target::Latest).unwrap();
    let mut reversed = forward.clone();
    reversed.reverse();
    assert_eq!(backward.steps, reversed);
    assert_eq!(backward.context, forward);
}

#[test]
fn test_backward_to_migration_keeps_target() {
    let planner = planner();
    let applied: BTreeSet<MigrationKey> = planner.graph().keys().into_iter().collect();

    let plan = planner
        .plan_backward(&applied, &Target::Migration(key("shop.0001")))
        .unwrap();
    assert_eq!(names(&plan.steps), vec!["billing.0001", "shop.0002"]);
    assert_eq!(
        names(&plan.context),
        vec!["shop.0001", "shop.0002", "billing.0001"]
    );
}

#[test]
fn test_backward_only_touches_applied() {
    let planner = planner();
    let applied: BTreeSet<MigrationKey> = [key("shop.0001"), key("shop.0002"), key("gone.0001")]
        .into_iter()
        .collect();

    let plan = planner
        .plan_backward(&applied, &Target::Zero(Namespace::new("shop")))
        .unwrap();
    assert_eq!(names(&plan.steps), vec!["shop.0002", "shop.0001"]);

    let none = planner
        .plan_backward(&BTreeSet::new(), &Target::Latest)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_backward_zero_includes_cross_namespace_dependents() {
    let planner = planner();
    let applied: BTreeSet<MigrationKey> = planner.graph().keys().into_iter().collect();
    let plan = planner
        .plan_backward(&applied, &Target::Zero(Namespace::new("shop")))
        .unwrap();
    assert_eq!(
        names(&plan.steps),
        vec!["billing.0001", "shop.0002", "shop.0001"]
    );
}

#[test]
fn test_backward_rejects_irreversible() {
    let planner = Planner::build(vec![
        migration("app.m1", &[]),
        migration("app.m2", &["app.m1"])
            .operation(Operation::sql(vec!["DELETE FROM app_e_m1".into()], None)),
    ])
    .unwrap();
    let applied: BTreeSet<MigrationKey> = [key("app.m1"), key("app.m2")].into_iter().collect();

    let err = planner
        .plan_backward(&applied, &Target::Latest)
        .unwrap_err();
    match err {
        EngineError::Irreversible {
            migration,
            operation,
            ..
        } => {
            assert_eq!(migration, key("app.m2"));
            assert_eq!(operation, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    // reversing only up to m2 does not touch it
    let plan = planner
        .plan_backward(&applied, &Target::Migration(key("app.m2")))
        .unwrap();
    assert!(plan.is_empty());
}
