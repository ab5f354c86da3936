use pretty_assertions::assert_eq;

use super::{AsymptoticCostModel, Cost, CostModel, CostModelError, GlobalCostModel, SumCostModel, WeightedCostModel};
use crate::{Plan, Structure};
use strata_ir::{Expr, Name, Type, Var};

fn structure() -> Structure {
    Structure::new(vec![(Name::from("age"), Type::Int)], &[])
}

fn young() -> Expr {
    Expr::lt(Var::new("age", Type::Int).to_expr(), Expr::int(18))
}

fn scan(s: &Structure) -> Plan {
    Plan::new(Expr::filter(Expr::state_var(s.xs.to_expr()), s.element_test(&young())))
}

fn prefiltered(s: &Structure) -> Plan {
    Plan::new(Expr::state_var(Expr::filter(s.xs.to_expr(), s.element_test(&young()))))
}

// ── Per-query cost ──────────────────────────────────────

#[test]
fn scan_is_linear_in_the_collection() {
    let s = structure();
    // 1 to read xs, then 1000 evaluations of (r.age < 18) at 4 each.
    assert_eq!(AsymptoticCostModel::default().cost(&scan(&s)), Cost(4001));
}

#[test]
fn persisted_result_costs_one_read() {
    let s = structure();
    let model = AsymptoticCostModel::default();
    assert_eq!(model.cost(&prefiltered(&s)), Cost(1));
}

#[test]
fn sorting_at_runtime_costs_more_than_reading_sorted_state() {
    let s = structure();
    let model = AsymptoticCostModel::default();
    let key = s.key(&Name::from("age"));
    let sorted_at_runtime = Plan::new(Expr::sort_by(Expr::state_var(s.xs.to_expr()), key.clone()));
    let sorted_in_state = Plan::new(Expr::state_var(Expr::sort_by(s.xs.to_expr(), key)));
    assert!(model.cost(&sorted_in_state) < model.cost(&sorted_at_runtime));
}

#[test]
fn storage_counts_stored_elements() {
    let s = structure();
    let model = AsymptoticCostModel::default();
    assert_eq!(model.storage(&s.xs.to_expr()), 1000);
    let filtered = Expr::filter(s.xs.to_expr(), s.element_test(&young()));
    assert_eq!(model.storage(&filtered), 500);
}

// ── Global cost ─────────────────────────────────────────

#[test]
fn sum_model_adds_query_costs() {
    let s = structure();
    let (a, b) = (Name::from("a"), Name::from("b"));
    let model = SumCostModel(AsymptoticCostModel::default());
    let (p, q) = (scan(&s), prefiltered(&s));
    assert_eq!(model.cost(&[(&a, &p), (&b, &q)]), Cost(4002));
}

#[test]
fn weighted_model_charges_shared_storage_once() {
    let s = structure();
    let model = WeightedCostModel::from_json(r#"{ "query_weights": { "a": 3 }, "storage_weight": 1 }"#)
        .unwrap_or_else(|e| panic!("{e}"));
    let (a, b) = (Name::from("a"), Name::from("b"));
    let p = prefiltered(&s);

    // 3 * 1 + 1 * 1, plus 500 stored elements counted once.
    assert_eq!(model.cost(&[(&a, &p), (&b, &p)]), Cost(504));
}

#[test]
fn collection_size_comes_from_the_file() {
    let model = WeightedCostModel::from_json(r#"{ "collection_size": 10 }"#).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(model.per_query().params().collection_size, 10);
    assert_eq!(model.per_query().cost(&scan(&structure())), Cost(41));
}

#[test]
fn malformed_cost_model_is_an_error() {
    let err = WeightedCostModel::from_json(r#"{ "storage_weight": "lots" }"#);
    assert!(matches!(err, Err(CostModelError::Json(_))));
    let err = WeightedCostModel::from_json(r#"{ "typo": 1 }"#);
    assert!(matches!(err, Err(CostModelError::Json(_))));
}

#[test]
fn missing_cost_model_file_is_an_io_error() {
    let err = WeightedCostModel::load(std::path::Path::new("/nonexistent/strata/weights.json"));
    assert!(matches!(err, Err(CostModelError::Io { .. })));
}
