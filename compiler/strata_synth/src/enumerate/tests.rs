use std::time::Instant;

use pretty_assertions::assert_eq;

use super::{good_idea, heuristic_done, Enumerator};
use crate::{AsymptoticCostModel, CostModel, Plan, Query, Structure, SynthError};
use strata_ir::{BinaryOp, Expr, ExtensionRegistry, Lambda, Name, Pool, Type, Var};
use strata_solver::Z3Solver;

fn age() -> Expr {
    Var::new("age", Type::Int).to_expr()
}

fn structure() -> Structure {
    Structure::new(vec![(Name::from("age"), Type::Int)], &[])
}

fn query(predicate: Expr) -> Query {
    Query {
        name: Name::from("q"),
        args: vec![],
        assumptions: vec![],
        predicate,
        sort_field: None,
    }
}

fn run(q: &Query, global: &[Expr]) -> Vec<Plan> {
    let registry = ExtensionRegistry::new();
    Enumerator::new(&structure(), q, global, &registry, Z3Solver::default())
        .unwrap_or_else(|e| panic!("{e}"))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| panic!("{e}"))
}

fn shown(plans: &[Plan]) -> Vec<String> {
    plans.iter().map(ToString::to_string).collect()
}

// ── Enumeration ─────────────────────────────────────────

#[test]
fn the_scan_comes_first_and_plans_get_cheaper() {
    let q = query(Expr::lt(age(), Expr::int(18)));
    let plans = run(&q, &[]);
    let names = shown(&plans);
    assert_eq!(names[0], "filter(state(xs), \\r -> (r.age < 18))");
    assert_eq!(names[1], "state(filter(xs, \\r -> (r.age < 18)))");

    let model = AsymptoticCostModel::default();
    let costs: Vec<_> = plans.iter().map(|p| model.cost(p)).collect();
    assert!(costs.windows(2).all(|w| w[1] <= w[0]), "{costs:?}");
    assert_eq!(costs.last().map(|c| c.0), Some(1));
}

#[test]
fn redundant_conjunct_is_dropped_under_assumptions() {
    let q = query(Expr::and(Expr::le(Expr::int(0), age()), Expr::lt(age(), Expr::int(18))));
    let short = "state(filter(xs, \\r -> (r.age < 18)))".to_string();

    let assume = [Expr::le(Expr::int(0), age())];
    let plans = shown(&run(&q, &assume));
    assert!(plans.contains(&short), "{plans:?}");

    // Without the assumption the conjunct matters.
    let plans = shown(&run(&q, &[]));
    assert!(!plans.contains(&short), "{plans:?}");
}

#[test]
fn argument_conjunct_survives() {
    let limit = Var::new("limit", Type::Int);
    let mut q = query(Expr::and(
        Expr::lt(age(), Expr::int(18)),
        Expr::lt(age(), Expr::binary(BinaryOp::Add, limit.to_expr(), Expr::int(50))),
    ));
    q.args = vec![limit];
    let plans = run(&q, &[]);
    for plan in &plans {
        assert!(plan.to_string().contains("limit"), "{plan}");
    }
}

#[test]
fn unsatisfiable_assumptions_yield_the_default_plan() {
    let mut q = query(Expr::lt(age(), Expr::int(18)));
    let limit = Var::new("limit", Type::Int);
    q.args = vec![limit.clone()];
    q.assumptions = vec![Expr::lt(limit.to_expr(), Expr::int(0)), Expr::lt(Expr::int(5), limit.to_expr())];
    let plans = run(&q, &[]);
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].expr.kind, strata_ir::ExprKind::Empty);
}

#[test]
fn argument_named_like_a_field_is_rejected() {
    let mut q = query(Expr::lt(age(), Expr::int(18)));
    q.args = vec![Var::new("age", Type::Int)];
    let registry = ExtensionRegistry::new();
    let result = Enumerator::new(&structure(), &q, &[], &registry, Z3Solver::default());
    assert!(matches!(result, Err(SynthError::ShadowedField { .. })));
}

#[test]
fn rejections_are_counted() {
    let q = query(Expr::and(Expr::le(Expr::int(0), age()), Expr::lt(age(), Expr::int(18))));
    let registry = ExtensionRegistry::new();
    let mut e = Enumerator::new(&structure(), &q, &[], &registry, Z3Solver::default())
        .unwrap_or_else(|e| panic!("{e}"));
    let found = e.by_ref().filter(Result::is_ok).count();
    let stats = e.stats();
    assert_eq!(stats.proven, found);
    assert!(stats.refuted + stats.not_equivalent > 0);
    assert!(stats.examples >= 1);
    assert_eq!(
        stats.candidates,
        stats.proven
            + stats.refuted
            + stats.heuristic
            + stats.not_wf
            + stats.too_expensive
            + stats.not_equivalent
            + stats.inconclusive
    );
}

#[test]
fn zero_size_limit_yields_only_the_query() {
    let q = query(Expr::lt(age(), Expr::int(18)));
    let registry = ExtensionRegistry::new();
    let plans: Vec<Plan> = Enumerator::new(&structure(), &q, &[], &registry, Z3Solver::default())
        .unwrap_or_else(|e| panic!("{e}"))
        .with_size_limit(Some(0))
        .filter_map(Result::ok)
        .collect();
    assert_eq!(shown(&plans), vec!["filter(state(xs), \\r -> (r.age < 18))"]);
}

#[test]
fn passed_deadline_yields_nothing() {
    let q = query(Expr::lt(age(), Expr::int(18)));
    let registry = ExtensionRegistry::new();
    let mut e = Enumerator::new(&structure(), &q, &[], &registry, Z3Solver::default())
        .unwrap_or_else(|e| panic!("{e}"))
        .with_deadline(Some(Instant::now()));
    assert!(e.next().is_none());
    assert!(e.stats().timed_out);
    assert_eq!(e.stats().candidates, 0);
}

// ── Heuristic screen ────────────────────────────────────

#[test]
fn good_idea_rejects_useless_shapes() {
    let xs = Var::new("xs", Type::bag(Type::Int));
    let k = Var::new("k", Type::Int);
    assert!(good_idea(&Expr::state_var(Expr::int(3)), Pool::Runtime).is_err());
    assert_eq!(good_idea(&Expr::state_var(xs.to_expr()), Pool::Runtime), Ok(()));

    let empty_keys = Expr::make_map(Expr::empty(Type::bag(Type::Int)), Lambda::new(k.clone(), k.to_expr()));
    assert_eq!(good_idea(&empty_keys, Pool::State), Err("trivially empty map"));

    let rows = Var::new("rs", Type::bag(Type::bag(Type::Int)));
    let bag_key = Var::new("b", Type::bag(Type::Int));
    let bag_keyed = Expr::make_map(rows.to_expr(), Lambda::new(bag_key.clone(), Expr::len(bag_key.to_expr())));
    assert_eq!(good_idea(&bag_keyed, Pool::State), Err("map keyed by a non-scalar"));
}

#[test]
fn good_idea_rejects_cheap_work_in_state() {
    let n = Var::new("n", Type::Int);
    let sum = Expr::binary(BinaryOp::Add, n.to_expr(), Expr::int(1));
    assert_eq!(
        good_idea(&Expr::state_var(sum.clone()), Pool::Runtime),
        Err("constant-time binary operator in state position")
    );
    assert_eq!(good_idea(&sum, Pool::State), Ok(()));

    let xs = Var::new("xs", Type::bag(Type::Int));
    let ys = Var::new("ys", Type::bag(Type::Int));
    let diff = Expr::binary(BinaryOp::Sub, xs.to_expr(), ys.to_expr());
    assert_eq!(good_idea(&diff, Pool::State), Err("collection subtraction in state position"));
    assert_eq!(good_idea(&diff, Pool::Runtime), Ok(()));
}

#[test]
fn good_idea_rejects_maps_of_maps() {
    let xs = Var::new("xs", Type::bag(Type::Int));
    let k = Var::new("k", Type::Int);
    let inner = Expr::make_map(xs.to_expr(), Lambda::new(Var::new("j", Type::Int), xs.to_expr()));
    let nested = Expr::make_map(xs.to_expr(), Lambda::new(k, inner.clone()));
    assert_eq!(good_idea(&inner, Pool::State), Ok(()));
    assert_eq!(good_idea(&nested, Pool::State), Err("map to map"));
}

#[test]
fn heuristic_done_accepts_constant_time_reads() {
    let xs = Var::new("xs", Type::bag(Type::Int));
    assert!(heuristic_done(&Expr::state_var(xs.to_expr())));
    assert!(heuristic_done(&Expr::int(4)));
    assert!(heuristic_done(&Expr::not(Expr::bool(false))));

    let x = Var::new("x", Type::Int);
    let scan = Expr::filter(
        Expr::state_var(xs.to_expr()),
        Lambda::new(x.clone(), Expr::lt(x.to_expr(), Expr::int(3))),
    );
    assert!(!heuristic_done(&scan));
    assert!(!heuristic_done(&Expr::len(xs.to_expr())));
    assert!(!heuristic_done(&Expr::state_var(scan)));
}
