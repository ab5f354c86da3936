use pretty_assertions::assert_eq;

use super::{fingerprint, instantiate, Example, Grammar};
use crate::AsymptoticCostModel;
use strata_ir::{Expr, Lambda, Name, Pool, Type, Var};
use strata_solver::Value;
use strata_wf::Context;

fn xs() -> Var {
    Var::new("xs", Type::bag(Type::Int))
}

fn x() -> Var {
    Var::new("x", Type::Int)
}

fn n() -> Var {
    Var::new("n", Type::Int)
}

fn example(items: &[i64], arg: i64) -> Example {
    vec![
        (Name::from("xs"), Value::bag(items.iter().copied().map(Value::Int).collect())),
        (Name::from("n"), Value::Int(arg)),
    ]
}

fn root() -> Context {
    Context::root(vec![xs()], vec![n()])
}

fn small() -> Lambda {
    Lambda::new(x(), Expr::lt(x().to_expr(), Expr::int(3)))
}

fn shown(es: &[Expr]) -> Vec<String> {
    es.iter().map(ToString::to_string).collect()
}

// ── Instantiation ───────────────────────────────────────

#[test]
fn binder_ranges_over_its_source() {
    let inner = root().bind(x(), Pool::Runtime, Expr::state_var(xs().to_expr()));
    let envs = instantiate(&inner, &[example(&[1, 5], 0), example(&[], 0)]);
    let bound: Vec<Option<&Value>> = envs
        .iter()
        .map(|env| env.iter().find(|(name, _)| name == "x").map(|(_, v)| v))
        .collect();
    assert_eq!(bound, vec![Some(&Value::Int(1)), Some(&Value::Int(5))]);
}

#[test]
fn condition_drops_environments_where_it_fails() {
    let inner = root().bind(x(), Pool::Runtime, Expr::state_var(xs().to_expr()));
    let guarded = inner.assume(Expr::lt(x().to_expr(), n().to_expr()));
    let envs = instantiate(&guarded, &[example(&[1, 5], 4)]);
    assert_eq!(envs.len(), 1);
    assert_eq!(fingerprint(&x().to_expr(), &envs), vec![Some(Value::Int(1))]);
}

// ── Candidates ──────────────────────────────────────────

#[test]
fn leaves_respect_pools() {
    let mut g = Grammar::new(Vec::new(), vec![example(&[1, 5], 2)], AsymptoticCostModel::default());
    let ctx = root();
    assert_eq!(shown(&g.candidates(&ctx, Pool::Runtime, 1)), vec!["n"]);
    assert_eq!(shown(&g.candidates(&ctx, Pool::State, 1)), vec!["xs"]);
    assert!(shown(&g.candidates(&ctx, Pool::Runtime, 2)).contains(&"state(xs)".to_string()));
}

#[test]
fn cheaper_of_two_equal_candidates_is_kept() {
    let persisted = Expr::state_var(Expr::filter(xs().to_expr(), small()));
    let scan = Expr::filter(Expr::state_var(xs().to_expr()), small());
    let hints = vec![persisted.clone(), scan];
    let mut g = Grammar::new(hints, vec![example(&[1, 5], 2)], AsymptoticCostModel::default());
    let found = g.candidates(&root(), Pool::Runtime, 1);
    assert!(found.contains(&persisted), "{:?}", shown(&found));
    assert!(!found.iter().any(|e| e.to_string().starts_with("filter(state(xs)")), "{:?}", shown(&found));
}

#[test]
fn runtime_scans_are_offered_persisted() {
    let scan = Expr::filter(Expr::state_var(xs().to_expr()), small());
    let mut g = Grammar::new(vec![scan], vec![example(&[1, 5], 2)], AsymptoticCostModel::default());
    let found = shown(&g.candidates(&root(), Pool::Runtime, 1));
    assert!(found.contains(&"state(filter(xs, \\x -> (x < 3)))".to_string()), "{found:?}");
}

#[test]
fn comprehensions_reuse_hint_fragments() {
    let body = Expr::lt(x().to_expr(), Expr::int(3));
    let mut g = Grammar::new(vec![body], vec![example(&[1, 5], 2)], AsymptoticCostModel::default());
    let found = shown(&g.candidates(&root(), Pool::State, 3));
    assert!(found.contains(&"filter(xs, \\x -> (x < 3))".to_string()), "{found:?}");
}
