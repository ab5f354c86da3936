use pretty_assertions::assert_eq;

use super::accelerate;
use crate::{Query, Structure};
use strata_ir::{Expr, Name, Type, Var};
use strata_wf::Context;

fn age() -> Expr {
    Var::new("age", Type::Int).to_expr()
}

fn name() -> Expr {
    Var::new("name", Type::Str).to_expr()
}

fn who() -> Var {
    Var::new("who", Type::Str)
}

fn structure() -> Structure {
    let fields = vec![(Name::from("age"), Type::Int), (Name::from("name"), Type::Str)];
    Structure::new(fields, &[who()])
}

/// `age < 18 and name == who`, optionally sorted by age.
fn scan(sort: bool) -> (Expr, Context) {
    let s = structure();
    let query = Query {
        name: Name::from("q"),
        args: vec![who()],
        assumptions: vec![],
        predicate: Expr::and(Expr::lt(age(), Expr::int(18)), Expr::equals(name(), who().to_expr())),
        sort_field: sort.then(|| Name::from("age")),
    };
    let spec = s.specification(&query).unwrap_or_else(|e| panic!("{e}"));
    (spec, Context::root(vec![s.xs.clone()], vec![who()]))
}

fn rewrites(sort: bool) -> Vec<String> {
    let (e, ctx) = scan(sort);
    accelerate(&e, &ctx).iter().map(ToString::to_string).collect()
}

// ── Filters over persisted data ─────────────────────────

#[test]
fn prefilter_moves_argument_free_conjuncts_into_state() {
    let shown = rewrites(false);
    assert!(
        shown.contains(&"filter(state(filter(xs, \\r -> (r.age < 18))), \\r -> (r.name == who))".to_string()),
        "{shown:?}"
    );
}

#[test]
fn index_answers_the_equality_by_lookup() {
    let shown = rewrites(false);
    assert!(
        shown.contains(
            &"filter(state(make_map(map(xs, \\r -> r.name), \\k -> filter(xs, \\r -> (r.name == k))))[who], \\r -> (r.age < 18))"
                .to_string()
        ),
        "{shown:?}"
    );
    // The same lookup over the prefiltered collection.
    assert!(
        shown.contains(
            &"state(make_map(map(filter(xs, \\r -> (r.age < 18)), \\r -> r.name), \\k -> filter(filter(xs, \\r -> (r.age < 18)), \\r -> (r.name == k))))[who]"
                .to_string()
        ),
        "{shown:?}"
    );
}

#[test]
fn fully_persistable_filter_becomes_one_read() {
    let s = structure();
    let query = Query {
        name: Name::from("q"),
        args: vec![],
        assumptions: vec![],
        predicate: Expr::lt(age(), Expr::int(18)),
        sort_field: None,
    };
    let spec = s.specification(&query).unwrap_or_else(|e| panic!("{e}"));
    let ctx = Context::root(vec![s.xs.clone()], vec![]);
    let shown: Vec<String> = accelerate(&spec, &ctx).iter().map(ToString::to_string).collect();
    assert_eq!(shown, vec!["state(filter(xs, \\r -> (r.age < 18)))"]);
}

// ── Sorted results ──────────────────────────────────────

#[test]
fn presort_keeps_state_in_result_order() {
    assert_eq!(
        rewrites(true),
        vec!["filter(state(sort_by(filter(xs, \\r -> (r.age < 18)), \\r -> r.age)), \\r -> (r.name == who))"]
    );
}

#[test]
fn sort_over_argument_dependent_keys_stays_at_runtime() {
    // sort_by(state(xs), \r -> r.age < limit): the key needs `limit`.
    let s = structure();
    let limit = Var::new("limit", Type::Int);
    let key = strata_ir::Lambda::new(
        s.row.clone(),
        Expr::lt(Expr::get_field(s.row.to_expr(), "age"), limit.to_expr()),
    );
    let e = Expr::sort_by(Expr::state_var(s.xs.to_expr()), key);
    let ctx = Context::root(vec![s.xs.clone()], vec![limit]);
    assert!(accelerate(&e, &ctx).is_empty());
}

#[test]
fn other_shapes_are_left_alone() {
    let s = structure();
    let ctx = Context::root(vec![s.xs.clone()], vec![who()]);
    assert!(accelerate(&Expr::state_var(s.xs.to_expr()), &ctx).is_empty());
    assert!(accelerate(&who().to_expr(), &ctx).is_empty());
}
