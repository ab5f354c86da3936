use pretty_assertions::assert_eq;

use super::shred;
use crate::Context;
use strata_ir::{Expr, Lambda, Name, Pool, Type, Var};

fn root() -> Context {
    Context::root(
        vec![Var::new("xs", Type::bag(Type::Int))],
        vec![Var::new("k", Type::Int)],
    )
}

#[test]
fn visits_every_node_in_pre_order() {
    let k = Var::new("k", Type::Int);
    let e = Expr::lt(k.to_expr(), Expr::int(3));
    let nodes: Vec<String> = shred(&e, &root(), Pool::Runtime)
        .iter()
        .map(|(sub, _, _)| sub.to_string())
        .collect();
    assert_eq!(nodes, vec!["(k < 3)", "k", "3"]);
}

#[test]
fn cond_branches_see_the_test() {
    let k = Var::new("k", Type::Int);
    let test = Expr::lt(k.to_expr(), Expr::int(0));
    let e = Expr::cond(test, Expr::int(1), Expr::int(2));
    let shredded = shred(&e, &root(), Pool::Runtime);

    let condition_of = |literal: i64| {
        shredded
            .iter()
            .find(|(sub, _, _)| **sub == Expr::int(literal))
            .map(|(_, ctx, _)| ctx.path_condition().to_string())
            .unwrap_or_else(|| panic!("branch {literal} not shredded"))
    };
    assert_eq!(condition_of(1), "(k < 0)");
    assert_eq!(condition_of(2), "not (k < 0)");
}

#[test]
fn filter_body_is_bound_in_the_enclosing_pool() {
    // state(filter(xs, \x -> x < 5)): the binder lives in STATE.
    let xs = Var::new("xs", Type::bag(Type::Int));
    let x = Var::new("x", Type::Int);
    let body = Expr::lt(x.to_expr(), Expr::int(5));
    let e = Expr::state_var(Expr::filter(xs.to_expr(), Lambda::new(x, body.clone())));
    let shredded = shred(&e, &root(), Pool::Runtime);

    assert_eq!(shredded[0].2, Pool::Runtime);
    let (_, ctx, pool) = shredded
        .iter()
        .find(|(sub, _, _)| **sub == body)
        .unwrap_or_else(|| panic!("filter body not shredded"));
    assert_eq!(*pool, Pool::State);
    assert_eq!(ctx.pool_of(&Name::from("x")), Some(Pool::State));
    assert_eq!(ctx.path_condition().to_string(), "(x in xs)");
}

#[test]
fn right_operand_of_and_sees_the_left() {
    let k = Var::new("k", Type::Int);
    let left = Expr::lt(Expr::int(0), k.to_expr());
    let right = Expr::lt(k.to_expr(), Expr::int(9));
    let e = Expr::and(left, right.clone());
    let shredded = shred(&e, &root(), Pool::Runtime);
    let (_, ctx, _) = shredded
        .iter()
        .find(|(sub, _, _)| **sub == right)
        .unwrap_or_else(|| panic!("right operand not shredded"));
    assert_eq!(ctx.path_condition().to_string(), "(0 < k)");
}
