use pretty_assertions::assert_eq;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{free_vars, subst, BinaryOp, Expr, ExprKind, Lambda, Name, Type, Var};

fn int_var(name: &str) -> Var {
    Var::new(name, Type::Int)
}

fn ints() -> Var {
    Var::new("xs", Type::bag(Type::Int))
}

// ── Free variables ──────────────────────────────────────

#[test]
fn free_vars_skip_bound_names() {
    // filter(xs, \x -> x < y)
    let x = int_var("x");
    let y = int_var("y");
    let e = Expr::filter(ints().to_expr(), Lambda::new(x.clone(), Expr::lt(x.to_expr(), y.to_expr())));

    let names: Vec<Name> = free_vars(&e).into_iter().map(|v| v.name).collect();
    assert_eq!(names, vec![Name::from("xs"), Name::from("y")]);
}

#[test]
fn binder_does_not_scope_over_collection() {
    // filter(x, \x -> x) mentions the outer x in the collection position.
    let outer = Var::new("x", Type::bag(Type::Bool));
    let inner = Var::new("x", Type::Bool);
    let e = Expr::filter(outer.to_expr(), Lambda::new(inner.clone(), inner.to_expr()));

    assert_eq!(free_vars(&e), vec![outer]);
}

// ── Substitution ────────────────────────────────────────

#[test]
fn subst_replaces_free_occurrences_only() {
    let x = int_var("x");
    let e = Expr::and(
        Expr::lt(x.to_expr(), Expr::int(3)),
        Expr::unary(
            crate::UnaryOp::Exists,
            Expr::filter(ints().to_expr(), Lambda::new(x.clone(), Expr::lt(x.to_expr(), Expr::int(1)))),
        ),
    );
    let mut mapping = FxHashMap::default();
    mapping.insert(Name::from("x"), Expr::int(7));

    let out = subst(&e, &mapping);
    assert_eq!(out.to_string(), "((7 < 3) and exists(filter(xs, \\x -> (x < 1))))");
}

#[test]
fn subst_renames_capturing_binder() {
    // (filter(xs, \x -> x < y))[y := x] must not capture the substituted x.
    let x = int_var("x");
    let y = int_var("y");
    let e = Expr::filter(ints().to_expr(), Lambda::new(x.clone(), Expr::lt(x.to_expr(), y.to_expr())));
    let mut mapping = FxHashMap::default();
    mapping.insert(Name::from("y"), x.to_expr());

    let out = subst(&e, &mapping);
    assert_eq!(out.to_string(), "filter(xs, \\x'1 -> (x'1 < x))");
    assert_eq!(free_vars(&out), vec![ints(), x]);
}

#[test]
fn lambda_apply_substitutes_argument() {
    let x = int_var("x");
    let lam = Lambda::new(x.clone(), Expr::binary(BinaryOp::Add, x.to_expr(), Expr::int(1)));
    let applied = lam.apply_to(&Expr::int(41));
    assert!(matches!(applied.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    assert_eq!(applied.to_string(), "(41 + 1)");
}

#[test]
fn fresh_var_avoids_taken_names() {
    let mut avoid = FxHashSet::default();
    avoid.insert(Name::from("k'1"));
    avoid.insert(Name::from("k'2"));
    let fresh = crate::fresh_var(&Var::new("k'1", Type::Int), &avoid);
    assert_eq!(fresh.name, Name::from("k'3"));
}

// ── Structure ───────────────────────────────────────────

#[test]
fn conjuncts_flatten_nested_and() {
    let a = Expr::lt(int_var("a").to_expr(), Expr::int(1));
    let b = Expr::lt(int_var("b").to_expr(), Expr::int(2));
    let c = Expr::lt(int_var("c").to_expr(), Expr::int(3));
    let e = Expr::and(a.clone(), Expr::and(b.clone(), Expr::and(Expr::bool(true), c.clone())));

    let parts: Vec<Expr> = e.conjuncts().into_iter().cloned().collect();
    assert_eq!(parts, vec![a, b, c]);
}

#[test]
fn size_counts_lambda_bodies() {
    let x = int_var("x");
    let e = Expr::filter(ints().to_expr(), Lambda::new(x.clone(), Expr::lt(x.to_expr(), Expr::int(1))));
    // filter, xs, <, x, 1
    assert_eq!(e.size(), 5);
}

#[test]
fn default_values_follow_type() {
    let record = Type::Record(vec![(Name::from("a"), Type::Int), (Name::from("b"), Type::Str)]);
    let d = crate::default_value(&record).unwrap_or_else(|| panic!("records have defaults"));
    assert_eq!(d.to_string(), "{a: 0, b: \"\"}");
    assert_eq!(d.ty, record);

    let ext = Type::Extension {
        name: Name::from("array"),
        args: vec![Type::Int],
    };
    assert!(crate::default_value(&ext).is_none());
}
