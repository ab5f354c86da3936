use pretty_assertions::assert_eq;

use super::{Oracle, OracleStats, Validity};
use crate::{SatResult, Z3Solver};
use strata_ir::{Expr, Type, Var};

fn x() -> Var {
    Var::new("x", Type::Int)
}

#[test]
fn validity_respects_assumptions() {
    let mut oracle = Oracle::new(Z3Solver::default());
    let claim = Expr::lt(x().to_expr(), Expr::int(10));
    assert!(matches!(oracle.valid(&claim), Validity::Invalid(_)));

    oracle.assume(Expr::lt(x().to_expr(), Expr::int(5)));
    assert_eq!(oracle.valid(&claim), Validity::Valid);
}

#[test]
fn counterexample_names_the_unknown() {
    let mut oracle = Oracle::new(Z3Solver::default());
    let claim = Expr::lt(x().to_expr(), Expr::int(0));
    let Validity::Invalid(model) = oracle.valid(&claim) else {
        panic!("x < 0 is not valid");
    };
    assert!(model.get("x").is_some());
}

#[test]
fn unsat_assumptions_make_everything_valid() {
    let mut oracle = Oracle::new(Z3Solver::default());
    oracle.assume(Expr::bool(false));
    assert_eq!(oracle.satisfiable(&Expr::bool(true)), SatResult::Unsat);
    assert!(oracle.is_valid(&Expr::bool(false)));
}

#[test]
fn repeated_queries_hit_the_cache() {
    let mut oracle = Oracle::new(Z3Solver::default());
    let claim = Expr::le(Expr::int(0), Expr::len(Var::new("xs", Type::bag(Type::Int)).to_expr()));
    assert!(oracle.is_valid(&claim));
    assert!(oracle.is_valid(&claim));
    assert_eq!(oracle.stats(), OracleStats { queries: 2, hits: 1 });

    // New assumptions start a new cache generation.
    oracle.assume(Expr::lt(x().to_expr(), Expr::int(3)));
    assert!(oracle.is_valid(&claim));
    assert_eq!(oracle.stats().hits, 1);
}

#[test]
fn trivial_assumptions_are_dropped() {
    let mut oracle = Oracle::new(Z3Solver::default());
    oracle.assume(Expr::bool(true));
    assert!(oracle.assumptions().is_empty());
}
