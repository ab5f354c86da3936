use pretty_assertions::assert_eq;

use super::{BestSet, Offer, Plan};
use crate::Cost;
use strata_ir::{Expr, Type, Var};

fn plan(i: i64) -> Plan {
    Plan::new(Expr::int(i))
}

#[test]
fn cheaper_plan_resets_the_set() {
    let mut best = BestSet::new();
    assert_eq!(best.offer(plan(1), Cost(10)), Offer::Improved);
    assert_eq!(best.offer(plan(2), Cost(10)), Offer::Tied);
    assert_eq!(best.offer(plan(3), Cost(4)), Offer::Improved);
    assert_eq!(best.plans(), &[plan(3)]);
    assert_eq!(best.cost(), Some(Cost(4)));
}

#[test]
fn worse_and_duplicate_plans_are_discarded() {
    let mut best = BestSet::new();
    best.offer(plan(1), Cost(5));
    assert_eq!(best.offer(plan(2), Cost(6)), Offer::Worse);
    assert_eq!(best.offer(plan(1), Cost(5)), Offer::Duplicate);
    assert_eq!(best.len(), 1);
}

#[test]
fn ties_keep_discovery_order() {
    let mut best = BestSet::new();
    for i in [3, 1, 2] {
        best.offer(plan(i), Cost(7));
    }
    assert_eq!(best.plans(), &[plan(3), plan(1), plan(2)]);
    assert_eq!(best.first(), Some(&plan(3)));
}

#[test]
fn persisted_values_are_collected_once() {
    let xs = Var::new("xs", Type::bag(Type::Int));
    let state = Expr::state_var(xs.to_expr());
    let p = Plan::new(Expr::binary(strata_ir::BinaryOp::Add, state.clone(), state));
    assert_eq!(p.persisted(), vec![&xs.to_expr()]);
}
