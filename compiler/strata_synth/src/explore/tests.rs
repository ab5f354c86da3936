use pretty_assertions::assert_eq;

use super::{exploration_order, replace_at};
use strata_ir::{Expr, Lambda, Pool, Type, Var};
use strata_wf::Context;

fn xs() -> Var {
    Var::new("xs", Type::bag(Type::Int))
}

fn x() -> Var {
    Var::new("x", Type::Int)
}

/// `filter(state(xs), \x -> x < 3)`
fn scan() -> Expr {
    Expr::filter(
        Expr::state_var(xs().to_expr()),
        Lambda::new(x(), Expr::lt(x().to_expr(), Expr::int(3))),
    )
}

// ── Exploration order ───────────────────────────────────

#[test]
fn runtime_sites_come_before_state_sites() {
    let root = Context::root(vec![xs()], vec![]);
    let sites = exploration_order(&scan(), &root);
    let pools: Vec<Pool> = sites.iter().map(|s| s.pool).collect();
    let first_state = pools.iter().position(|p| *p == Pool::State).unwrap_or(pools.len());
    assert!(pools[first_state..].iter().all(|p| *p == Pool::State), "{pools:?}");

    // The whole plan first, then deeper binders.
    assert!(sites[0].path.is_empty());
    let depths: Vec<usize> = sites[..first_state].iter().map(|s| s.ctx.complexity()).collect();
    assert!(depths.windows(2).all(|w| w[0] <= w[1]), "{depths:?}");
    let stored = sites.last().map(|s| (s.sub.clone(), s.pool));
    assert_eq!(stored, Some((xs().to_expr(), Pool::State)));
}

#[test]
fn every_site_path_leads_to_its_subexpression() {
    let root = Context::root(vec![xs()], vec![]);
    let plan = scan();
    let marker = Var::new("hole", Type::Int).to_expr();
    for site in exploration_order(&plan, &root) {
        if site.sub.ty != Type::Int {
            continue;
        }
        let replaced = replace_at(&plan, &site.path, &marker);
        assert_eq!(replace_at(&replaced, &site.path, &site.sub), plan);
        assert_ne!(replaced, plan);
    }
}

// ── Substitution ────────────────────────────────────────

#[test]
fn replace_at_swaps_one_child() {
    let bound = replace_at(&scan(), &[1, 1], &Expr::int(7));
    assert_eq!(bound.to_string(), "filter(state(xs), \\x -> (x < 7))");
    assert_eq!(replace_at(&scan(), &[], &Expr::int(7)), Expr::int(7));
}
