//! Decomposition of an expression into positioned subexpressions.

use strata_ir::{BinaryOp, Expr, ExprKind, Lambda, Pool};
use strata_stack::ensure_sufficient_stack;

use crate::Context;

/// A subexpression together with the context and pool it executes under.
pub type Shredded<'e> = (&'e Expr, Context, Pool);

/// Every node of `e`, in pre-order, with its context and pool.
///
/// - Conditional branches see the test (or its negation) as a path
///   condition; so do the right operands of `and` / `or`.
/// - Lambda bodies see a binder ranging over the collection, in the pool
///   the collection is computed in. For `MakeMap` the binder ranges over
///   the key collection.
/// - The operand of a `StateVar` is computed in the STATE pool.
pub fn shred<'e>(e: &'e Expr, ctx: &Context, pool: Pool) -> Vec<Shredded<'e>> {
    let mut out = Vec::new();
    go(e, ctx, pool, &mut out);
    out
}

fn go<'e>(e: &'e Expr, ctx: &Context, pool: Pool, out: &mut Vec<Shredded<'e>>) {
    out.push((e, ctx.clone(), pool));
    ensure_sufficient_stack(|| match &e.kind {
        ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Empty | ExprKind::Var(_) => {}
        ExprKind::Cond {
            cond,
            then_branch,
            else_branch,
        } => {
            go(cond, ctx, pool, out);
            go(then_branch, &ctx.assume((**cond).clone()), pool, out);
            go(else_branch, &ctx.assume(Expr::not((**cond).clone())), pool, out);
        }
        ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            go(left, ctx, pool, out);
            go(right, &ctx.assume((**left).clone()), pool, out);
        }
        ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            go(left, ctx, pool, out);
            go(right, &ctx.assume(Expr::not((**left).clone())), pool, out);
        }
        ExprKind::Filter { source, predicate: lam }
        | ExprKind::Map { source, func: lam }
        | ExprKind::SortBy { source, key: lam }
        | ExprKind::MakeMap { keys: source, value: lam } => {
            go(source, ctx, pool, out);
            binder(lam, source, ctx, pool, out);
        }
        ExprKind::StateVar(inner) => go(inner, ctx, Pool::State, out),
        _ => {
            for child in e.children() {
                go(child, ctx, pool, out);
            }
        }
    });
}

fn binder<'e>(lam: &'e Lambda, source: &Expr, ctx: &Context, pool: Pool, out: &mut Vec<Shredded<'e>>) {
    let inner = ctx.bind(lam.arg.clone(), pool, source.clone());
    go(&lam.body, &inner, pool, out);
}

#[cfg(test)]
mod tests;
