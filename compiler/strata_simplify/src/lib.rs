//! Algebraic simplification of strata expressions.
//!
//! [`simplify`] rewrites bottom-up: a node is visited after its children,
//! and whenever a rule fires the result is simplified again, so the output
//! is a local fixed point of the rule set. Every rule preserves the node's
//! type and its value under every assignment.
//!
//! Membership rules, which shrink what the solver has to reason about:
//!
//! | before | after |
//! |---|---|
//! | `x in (a + b)` | `(x in a) or (x in b)` |
//! | `x in distinct(a)` | `x in a` |
//! | `x in filter(a, \y -> p)` | `(x in a) and p[y := x]` |
//! | `x in []` | `false` |
//! | `x in [y]` | `x == y` |
//!
//! Map lookups against an explicit construction,
//! `make_map(ks, \k -> v)[key]`, become `(key in ks ? v[k := key] : zero)`
//! when the value type has a zero value.
//!
//! Boolean identities, double negation, conditionals on literals, filters
//! by `true` and integer constant folding round out the set.

use strata_ir::{
    default_value, rewrite_bottom_up, BinaryOp, Expr, ExprKind, ExprRewriter, UnaryOp,
};

/// Simplify `e` to a local fixed point of the rule set.
pub fn simplify(e: &Expr) -> Expr {
    rewrite_bottom_up(e, &mut Simplifier)
}

struct Simplifier;

impl ExprRewriter for Simplifier {
    fn rewrite(&mut self, e: Expr) -> Expr {
        match step(&e) {
            Some(next) => {
                tracing::trace!(from = %e, to = %next, "simplify");
                simplify(&next)
            }
            None => e,
        }
    }
}

/// One rule application at the root of `e`, children already simplified.
fn step(e: &Expr) -> Option<Expr> {
    match &e.kind {
        ExprKind::Binary {
            op: BinaryOp::In,
            left,
            right,
        } => membership(left, right),
        ExprKind::Binary { op, left, right } => binary(*op, left, right),
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => match &operand.kind {
            ExprKind::Bool(b) => Some(Expr::bool(!b)),
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: inner,
            } => Some((**inner).clone()),
            _ => None,
        },
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match operand.kind {
            ExprKind::Int(i) => Some(Expr::int(i.wrapping_neg())),
            _ => None,
        },
        ExprKind::Cond {
            cond,
            then_branch,
            else_branch,
        } => match cond.kind {
            ExprKind::Bool(true) => Some((**then_branch).clone()),
            ExprKind::Bool(false) => Some((**else_branch).clone()),
            _ if then_branch == else_branch => Some((**then_branch).clone()),
            _ => None,
        },
        ExprKind::Filter { source, predicate } if predicate.body.is_true() => Some((**source).clone()),
        ExprKind::MapGet { map, key } => match &map.kind {
            ExprKind::MakeMap { keys, value } => {
                let zero = default_value(&e.ty)?;
                Some(Expr::cond(
                    Expr::is_in((**key).clone(), (**keys).clone()),
                    value.apply_to(key),
                    zero,
                ))
            }
            _ => None,
        },
        _ => None,
    }
}

fn membership(elem: &Expr, collection: &Expr) -> Option<Expr> {
    match &collection.kind {
        ExprKind::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } if collection.ty.is_collection() => Some(Expr::or(
            Expr::is_in(elem.clone(), (**left).clone()),
            Expr::is_in(elem.clone(), (**right).clone()),
        )),
        ExprKind::Unary {
            op: UnaryOp::Distinct,
            operand,
        } => Some(Expr::is_in(elem.clone(), (**operand).clone())),
        ExprKind::Filter { source, predicate } => Some(Expr::and(
            Expr::is_in(elem.clone(), (**source).clone()),
            predicate.apply_to(elem),
        )),
        ExprKind::Empty if collection.ty.is_collection() => Some(Expr::bool(false)),
        ExprKind::Singleton(only) => Some(Expr::equals(elem.clone(), (**only).clone())),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr) -> Option<Expr> {
    match (op, &left.kind, &right.kind) {
        (BinaryOp::And, ExprKind::Bool(true), _) | (BinaryOp::Or, ExprKind::Bool(false), _) => {
            Some(right.clone())
        }
        (BinaryOp::And, _, ExprKind::Bool(true)) | (BinaryOp::Or, _, ExprKind::Bool(false)) => {
            Some(left.clone())
        }
        (BinaryOp::And, ExprKind::Bool(false), _) => Some(Expr::bool(false)),
        (BinaryOp::Or, ExprKind::Bool(true), _) => Some(Expr::bool(true)),
        (BinaryOp::Add, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::int(a.wrapping_add(*b))),
        (BinaryOp::Sub, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::int(a.wrapping_sub(*b))),
        (BinaryOp::Eq, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::bool(a == b)),
        (BinaryOp::Ne, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::bool(a != b)),
        (BinaryOp::Lt, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::bool(a < b)),
        (BinaryOp::Le, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::bool(a <= b)),
        (BinaryOp::Gt, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::bool(a > b)),
        (BinaryOp::Ge, ExprKind::Int(a), ExprKind::Int(b)) => Some(Expr::bool(a >= b)),
        _ => None,
    }
}
