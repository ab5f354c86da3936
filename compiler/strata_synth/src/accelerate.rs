//! Rewrites that move query work into the structure.
//!
//! Applied to every RUNTIME candidate the search builds, on top of the
//! bottom-up grammar:
//!
//! - prefilter: `filter(state(S), \r -> a and b)` with `a` free of runtime
//!   variables becomes `filter(state(filter(S, \r -> a)), \r -> b)`
//! - index: a conjunct `r.f == e`, with `e` built from runtime variables,
//!   becomes a lookup in a persisted map keyed by `f`
//! - presort: `sort_by(filter(state(S), p), k)` keeps the persisted
//!   collection in result order
//!
//! Every rewrite is an equivalence. The search still proves each candidate
//! it keeps.

use rustc_hash::FxHashSet;
use strata_ir::{all_names, free_vars, fresh_var, BinaryOp, Expr, ExprKind, Lambda, Name, Pool, Var};
use strata_wf::Context;

/// Rewrites of `e`, evaluated at RUNTIME under `ctx`.
pub(crate) fn accelerate(e: &Expr, ctx: &Context) -> Vec<Expr> {
    match &e.kind {
        ExprKind::Filter { source, predicate } => match &source.kind {
            ExprKind::StateVar(stored) => {
                let split = Split::new(predicate, ctx);
                let mut out = Vec::new();
                out.extend(split.prefilter(stored));
                out.extend(split.index_lookups(stored, ctx));
                out
            }
            _ => Vec::new(),
        },
        ExprKind::SortBy { source, key } if state_only(&key.body, &key.arg, ctx) => match &source.kind {
            ExprKind::StateVar(stored) => vec![Expr::state_var(Expr::sort_by((**stored).clone(), key.clone()))],
            ExprKind::Filter { source: inner, predicate } => match &inner.kind {
                ExprKind::StateVar(stored) => {
                    let split = Split::new(predicate, ctx);
                    let kept = split.stored(stored);
                    let sorted = Expr::state_var(Expr::sort_by(kept, key.clone()));
                    vec![split.at_runtime(sorted, &split.runtime)]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Conjuncts of a filter over persisted data, by where they can run.
struct Split<'p> {
    predicate: &'p Lambda,
    state: Vec<Expr>,
    runtime: Vec<Expr>,
}

impl<'p> Split<'p> {
    fn new(predicate: &'p Lambda, ctx: &Context) -> Self {
        let (state, runtime) = predicate
            .body
            .conjuncts()
            .into_iter()
            .cloned()
            .partition(|c| state_only(c, &predicate.arg, ctx));
        Split {
            predicate,
            state,
            runtime,
        }
    }

    fn test(&self, conjuncts: Vec<Expr>) -> Lambda {
        Lambda::new(self.predicate.arg.clone(), Expr::all(conjuncts))
    }

    /// `stored`, narrowed by the state-only conjuncts.
    fn stored(&self, stored: &Expr) -> Expr {
        if self.state.is_empty() {
            stored.clone()
        } else {
            Expr::filter(stored.clone(), self.test(self.state.clone()))
        }
    }

    /// `source`, narrowed by `conjuncts` per call.
    fn at_runtime(&self, source: Expr, conjuncts: &[Expr]) -> Expr {
        if conjuncts.is_empty() {
            source
        } else {
            Expr::filter(source, self.test(conjuncts.to_vec()))
        }
    }

    fn prefilter(&self, stored: &Expr) -> Option<Expr> {
        if self.state.is_empty() {
            return None;
        }
        Some(self.at_runtime(Expr::state_var(self.stored(stored)), &self.runtime))
    }

    /// One lookup per indexable conjunct, over the whole collection and,
    /// when some conjuncts are state-only, over the prefiltered one.
    fn index_lookups(&self, stored: &Expr, ctx: &Context) -> Vec<Expr> {
        let row = &self.predicate.arg;
        let mut out = Vec::new();
        for (i, conjunct) in self.runtime.iter().enumerate() {
            let Some((field, needle)) = index_key(conjunct, row, ctx) else {
                continue;
            };
            let rest: Vec<Expr> = self
                .runtime
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, c)| c.clone())
                .collect();

            let mut everything = self.state.clone();
            everything.extend(rest.iter().cloned());
            let lookup = index_lookup(stored, row, &field, needle, ctx);
            out.push(self.at_runtime(lookup, &everything));

            if !self.state.is_empty() {
                let lookup = index_lookup(&self.stored(stored), row, &field, needle, ctx);
                out.push(self.at_runtime(lookup, &rest));
            }
        }
        out
    }
}

/// Every free variable other than `row` is persisted.
fn state_only(e: &Expr, row: &Var, ctx: &Context) -> bool {
    free_vars(e)
        .iter()
        .filter(|v| v.name != row.name)
        .all(|v| ctx.pool_of(&v.name) == Some(Pool::State))
}

/// `r.f == e` or `e == r.f`, with `e` built from runtime variables only.
fn index_key<'e>(conjunct: &'e Expr, row: &Var, ctx: &Context) -> Option<(Name, &'e Expr)> {
    let ExprKind::Binary {
        op: BinaryOp::Eq,
        left,
        right,
    } = &conjunct.kind
    else {
        return None;
    };
    let field_read = |e: &Expr| match &e.kind {
        ExprKind::GetField { record, field } if record.kind == ExprKind::Var(row.name.clone()) && e.ty.is_scalar() => {
            Some(field.clone())
        }
        _ => None,
    };
    let needle_ok = |e: &Expr| {
        let vars = free_vars(e);
        !vars.is_empty()
            && vars
                .iter()
                .all(|v| v.name != row.name && ctx.pool_of(&v.name) == Some(Pool::Runtime))
    };
    match (field_read(left), field_read(right)) {
        (Some(f), None) if needle_ok(right) => Some((f, &**right)),
        (None, Some(f)) if needle_ok(left) => Some((f, &**left)),
        _ => None,
    }
}

/// `state(make_map(map(stored, \r -> r.f), \k -> filter(stored, \r -> r.f == k)))[needle]`
fn index_lookup(stored: &Expr, row: &Var, field: &Name, needle: &Expr, ctx: &Context) -> Expr {
    let read = || Expr::get_field(row.to_expr(), field.clone());
    let mut avoid: FxHashSet<Name> = all_names(stored);
    avoid.extend(ctx.vars().into_iter().map(|(v, _)| v.name.clone()));
    avoid.insert(row.name.clone());
    let k = Var::new("k", needle.ty.clone());
    let k = if avoid.contains(&k.name) { fresh_var(&k, &avoid) } else { k };

    let keys = Expr::map(stored.clone(), Lambda::new(row.clone(), read()));
    let bucket = Expr::filter(stored.clone(), Lambda::new(row.clone(), Expr::equals(read(), k.to_expr())));
    let index = Expr::make_map(keys, Lambda::new(k, bucket));
    Expr::map_get(Expr::state_var(index), needle.clone())
}

#[cfg(test)]
mod tests;
