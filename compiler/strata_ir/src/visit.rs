//! Generic walks over expression trees.
//!
//! - [`Expr::children`] / [`map_children`]: one level, binders ignored
//! - [`free_vars`], [`all_names`]: variable discovery
//! - [`subst`]: capture-avoiding substitution
//! - [`ExprRewriter`] / [`rewrite_bottom_up`]: children-first rewriting
//!
//! Extension nodes are walked through their uniform argument list, so
//! none of these need to know what an extension means.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use strata_stack::ensure_sufficient_stack;

use crate::extension::ExtensionExpr;
use crate::{BinaryOp, Expr, ExprKind, Lambda, Name, Var};

impl Expr {
    /// Direct child expressions, lambda bodies included, in source order.
    pub fn children(&self) -> SmallVec<[&Expr; 3]> {
        let mut out = SmallVec::new();
        match &self.kind {
            ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Empty
            | ExprKind::Var(_) => {}
            ExprKind::Binary { left, right, .. } => {
                out.push(&**left);
                out.push(&**right);
            }
            ExprKind::Unary { operand: e, .. }
            | ExprKind::Singleton(e)
            | ExprKind::StateVar(e)
            | ExprKind::GetField { record: e, .. } => out.push(&**e),
            ExprKind::Cond {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push(&**cond);
                out.push(&**then_branch);
                out.push(&**else_branch);
            }
            ExprKind::Filter {
                source,
                predicate: lam,
            }
            | ExprKind::Map { source, func: lam }
            | ExprKind::SortBy { source, key: lam }
            | ExprKind::MakeMap {
                keys: source,
                value: lam,
            } => {
                out.push(&**source);
                out.push(&*lam.body);
            }
            ExprKind::MapGet { map, key } => {
                out.push(&**map);
                out.push(&**key);
            }
            ExprKind::MakeRecord(fields) => out.extend(fields.iter().map(|(_, e)| e)),
            ExprKind::Extension(ext) => out.extend(ext.args.iter()),
        }
        out
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        ensure_sufficient_stack(|| 1 + self.children().iter().map(|c| c.size()).sum::<usize>())
    }

    /// Top-level conjuncts: `a and (b and c)` yields `[a, b, c]`.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            match &e.kind {
                ExprKind::Binary {
                    op: BinaryOp::And,
                    left,
                    right,
                } => {
                    stack.push(right);
                    stack.push(left);
                }
                ExprKind::Bool(true) => {}
                _ => out.push(e),
            }
        }
        out
    }
}

/// Rebuild `e` with `f` applied to every direct child.
///
/// Binders and the node's own type are kept as they are.
pub fn map_children(e: &Expr, f: &mut impl FnMut(&Expr) -> Expr) -> Expr {
    let kind = match &e.kind {
        ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Str(_)
        | ExprKind::Empty
        | ExprKind::Var(_) => e.kind.clone(),
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: Box::new(f(left)),
            right: Box::new(f(right)),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: Box::new(f(operand)),
        },
        ExprKind::Cond {
            cond,
            then_branch,
            else_branch,
        } => ExprKind::Cond {
            cond: Box::new(f(cond)),
            then_branch: Box::new(f(then_branch)),
            else_branch: Box::new(f(else_branch)),
        },
        ExprKind::Filter { source, predicate } => ExprKind::Filter {
            source: Box::new(f(source)),
            predicate: map_lambda(predicate, f),
        },
        ExprKind::Map { source, func } => ExprKind::Map {
            source: Box::new(f(source)),
            func: map_lambda(func, f),
        },
        ExprKind::SortBy { source, key } => ExprKind::SortBy {
            source: Box::new(f(source)),
            key: map_lambda(key, f),
        },
        ExprKind::MakeMap { keys, value } => ExprKind::MakeMap {
            keys: Box::new(f(keys)),
            value: map_lambda(value, f),
        },
        ExprKind::MapGet { map, key } => ExprKind::MapGet {
            map: Box::new(f(map)),
            key: Box::new(f(key)),
        },
        ExprKind::GetField { record, field } => ExprKind::GetField {
            record: Box::new(f(record)),
            field: field.clone(),
        },
        ExprKind::MakeRecord(fields) => {
            ExprKind::MakeRecord(fields.iter().map(|(n, v)| (n.clone(), f(v))).collect())
        }
        ExprKind::Singleton(inner) => ExprKind::Singleton(Box::new(f(inner))),
        ExprKind::StateVar(inner) => ExprKind::StateVar(Box::new(f(inner))),
        ExprKind::Extension(ext) => ExprKind::Extension(ExtensionExpr {
            kind: ext.kind.clone(),
            args: ext.args.iter().map(|a| f(a)).collect(),
        }),
    };
    Expr::new(kind, e.ty.clone())
}

fn map_lambda(l: &Lambda, f: &mut dyn FnMut(&Expr) -> Expr) -> Lambda {
    Lambda {
        arg: l.arg.clone(),
        body: Box::new(f(&l.body)),
    }
}

/// The lambda carried by a comprehension or map construction, if any.
pub fn binder_of(e: &Expr) -> Option<&Lambda> {
    match &e.kind {
        ExprKind::Filter { predicate: l, .. }
        | ExprKind::Map { func: l, .. }
        | ExprKind::SortBy { key: l, .. }
        | ExprKind::MakeMap { value: l, .. } => Some(l),
        _ => None,
    }
}

// Variables

/// Free variables of `e`, in order of first occurrence.
pub fn free_vars(e: &Expr) -> Vec<Var> {
    fn go(e: &Expr, bound: &mut Vec<Name>, seen: &mut FxHashSet<Name>, out: &mut Vec<Var>) {
        ensure_sufficient_stack(|| {
            if let ExprKind::Var(name) = &e.kind {
                if !bound.contains(name) && seen.insert(name.clone()) {
                    out.push(Var::new(name.clone(), e.ty.clone()));
                }
                return;
            }
            match binder_of(e) {
                Some(lam) => {
                    // The collection is outside the binder's scope.
                    for child in e.children() {
                        if std::ptr::eq(child, &*lam.body) {
                            bound.push(lam.arg.name.clone());
                            go(child, bound, seen, out);
                            bound.pop();
                        } else {
                            go(child, bound, seen, out);
                        }
                    }
                }
                None => {
                    for child in e.children() {
                        go(child, bound, seen, out);
                    }
                }
            }
        });
    }
    let mut out = Vec::new();
    go(e, &mut Vec::new(), &mut FxHashSet::default(), &mut out);
    out
}

/// Every variable name in `e`, free or bound.
pub fn all_names(e: &Expr) -> FxHashSet<Name> {
    fn go(e: &Expr, out: &mut FxHashSet<Name>) {
        ensure_sufficient_stack(|| {
            if let ExprKind::Var(name) = &e.kind {
                out.insert(name.clone());
            }
            if let Some(lam) = binder_of(e) {
                out.insert(lam.arg.name.clone());
            }
            for child in e.children() {
                go(child, out);
            }
        });
    }
    let mut out = FxHashSet::default();
    go(e, &mut out);
    out
}

/// A variable of `base`'s type whose name is not in `avoid`.
///
/// Names are derived deterministically (`x'1`, `x'2`, ...), so freshening
/// the same term twice yields the same result.
pub fn fresh_var(base: &Var, avoid: &FxHashSet<Name>) -> Var {
    let stem = match base.name.as_str().split_once('\'') {
        Some((stem, _)) => stem,
        None => base.name.as_str(),
    };
    let mut n = 1u32;
    loop {
        let candidate = Name::from(format!("{stem}'{n}"));
        if !avoid.contains(&candidate) {
            return Var::new(candidate, base.ty.clone());
        }
        n += 1;
    }
}

// Substitution

/// Replace free occurrences of the mapped variables.
///
/// Capture-avoiding: a binder that would capture a free variable of some
/// replacement is renamed before descending into its body.
pub fn subst(e: &Expr, mapping: &FxHashMap<Name, Expr>) -> Expr {
    if mapping.is_empty() {
        return e.clone();
    }
    let mut replacement_names = FxHashSet::default();
    for value in mapping.values() {
        replacement_names.extend(free_vars(value).into_iter().map(|v| v.name));
    }
    subst_rec(e, mapping, &replacement_names)
}

/// Single-variable [`subst`].
pub fn subst_one(e: &Expr, name: &Name, value: &Expr) -> Expr {
    let mut mapping = FxHashMap::default();
    mapping.insert(name.clone(), value.clone());
    subst(e, &mapping)
}

fn subst_rec(e: &Expr, mapping: &FxHashMap<Name, Expr>, captured: &FxHashSet<Name>) -> Expr {
    ensure_sufficient_stack(|| match &e.kind {
        ExprKind::Var(name) => mapping.get(name).cloned().unwrap_or_else(|| e.clone()),
        _ => match binder_of(e) {
            Some(lam) => {
                // The collection is substituted here; the body is handled by
                // `subst_lambda`, which knows about the binder.
                let body: *const Expr = &*lam.body;
                map_children(e, &mut |child| {
                    if std::ptr::eq(child, body) {
                        child.clone()
                    } else {
                        subst_rec(child, mapping, captured)
                    }
                })
                .with_lambda(|l| subst_lambda(l, mapping, captured))
            }
            None => map_children(e, &mut |child| subst_rec(child, mapping, captured)),
        },
    })
}

fn subst_lambda(lam: &Lambda, mapping: &FxHashMap<Name, Expr>, captured: &FxHashSet<Name>) -> Lambda {
    let mut inner = mapping.clone();
    inner.remove(&lam.arg.name);
    if inner.is_empty() {
        return lam.clone();
    }
    if captured.contains(&lam.arg.name) {
        let mut avoid = all_names(&lam.body);
        avoid.extend(captured.iter().cloned());
        avoid.extend(inner.keys().cloned());
        avoid.insert(lam.arg.name.clone());
        let renamed = fresh_var(&lam.arg, &avoid);
        let mut rename = FxHashMap::default();
        rename.insert(lam.arg.name.clone(), renamed.to_expr());
        let body = subst_rec(&lam.body, &rename, &FxHashSet::default());
        return Lambda::new(renamed, subst_rec(&body, &inner, captured));
    }
    Lambda::new(lam.arg.clone(), subst_rec(&lam.body, &inner, captured))
}

impl Expr {
    /// Replace the lambda of a binder node, keeping everything else.
    #[must_use]
    pub fn with_lambda(mut self, f: impl FnOnce(&Lambda) -> Lambda) -> Expr {
        match &mut self.kind {
            ExprKind::Filter { predicate: l, .. }
            | ExprKind::Map { func: l, .. }
            | ExprKind::SortBy { key: l, .. }
            | ExprKind::MakeMap { value: l, .. } => {
                *l = f(l);
            }
            _ => {}
        }
        self
    }
}

// Rewriting

/// A local rewrite applied after a node's children have been rewritten.
pub trait ExprRewriter {
    fn rewrite(&mut self, e: Expr) -> Expr;
}

/// Rewrite every node of `e`, children first.
pub fn rewrite_bottom_up<R: ExprRewriter + ?Sized>(e: &Expr, r: &mut R) -> Expr {
    ensure_sufficient_stack(|| {
        let rebuilt = map_children(e, &mut |child| rewrite_bottom_up(child, r));
        r.rewrite(rebuilt)
    })
}

#[cfg(test)]
mod tests;
