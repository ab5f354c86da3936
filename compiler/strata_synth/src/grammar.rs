//! Bottom-up candidate construction.
//!
//! Candidates are built per (context, pool) class, one size at a time.
//! Size 1 holds the hint fragments that make sense in the class and the
//! variables visible there; larger sizes combine smaller candidates with
//! the constructors the planner understands. RUNTIME candidates are also
//! offered through [`accelerate`](crate::accelerate).
//!
//! Two candidates of one class that agree on every example are
//! interchangeable; only the cheaper one is kept.

use rustc_hash::{FxHashMap, FxHashSet};
use strata_ir::{fresh_var, Expr, ExprKind, Lambda, Name, Pool, Type, Var};
use strata_solver::{eval, Env, Value};
use strata_wf::{shred, Context, Scope};

use crate::accelerate::accelerate;
use crate::enumerate::good_idea;
use crate::{AsymptoticCostModel, Cost, CostModel, Plan};

/// Values of the root variables; the search tests candidates on these.
pub(crate) type Example = Vec<(Name, Value)>;

/// Result of a candidate on every instantiation of its context; `None`
/// where evaluation fails.
pub(crate) type Fingerprint = Vec<Option<Value>>;

/// Instantiations considered per context.
const MAX_INSTANTIATIONS: usize = 256;

/// Every environment `ctx` can be entered with, starting from `examples`:
/// binders range over their source, conditions drop environments where
/// they fail.
pub(crate) fn instantiate(ctx: &Context, examples: &[Example]) -> Vec<Example> {
    let Some(parent) = ctx.parent() else {
        return examples.to_vec();
    };
    let outer = instantiate(parent, examples);
    match ctx.scope() {
        Scope::Root(_) => outer,
        Scope::Binder { var, source, .. } => {
            let mut out = Vec::new();
            for env in outer {
                let Ok(value) = eval(source, &mut env.iter().cloned().collect()) else {
                    continue;
                };
                for item in value.elements().unwrap_or_default() {
                    if out.len() == MAX_INSTANTIATIONS {
                        return out;
                    }
                    let mut inner = env.clone();
                    inner.push((var.name.clone(), item.clone()));
                    out.push(inner);
                }
            }
            out
        }
        Scope::Condition(cond) => outer
            .into_iter()
            .filter(|env| {
                let mut env: Env = env.iter().cloned().collect();
                eval(cond, &mut env) == Ok(Value::Bool(true))
            })
            .collect(),
    }
}

pub(crate) fn fingerprint(e: &Expr, envs: &[Example]) -> Fingerprint {
    envs.iter()
        .map(|env| eval(e, &mut env.iter().cloned().collect()).ok())
        .collect()
}

/// Does `e` only refer to variables bound in `pool` under `ctx`?
fn fits(e: &Expr, ctx: &Context, pool: Pool) -> bool {
    shred(e, ctx, pool).into_iter().all(|(sub, sub_ctx, sub_pool)| match &sub.kind {
        ExprKind::Var(name) => sub_ctx
            .lookup(name)
            .is_some_and(|(var, p)| p == sub_pool && var.ty == sub.ty),
        ExprKind::StateVar(_) => sub_pool == Pool::Runtime,
        _ => true,
    })
}

struct Class {
    ctx: Context,
    pool: Pool,
    envs: Vec<Example>,
    /// Candidates by size; entry `i` holds size `i + 1`.
    sizes: Vec<Vec<Expr>>,
    members: FxHashSet<Expr>,
    /// Cheapest member per type and fingerprint.
    cheapest: FxHashMap<(Type, Fingerprint), Cost>,
}

pub(crate) struct Grammar {
    hints: Vec<Expr>,
    /// Lambda arguments of the hints, reused as binders.
    binders: Vec<Var>,
    examples: Vec<Example>,
    cost: AsymptoticCostModel,
    classes: Vec<Class>,
    bound: FxHashMap<(usize, Name, Expr), Context>,
}

impl Grammar {
    pub(crate) fn new(hints: Vec<Expr>, examples: Vec<Example>, cost: AsymptoticCostModel) -> Self {
        let mut binders: Vec<Var> = Vec::new();
        for h in &hints {
            if let Some(lam) = strata_ir::binder_of(h) {
                if !binders.contains(&lam.arg) {
                    binders.push(lam.arg.clone());
                }
            }
        }
        Grammar {
            hints,
            binders,
            examples,
            cost,
            classes: Vec::new(),
            bound: FxHashMap::default(),
        }
    }

    /// Candidates of exactly `size` for `pool` under `ctx`.
    pub(crate) fn candidates(&mut self, ctx: &Context, pool: Pool, size: usize) -> Vec<Expr> {
        let idx = self.class(ctx, pool);
        self.of_size(idx, size)
    }

    fn class(&mut self, ctx: &Context, pool: Pool) -> usize {
        if let Some(i) = self.classes.iter().position(|c| c.pool == pool && c.ctx.ptr_eq(ctx)) {
            return i;
        }
        self.classes.push(Class {
            ctx: ctx.clone(),
            pool,
            envs: instantiate(ctx, &self.examples),
            sizes: Vec::new(),
            members: FxHashSet::default(),
            cheapest: FxHashMap::default(),
        });
        self.classes.len() - 1
    }

    fn of_size(&mut self, idx: usize, size: usize) -> Vec<Expr> {
        if size == 0 {
            return Vec::new();
        }
        while self.classes[idx].sizes.len() < size {
            let next = self.classes[idx].sizes.len() + 1;
            let built = self.build(idx, next);
            let admitted = built.into_iter().filter(|e| self.admit(idx, e)).collect();
            self.classes[idx].sizes.push(admitted);
        }
        self.classes[idx].sizes[size - 1].clone()
    }

    fn build(&mut self, idx: usize, size: usize) -> Vec<Expr> {
        let ctx = self.classes[idx].ctx.clone();
        let pool = self.classes[idx].pool;
        let mut out = Vec::new();

        if size == 1 {
            out.extend(self.hints.iter().filter(|h| fits(h, &ctx, pool)).cloned());
            out.extend(ctx.visible(pool).iter().map(Var::to_expr));
        } else {
            if pool == Pool::Runtime {
                let state = self.class(&ctx, Pool::State);
                out.extend(self.of_size(state, size - 1).into_iter().map(Expr::state_var));
            }
            for e in self.of_size(idx, size - 1) {
                if let Type::Record(fields) = &e.ty {
                    out.extend(fields.iter().map(|(f, _)| Expr::get_field(e.clone(), f.clone())));
                }
            }
            for left_size in 1..size - 1 {
                let lefts = self.of_size(idx, left_size);
                let rights = self.of_size(idx, size - 1 - left_size);
                for l in &lefts {
                    for r in &rights {
                        out.extend(combine(l, r));
                    }
                }
                for source in lefts.iter().filter(|s| s.ty.is_collection()) {
                    out.extend(self.comprehensions(idx, source, size - 1 - left_size));
                }
            }
        }

        if pool == Pool::Runtime {
            let accelerated: Vec<Expr> = out.iter().flat_map(|e| accelerate(e, &ctx)).collect();
            out.extend(accelerated);
        }
        out
    }

    /// Filters, maps, sorts and map constructions over `source` whose
    /// lambda body has `body_size`.
    fn comprehensions(&mut self, idx: usize, source: &Expr, body_size: usize) -> Vec<Expr> {
        let Some(elem) = source.ty.elem().cloned() else {
            return Vec::new();
        };
        let ctx = self.classes[idx].ctx.clone();
        let pool = self.classes[idx].pool;
        let arg = self.binder(&elem, &ctx);
        let key = (idx, arg.name.clone(), source.clone());
        let inner = match self.bound.get(&key) {
            Some(c) => c.clone(),
            None => {
                let c = ctx.bind(arg.clone(), pool, source.clone());
                self.bound.insert(key, c.clone());
                c
            }
        };
        let inner_idx = self.class(&inner, pool);

        let mut out = Vec::new();
        for body in self.of_size(inner_idx, body_size) {
            let lam = Lambda::new(arg.clone(), body.clone());
            match &body.ty {
                Type::Bool => out.push(Expr::filter(source.clone(), lam)),
                t if t.is_scalar() => {
                    out.push(Expr::sort_by(source.clone(), lam.clone()));
                    out.push(Expr::map(source.clone(), lam));
                }
                t if t.is_collection() && pool == Pool::State && elem.is_scalar() => {
                    out.push(Expr::make_map(source.clone(), lam));
                }
                _ => {}
            }
        }
        out
    }

    /// A binder for elements of `elem`: a hint's, unless it is already
    /// visible here.
    fn binder(&self, elem: &Type, ctx: &Context) -> Var {
        let visible: FxHashSet<Name> = ctx.vars().into_iter().map(|(v, _)| v.name.clone()).collect();
        let base = self
            .binders
            .iter()
            .find(|v| v.ty == *elem)
            .cloned()
            .unwrap_or_else(|| Var::new("x", elem.clone()));
        if !visible.contains(&base.name) {
            return base;
        }
        let mut avoid = visible;
        for h in &self.hints {
            avoid.extend(strata_ir::all_names(h));
        }
        fresh_var(&base, &avoid)
    }

    /// Keep `e` unless the class already has it, or a member no more
    /// expensive that agrees with it everywhere.
    fn admit(&mut self, idx: usize, e: &Expr) -> bool {
        let class = &mut self.classes[idx];
        if good_idea(e, class.pool).is_err() || class.members.contains(e) {
            return false;
        }
        let fp = fingerprint(e, &class.envs);
        if fp.iter().any(Option::is_some) {
            let cost = self.cost.cost(&Plan::new(e.clone()));
            match class.cheapest.get(&(e.ty.clone(), fp.clone())) {
                Some(best) if *best <= cost => return false,
                _ => {
                    class.cheapest.insert((e.ty.clone(), fp), cost);
                }
            }
        }
        class.members.insert(e.clone());
        true
    }
}

/// Binary constructors over two candidates of one class.
fn combine(l: &Expr, r: &Expr) -> Vec<Expr> {
    let mut out = Vec::new();
    if l.ty == Type::Bool && r.ty == Type::Bool {
        out.push(Expr::and(l.clone(), r.clone()));
    }
    if l.ty == r.ty && l.ty.is_scalar() {
        out.push(Expr::equals(l.clone(), r.clone()));
        if matches!(l.ty, Type::Int | Type::Str) {
            out.push(Expr::lt(l.clone(), r.clone()));
        }
    }
    if let Type::Map { key, .. } = &l.ty {
        if **key == r.ty {
            out.push(Expr::map_get(l.clone(), r.clone()));
        }
    }
    out
}

#[cfg(test)]
mod tests;
