//! Lazy enumeration of proven-correct plans for one query.
//!
//! The search keeps a current best plan, the target, and tries to improve
//! it one subexpression at a time. Sites of the target are visited RUNTIME
//! first, then by binder depth, then largest first; for each growing size,
//! every grammar candidate of the site's type is substituted in. A result
//! that disagrees with the query on a known example is dropped without a
//! solver call. One that survives the cheap screens and is cheaper than the
//! target goes to the solver:
//!
//! - proven equal: it is yielded and becomes the new target
//! - refuted: the counterexample joins the examples and the search restarts
//!   with the refined grammar
//!
//! Candidates the solver refuted or could not decide are never offered
//! again.

use std::time::Instant;

use rustc_hash::FxHashSet;
use strata_ir::{default_value, BinaryOp, Expr, ExprKind, ExtensionRegistry, Pool, Type, UnaryOp};
use strata_simplify::simplify;
use strata_solver::{eval, DecisionProcedure, Env, Model, Oracle, SatResult, Validity, Value};
use strata_stack::ensure_sufficient_stack;
use strata_wf::{exp_wf, shred, Context};

use crate::explore::{exploration_order, replace_at, Site};
use crate::grammar::{fingerprint, Example, Fingerprint, Grammar};
use crate::{AsymptoticCostModel, Cost, CostModel, Plan, Query, Structure, SynthError};

/// Largest candidate size tried when no limit is configured otherwise.
pub const DEFAULT_SIZE_LIMIT: usize = 4;

/// What happened to the candidates an [`Enumerator`] looked at.
///
/// Every candidate lands in exactly one bucket.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EnumStats {
    pub candidates: usize,
    pub proven: usize,
    /// Disagreed with the query on a known example.
    pub refuted: usize,
    /// Rejected by [`good_idea`] before reaching the solver.
    pub heuristic: usize,
    pub not_wf: usize,
    /// No cheaper than the current best plan.
    pub too_expensive: usize,
    pub not_equivalent: usize,
    pub inconclusive: usize,
    /// Examples the search tests candidates on, counterexamples included.
    pub examples: usize,
    /// Enumeration stopped at the deadline.
    pub timed_out: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Start,
    Search,
    Done,
}

/// Produces plans proven equal to the query under its assumptions, each
/// strictly cheaper than the one before.
///
/// The first plan is the query itself. Every later candidate is
/// simplified, screened by [`good_idea`], checked for well-formedness at
/// RUNTIME under the root context, and finally proven equivalent to the
/// query's specification. Candidates the solver cannot decide are
/// rejected.
///
/// Not restartable: a new enumerator starts the search over.
pub struct Enumerator<'a, D> {
    query: &'a Query,
    spec: Expr,
    root: Context,
    /// Assumption formulas, one per assumption.
    formulas: Vec<Expr>,
    assumptions: Expr,
    registry: &'a ExtensionRegistry,
    oracle: Oracle<D>,
    cost: AsymptoticCostModel,
    size_limit: Option<usize>,
    deadline: Option<Instant>,
    phase: Phase,
    stats: EnumStats,

    examples: Vec<Example>,
    spec_fingerprint: Fingerprint,
    target: Expr,
    target_cost: Cost,
    target_size: usize,
    grammar: Grammar,
    sites: Vec<Site>,
    size: usize,
    /// Next site to draw candidates from.
    site: usize,
    /// Candidates left for `sites[site - 1]` at `size`, last first.
    queue: Vec<Expr>,
    /// Results looked at since the target last changed.
    seen: FxHashSet<Expr>,
    /// Results the solver refuted or could not decide.
    blacklist: FxHashSet<Expr>,
}

impl<'a, D: DecisionProcedure> Enumerator<'a, D> {
    /// `global` are the assumptions shared by every query, as written.
    pub fn new(
        structure: &Structure,
        query: &'a Query,
        global: &[Expr],
        registry: &'a ExtensionRegistry,
        backend: D,
    ) -> Result<Self, SynthError> {
        if let Some(arg) = query.args.iter().find(|a| structure.field_type(&a.name).is_some()) {
            return Err(SynthError::ShadowedField {
                query: query.name.clone(),
                arg: arg.name.clone(),
            });
        }
        let spec = structure.specification(query)?;
        let mut oracle = Oracle::new(backend);
        let formulas: Vec<Expr> = global
            .iter()
            .chain(&query.assumptions)
            .map(|a| structure.assumption(a))
            .collect();
        for f in &formulas {
            oracle.assume(f.clone());
        }
        let cost = AsymptoticCostModel::default();
        Ok(Enumerator {
            query,
            root: Context::root(vec![structure.xs.clone()], query.args.clone()),
            assumptions: Expr::all(formulas.clone()),
            formulas,
            registry,
            oracle,
            grammar: Grammar::new(Vec::new(), Vec::new(), cost.clone()),
            cost,
            size_limit: Some(DEFAULT_SIZE_LIMIT),
            deadline: None,
            phase: Phase::Start,
            stats: EnumStats::default(),
            examples: Vec::new(),
            spec_fingerprint: Vec::new(),
            target: spec.clone(),
            target_cost: Cost::default(),
            target_size: 0,
            sites: Vec::new(),
            size: 1,
            site: 0,
            queue: Vec::new(),
            seen: FxHashSet::default(),
            blacklist: FxHashSet::default(),
            spec,
        })
    }

    /// Stop producing candidates once `deadline` has passed. An in-flight
    /// solver call is not interrupted.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Rank candidates, and decide which are improvements, with `cost`.
    #[must_use]
    pub fn with_cost_model(mut self, cost: AsymptoticCostModel) -> Self {
        self.cost = cost;
        self
    }

    /// Largest candidate size tried. `None` searches until the deadline.
    #[must_use]
    pub fn with_size_limit(mut self, limit: Option<usize>) -> Self {
        self.size_limit = limit;
        self
    }

    pub fn stats(&self) -> EnumStats {
        self.stats
    }

    pub fn specification(&self) -> &Expr {
        &self.spec
    }

    pub fn oracle(&self) -> &Oracle<D> {
        &self.oracle
    }

    fn start(&mut self) -> Option<Result<Plan, SynthError>> {
        self.phase = Phase::Done;
        let model = match self.oracle.satisfiable(&Expr::bool(true)) {
            SatResult::Sat(model) => model,
            SatResult::Unsat => {
                tracing::warn!(query = %self.query.name, "assumptions are unsatisfiable; the query can never be called");
                return default_value(&self.spec.ty).map(|zero| Ok(Plan::new(zero)));
            }
            SatResult::Unknown(reason) => {
                return Some(Err(SynthError::Undecidable {
                    query: self.query.name.clone(),
                    reason,
                }));
            }
        };
        self.examples.push(self.example(&model));

        // An example where the query keeps some elements but not all.
        let xs = self.root.visible(Pool::State).into_iter().map(|v| v.to_expr());
        let partial = xs
            .map(|xs| {
                let kept = Expr::len(self.spec.clone());
                Expr::and(Expr::lt(Expr::int(0), kept.clone()), Expr::lt(kept, Expr::len(xs)))
            })
            .collect::<Vec<_>>();
        if let SatResult::Sat(model) = self.oracle.satisfiable(&Expr::all(partial)) {
            let example = self.example(&model);
            if !self.examples.contains(&example) {
                self.examples.push(example);
            }
        }

        self.phase = Phase::Search;
        let spec = Plan::new(self.spec.clone());
        self.adopt(&spec);
        match exp_wf(&spec.expr, &self.root, Pool::Runtime, &self.assumptions, self.registry, &mut self.oracle) {
            Ok(()) => {
                self.stats.candidates += 1;
                self.stats.proven += 1;
                Some(Ok(spec))
            }
            Err(e) => {
                tracing::warn!(query = %self.query.name, "specification is not well-formed: {e}");
                None
            }
        }
    }

    /// Values of the root variables in `model`; unknowns the model leaves
    /// out take their default.
    fn example(&self, model: &Model) -> Example {
        self.root
            .vars()
            .into_iter()
            .filter_map(|(var, _)| {
                let value = match model.get(var.name.as_str()) {
                    Some(v) => v.clone(),
                    None => eval(&default_value(&var.ty)?, &mut Env::new()).ok()?,
                };
                Some((var.name.clone(), value))
            })
            .collect()
    }

    /// Make `plan` the target and search around it from the smallest size.
    fn adopt(&mut self, plan: &Plan) {
        self.target = plan.expr.clone();
        self.target_cost = self.cost.cost(plan);
        self.target_size = plan.expr.size();
        self.seen.clear();
        self.restart();
    }

    fn restart(&mut self) {
        self.grammar = Grammar::new(self.hints(), self.examples.clone(), self.cost.clone());
        self.spec_fingerprint = fingerprint(&self.spec, &self.examples);
        self.sites = exploration_order(&self.target, &self.root);
        self.size = 1;
        self.site = 0;
        self.queue.clear();
        self.stats.examples = self.examples.len();
    }

    /// Fragments of the query, the target and the assumptions.
    fn hints(&self) -> Vec<Expr> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for e in std::iter::once(&self.spec).chain([&self.target]).chain(&self.formulas) {
            for (sub, _, _) in shred(e, &self.root, Pool::Runtime) {
                if seen.insert(sub) {
                    out.push(sub.clone());
                }
            }
        }
        out
    }

    /// The next candidate and the site it replaces, or `None` once every
    /// size up to the limit is exhausted.
    fn next_candidate(&mut self) -> Option<(usize, Expr)> {
        loop {
            if let Some(c) = self.queue.pop() {
                return Some((self.site - 1, c));
            }
            if self.size_limit.is_some_and(|limit| self.size > limit) {
                return None;
            }
            if self.site < self.sites.len() {
                let site = &self.sites[self.site];
                let ty = site.sub.ty.clone();
                let mut found = self.grammar.candidates(&site.ctx, site.pool, self.size);
                found.retain(|c| c.ty == ty);
                found.reverse();
                self.queue = found;
                self.site += 1;
                continue;
            }
            if self.sites.is_empty() {
                return None;
            }
            self.size += 1;
            self.site = 0;
            tracing::debug!(query = %self.query.name, size = self.size, "growing candidates");
        }
    }

    /// Check one candidate; `Some` if it is proven correct and cheaper.
    fn step(&mut self) -> Option<Plan> {
        let Some((site, candidate)) = self.next_candidate() else {
            self.phase = Phase::Done;
            return None;
        };
        let site = &self.sites[site];
        if candidate == site.sub {
            return None;
        }
        let expr = simplify(&replace_at(&self.target, &site.path, &candidate));
        if expr == self.target || self.seen.contains(&expr) || self.blacklist.contains(&expr) {
            return None;
        }
        self.seen.insert(expr.clone());
        self.stats.candidates += 1;
        let plan = Plan::new(expr);

        if fingerprint(&plan.expr, &self.examples) != self.spec_fingerprint {
            self.stats.refuted += 1;
            return None;
        }
        let screened = shred(&plan.expr, &self.root, Pool::Runtime)
            .into_iter()
            .find_map(|(sub, _, pool)| good_idea(sub, pool).err());
        if let Some(reason) = screened {
            tracing::trace!(%plan, "rejected: {reason}");
            self.stats.heuristic += 1;
            return None;
        }
        if let Err(e) = exp_wf(&plan.expr, &self.root, Pool::Runtime, &self.assumptions, self.registry, &mut self.oracle) {
            tracing::debug!(%plan, "rejected: {e}");
            self.stats.not_wf += 1;
            return None;
        }
        let cost = self.cost.cost(&plan);
        if (cost, plan.expr.size()) >= (self.target_cost, self.target_size) {
            self.stats.too_expensive += 1;
            return None;
        }

        match self.oracle.valid(&Expr::equals(plan.expr.clone(), self.spec.clone())) {
            Validity::Valid => {
                self.stats.proven += 1;
                self.adopt(&plan);
                if heuristic_done(&plan.expr) {
                    self.phase = Phase::Done;
                }
                Some(plan)
            }
            Validity::Invalid(model) => {
                tracing::debug!(%plan, %model, "rejected: not equivalent");
                self.stats.not_equivalent += 1;
                self.blacklist.insert(plan.expr.clone());
                if let Some(example) = self.counterexample(&model, &plan.expr) {
                    tracing::debug!(query = %self.query.name, "new example: {model}");
                    self.examples.push(example);
                    self.restart();
                }
                None
            }
            Validity::Inconclusive(reason) => {
                tracing::debug!(%plan, %reason, "rejected: inconclusive");
                self.stats.inconclusive += 1;
                self.blacklist.insert(plan.expr.clone());
                None
            }
        }
    }

    /// `model` as a new example, if it satisfies the assumptions, tells
    /// `candidate` apart from the query, and is not known yet.
    fn counterexample(&self, model: &Model, candidate: &Expr) -> Option<Example> {
        let example = self.example(model);
        if self.examples.contains(&example) {
            return None;
        }
        let holds = |e: &Expr| eval(e, &mut example.iter().cloned().collect()) == Ok(Value::Bool(true));
        let differs = Expr::not(Expr::equals(candidate.clone(), self.spec.clone()));
        (holds(&self.assumptions) && holds(&differs)).then_some(example)
    }
}

impl<D: DecisionProcedure> Iterator for Enumerator<'_, D> {
    type Item = Result<Plan, SynthError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.phase != Phase::Done && self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.stats.timed_out = true;
                self.phase = Phase::Done;
            }
            match self.phase {
                Phase::Done => return None,
                Phase::Start => {
                    if let Some(item) = self.start() {
                        return Some(item);
                    }
                }
                Phase::Search => {
                    if let Some(plan) = self.step() {
                        return Some(Ok(plan));
                    }
                }
            }
        }
    }
}

/// Cheap screen for a node not worth a solver call, given the pool it is
/// evaluated in. Checks `e` alone, not its children.
pub fn good_idea(e: &Expr, pool: Pool) -> Result<(), &'static str> {
    match &e.kind {
        ExprKind::StateVar(inner) => {
            if strata_ir::free_vars(inner).is_empty() {
                return Err("constant value in state position");
            }
            if pool == Pool::Runtime {
                if let ExprKind::Binary { left, right, .. } = &inner.kind {
                    if left.ty.is_scalar() && right.ty.is_scalar() {
                        return Err("constant-time binary operator in state position");
                    }
                }
            }
        }
        ExprKind::MakeMap { keys, .. } if keys.kind == ExprKind::Empty => return Err("trivially empty map"),
        ExprKind::Binary {
            op: BinaryOp::Sub, ..
        } if pool == Pool::State && e.ty.is_collection() => return Err("collection subtraction in state position"),
        _ => {}
    }
    if let Type::Map { key, value } = &e.ty {
        if !key.is_scalar() {
            return Err("map keyed by a non-scalar");
        }
        if matches!(**value, Type::Map { .. }) {
            return Err("map to map");
        }
    }
    Ok(())
}

/// Is `e` as good as it gets? A plan built only from variables, literals
/// and constant-time reads leaves nothing to improve.
pub fn heuristic_done(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Var(_) | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Empty => true,
        ExprKind::Singleton(inner) | ExprKind::StateVar(inner) | ExprKind::GetField { record: inner, .. } => {
            ensure_sufficient_stack(|| heuristic_done(inner))
        }
        ExprKind::Unary {
            op: UnaryOp::Not | UnaryOp::Neg,
            operand,
        } => ensure_sufficient_stack(|| heuristic_done(operand)),
        _ => false,
    }
}

#[cfg(test)]
mod tests;
