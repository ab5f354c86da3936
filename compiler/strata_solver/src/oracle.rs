//! Memoising front end over a [`DecisionProcedure`].

use std::rc::Rc;

use rustc_hash::FxHashMap;
use strata_ir::Expr;

use crate::{DecisionProcedure, Model, SatResult};

/// Outcome of a validity query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validity {
    Valid,
    /// A counterexample: assumptions hold, the formula does not.
    Invalid(Model),
    /// The backend gave up; callers must not treat this as either answer.
    Inconclusive(String),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

/// Query counters, for diagnostics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OracleStats {
    pub queries: usize,
    pub hits: usize,
}

type CacheKey = (Rc<Vec<Expr>>, Expr);

/// Answers validity and satisfiability questions under a growing set of
/// assumptions.
pub struct Oracle<D> {
    backend: D,
    assumptions: Rc<Vec<Expr>>,
    cache: FxHashMap<CacheKey, SatResult>,
    stats: OracleStats,
}

impl<D: DecisionProcedure> Oracle<D> {
    pub fn new(backend: D) -> Self {
        Oracle {
            backend,
            assumptions: Rc::new(Vec::new()),
            cache: FxHashMap::default(),
            stats: OracleStats::default(),
        }
    }

    /// Add a persistent assumption to every later query.
    pub fn assume(&mut self, e: Expr) {
        if e.is_true() {
            return;
        }
        Rc::make_mut(&mut self.assumptions).push(e);
    }

    pub fn assumptions(&self) -> &[Expr] {
        &self.assumptions
    }

    /// Is `e` satisfiable together with the assumptions?
    pub fn satisfiable(&mut self, e: &Expr) -> SatResult {
        self.stats.queries += 1;
        let key = (Rc::clone(&self.assumptions), e.clone());
        if let Some(hit) = self.cache.get(&key) {
            self.stats.hits += 1;
            return hit.clone();
        }
        let formula = Expr::all(self.assumptions.iter().cloned().chain(std::iter::once(e.clone())));
        let result = self.backend.satisfy(&formula);
        tracing::debug!(query = %e, result = ?outcome(&result), "solver");
        self.cache.insert(key, result.clone());
        result
    }

    /// Does `e` hold in every model of the assumptions?
    pub fn valid(&mut self, e: &Expr) -> Validity {
        match self.satisfiable(&Expr::not(e.clone())) {
            SatResult::Unsat => Validity::Valid,
            SatResult::Sat(model) => Validity::Invalid(model),
            SatResult::Unknown(reason) => Validity::Inconclusive(reason),
        }
    }

    /// [`Oracle::valid`], treating an inconclusive answer as "no".
    pub fn is_valid(&mut self, e: &Expr) -> bool {
        self.valid(e).is_valid()
    }

    pub fn stats(&self) -> OracleStats {
        self.stats
    }

    pub fn backend(&self) -> &D {
        &self.backend
    }
}

fn outcome(r: &SatResult) -> &'static str {
    match r {
        SatResult::Sat(_) => "sat",
        SatResult::Unsat => "unsat",
        SatResult::Unknown(_) => "unknown",
    }
}

#[cfg(test)]
mod tests;
