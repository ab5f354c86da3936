//! Candidate plans and the running best-set.

use std::fmt;

use serde::{Deserialize, Serialize};
use strata_ir::{Expr, ExprKind};

use crate::Cost;

/// One way to answer a query.
///
/// `expr` is evaluated per call, in the RUNTIME pool. Every `StateVar`
/// subexpression names a value persisted in the structure and maintained
/// on updates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plan {
    pub expr: Expr,
}

impl Plan {
    pub fn new(expr: Expr) -> Self {
        Plan { expr }
    }

    /// Persisted values, outermost first, without duplicates.
    pub fn persisted(&self) -> Vec<&Expr> {
        fn go<'e>(e: &'e Expr, out: &mut Vec<&'e Expr>) {
            if let ExprKind::StateVar(inner) = &e.kind {
                if !out.contains(&&**inner) {
                    out.push(inner);
                }
                return;
            }
            for child in e.children() {
                go(child, out);
            }
        }
        let mut out = Vec::new();
        go(&self.expr, &mut out);
        out
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

/// Outcome of [`BestSet::offer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Offer {
    /// Strictly cheaper than everything so far; the set was reset.
    Improved,
    /// Tied with the current best; added.
    Tied,
    /// More expensive; discarded.
    Worse,
    /// Already in the set.
    Duplicate,
}

/// Plans tied at the lowest cost seen so far, in discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestSet {
    cost: Option<Cost>,
    plans: Vec<Plan>,
}

impl BestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, plan: Plan, cost: Cost) -> Offer {
        match self.cost {
            Some(best) if cost > best => Offer::Worse,
            Some(best) if cost == best => {
                if self.plans.contains(&plan) {
                    return Offer::Duplicate;
                }
                self.plans.push(plan);
                Offer::Tied
            }
            _ => {
                self.cost = Some(cost);
                self.plans = vec![plan];
                Offer::Improved
            }
        }
    }

    pub fn cost(&self) -> Option<Cost> {
        self.cost
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn first(&self) -> Option<&Plan> {
        self.plans.first()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[cfg(test)]
mod tests;
