//! Cross-query plan selection.
//!
//! Exhaustive backtracking over the product of the per-query best-sets.
//! Exponential in the number of queries; only tractable because best-sets
//! hold ties, not whole search spaces.

use strata_ir::Name;

use crate::{BestSet, Cost, GlobalCostModel, Plan};

/// One plan per query minimising `model` over all combinations.
///
/// Queries with an empty best-set get `None` and take no part in the
/// search. Among equally cheap combinations the first in discovery order
/// wins.
pub fn select(queries: &[(&Name, &BestSet)], model: &dyn GlobalCostModel) -> Vec<Option<Plan>> {
    let candidates: Vec<(&Name, &[Plan])> = queries
        .iter()
        .filter(|(_, best)| !best.is_empty())
        .map(|(name, best)| (*name, best.plans()))
        .collect();

    let mut search = Search {
        candidates: &candidates,
        model,
        current: Vec::with_capacity(candidates.len()),
        best: None,
    };
    search.go(0);

    let mut chosen = search.best.map(|(_, picks)| picks).unwrap_or_default().into_iter();
    queries
        .iter()
        .map(|(_, best)| {
            if best.is_empty() {
                None
            } else {
                chosen.next().map(|i| best.plans()[i].clone())
            }
        })
        .collect()
}

/// The first plan of every best-set.
pub fn select_first(queries: &[(&Name, &BestSet)]) -> Vec<Option<Plan>> {
    queries.iter().map(|(_, best)| best.first().cloned()).collect()
}

struct Search<'a> {
    candidates: &'a [(&'a Name, &'a [Plan])],
    model: &'a dyn GlobalCostModel,
    /// Plan index per query assigned so far.
    current: Vec<usize>,
    best: Option<(Cost, Vec<usize>)>,
}

impl Search<'_> {
    fn go(&mut self, i: usize) {
        let candidates = self.candidates;
        let Some((_, plans)) = candidates.get(i) else {
            let assignment: Vec<(&Name, &Plan)> = candidates
                .iter()
                .zip(&self.current)
                .map(|((name, plans), &j)| (*name, &plans[j]))
                .collect();
            let cost = self.model.cost(&assignment);
            if self.best.as_ref().map_or(true, |(best, _)| cost < *best) {
                self.best = Some((cost, self.current.clone()));
            }
            return;
        };
        for j in 0..plans.len() {
            self.current.push(j);
            self.go(i + 1);
            self.current.pop();
        }
    }
}
