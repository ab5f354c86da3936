//! Cost models.
//!
//! Per-query cost is an estimate of the work one call performs. Values
//! under `StateVar` are precomputed, so reading one costs a single unit no
//! matter how expensive it was to build. Cross-query cost additionally
//! charges for what the chosen plans persist.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use strata_ir::{BinaryOp, Expr, ExprKind, Name, UnaryOp};
use thiserror::Error;

use crate::Plan;

/// Totally ordered plan cost. Ties are meaningful and preserved.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cost(pub u64);

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scores a single query's plan.
pub trait CostModel {
    fn cost(&self, plan: &Plan) -> Cost;
}

/// Scores one plan per query jointly.
pub trait GlobalCostModel {
    fn cost(&self, assignment: &[(&Name, &Plan)]) -> Cost;
}

/// Cardinality assumptions of the [`AsymptoticCostModel`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CostParams {
    /// Estimated number of stored elements.
    pub collection_size: u64,
    /// A filter keeps `1 / selectivity` of its input.
    pub selectivity: u64,
    /// A filter on an equality keeps `1 / fan_out` of its input.
    pub fan_out: u64,
}

impl Default for CostParams {
    fn default() -> Self {
        CostParams {
            collection_size: 1000,
            selectivity: 2,
            fan_out: 8,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Estimate {
    /// Work to evaluate the expression once.
    cost: u64,
    /// Elements in the result, or 1 for scalars.
    card: u64,
    /// For maps: elements in each value.
    value_card: u64,
}

impl Estimate {
    fn scalar(cost: u64) -> Self {
        Estimate {
            cost,
            card: 1,
            value_card: 1,
        }
    }
}

/// Cost from cardinality estimates: filters and maps are linear in their
/// input, sorts are `n log n`, persisted values are free to read.
#[derive(Clone, Debug, Default)]
pub struct AsymptoticCostModel {
    params: CostParams,
}

impl AsymptoticCostModel {
    pub fn new(params: CostParams) -> Self {
        AsymptoticCostModel { params }
    }

    pub fn params(&self) -> CostParams {
        self.params
    }

    /// Size of a persisted value.
    pub fn storage(&self, persisted: &Expr) -> u64 {
        let est = self.estimate(persisted);
        if matches!(persisted.ty, strata_ir::Type::Map { .. }) {
            est.card.saturating_add(est.card.saturating_mul(est.value_card))
        } else {
            est.card
        }
    }

    fn estimate(&self, e: &Expr) -> Estimate {
        let p = self.params;
        match &e.kind {
            ExprKind::StateVar(inner) => {
                let stored = self.estimate(inner);
                Estimate { cost: 1, ..stored }
            }
            ExprKind::Var(_) => Estimate {
                cost: 1,
                card: if e.ty.is_collection() { p.collection_size } else { 1 },
                value_card: 1,
            },
            ExprKind::Empty => Estimate {
                cost: 1,
                card: 0,
                value_card: 0,
            },
            ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Str(_) => Estimate::scalar(1),
            ExprKind::Filter { source, predicate } => {
                let s = self.estimate(source);
                let body = self.estimate(&predicate.body);
                let div = if is_equality(&predicate.body) { p.fan_out } else { p.selectivity };
                Estimate {
                    cost: s.cost.saturating_add(s.card.saturating_mul(body.cost)),
                    card: s.card / div.max(1),
                    value_card: 1,
                }
            }
            ExprKind::Map { source, func } => {
                let s = self.estimate(source);
                let body = self.estimate(&func.body);
                Estimate {
                    cost: s.cost.saturating_add(s.card.saturating_mul(body.cost)),
                    ..s
                }
            }
            ExprKind::SortBy { source, key } => {
                let s = self.estimate(source);
                let body = self.estimate(&key.body);
                let compare = s.card.saturating_mul(u64::from(u64::BITS - s.card.leading_zeros()));
                Estimate {
                    cost: s
                        .cost
                        .saturating_add(s.card.saturating_mul(body.cost))
                        .saturating_add(compare),
                    ..s
                }
            }
            ExprKind::MakeMap { keys, value } => {
                let k = self.estimate(keys);
                let body = self.estimate(&value.body);
                Estimate {
                    cost: k.cost.saturating_add(k.card.saturating_mul(body.cost)),
                    card: k.card,
                    value_card: body.card,
                }
            }
            ExprKind::MapGet { map, key } => {
                let m = self.estimate(map);
                let k = self.estimate(key);
                Estimate {
                    cost: m.cost.saturating_add(k.cost).saturating_add(1),
                    card: m.value_card,
                    value_card: 1,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.estimate(left);
                let r = self.estimate(right);
                let base = l.cost.saturating_add(r.cost);
                match op {
                    BinaryOp::In => Estimate::scalar(base.saturating_add(r.card)),
                    BinaryOp::Add | BinaryOp::Sub if e.ty.is_collection() => Estimate {
                        cost: base.saturating_add(l.card).saturating_add(r.card),
                        card: l.card.saturating_add(r.card),
                        value_card: 1,
                    },
                    _ => Estimate::scalar(base.saturating_add(1)),
                }
            }
            ExprKind::Unary { op, operand } => {
                let o = self.estimate(operand);
                let cost = o.cost.saturating_add(o.card);
                match op {
                    UnaryOp::Distinct => Estimate { cost, ..o },
                    _ => Estimate::scalar(cost),
                }
            }
            ExprKind::Cond {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.estimate(cond);
                let t = self.estimate(then_branch);
                let f = self.estimate(else_branch);
                Estimate {
                    cost: c.cost.saturating_add(t.cost.max(f.cost)).saturating_add(1),
                    card: t.card.max(f.card),
                    value_card: t.value_card.max(f.value_card),
                }
            }
            ExprKind::Singleton(inner) => Estimate::scalar(self.estimate(inner).cost.saturating_add(1)),
            ExprKind::GetField { .. } | ExprKind::MakeRecord(_) | ExprKind::Extension(_) => {
                let cost = e
                    .children()
                    .iter()
                    .fold(1u64, |acc, c| acc.saturating_add(self.estimate(c).cost));
                Estimate::scalar(cost)
            }
        }
    }
}

/// Does a filter body test some element property for equality?
fn is_equality(body: &Expr) -> bool {
    body.conjuncts().iter().any(|c| {
        matches!(
            c.kind,
            ExprKind::Binary {
                op: BinaryOp::Eq,
                ..
            }
        )
    })
}

impl CostModel for AsymptoticCostModel {
    fn cost(&self, plan: &Plan) -> Cost {
        Cost(self.estimate(&plan.expr).cost)
    }
}

/// Sum of independent per-query costs.
#[derive(Clone, Debug, Default)]
pub struct SumCostModel<C>(pub C);

impl<C: CostModel> GlobalCostModel for SumCostModel<C> {
    fn cost(&self, assignment: &[(&Name, &Plan)]) -> Cost {
        Cost(
            assignment
                .iter()
                .fold(0u64, |acc, (_, plan)| acc.saturating_add(self.0.cost(plan).0)),
        )
    }
}

/// Weighted per-query costs plus a charge for persisted values; a value
/// persisted by several plans is stored, and charged, once.
#[derive(Clone, Debug)]
pub struct WeightedCostModel {
    per_query: AsymptoticCostModel,
    weights: FxHashMap<Name, u64>,
    storage_weight: u64,
}

/// On-disk form of a [`WeightedCostModel`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostModelFile {
    pub collection_size: Option<u64>,
    pub query_weights: BTreeMap<String, u64>,
    pub storage_weight: u64,
}

#[derive(Debug, Error)]
pub enum CostModelError {
    #[error("cannot read cost model {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cost model: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeightedCostModel {
    pub fn new(file: CostModelFile) -> Self {
        let params = CostParams {
            collection_size: file.collection_size.unwrap_or(CostParams::default().collection_size),
            ..CostParams::default()
        };
        WeightedCostModel {
            per_query: AsymptoticCostModel::new(params),
            weights: file
                .query_weights
                .into_iter()
                .map(|(k, v)| (Name::from(k), v))
                .collect(),
            storage_weight: file.storage_weight,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, CostModelError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn load(path: &Path) -> Result<Self, CostModelError> {
        let text = std::fs::read_to_string(path).map_err(|source| CostModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// The per-query model, sharing this model's cardinality assumptions.
    pub fn per_query(&self) -> &AsymptoticCostModel {
        &self.per_query
    }

    fn weight(&self, query: &Name) -> u64 {
        self.weights.get(query).copied().unwrap_or(1)
    }
}

impl GlobalCostModel for WeightedCostModel {
    fn cost(&self, assignment: &[(&Name, &Plan)]) -> Cost {
        let mut total = 0u64;
        let mut stored: FxHashSet<&Expr> = FxHashSet::default();
        for (query, plan) in assignment {
            total = total.saturating_add(self.weight(query).saturating_mul(self.per_query.cost(plan).0));
            stored.extend(plan.persisted());
        }
        let storage = stored
            .into_iter()
            .fold(0u64, |acc, e| acc.saturating_add(self.per_query.storage(e)));
        Cost(total.saturating_add(self.storage_weight.saturating_mul(storage)))
    }
}

#[cfg(test)]
mod tests;
