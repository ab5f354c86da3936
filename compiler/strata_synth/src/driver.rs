//! Per-query synthesis and cross-query selection.
//!
//! Queries run one after another. Each one is answered from the cache or
//! enumerated until its deadline; only once every best-set is final does
//! selection pick one plan per query.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use strata_ir::{Expr, ExtensionRegistry, Name};
use strata_solver::{SolverConfig, Z3Solver};

use crate::cache::{CacheKey, FsPlanCache, NoCache, PlanCache};
use crate::select::{select, select_first};
use crate::{
    AsymptoticCostModel, BestSet, CostModel, CostParams, EnumStats, Enumerator, Offer, QueryResult,
    Specification, Structure, SynthError, WeightedCostModel, DEFAULT_SIZE_LIMIT,
};

/// Configuration for the [`Synthesizer`].
#[derive(Clone, Debug)]
pub struct SynthConfig {
    /// Per-query enumeration budget. `None`, or a budget too large to
    /// represent as a deadline, runs until the search is exhausted.
    pub timeout: Option<Duration>,
    /// Largest candidate size the search builds. `None` searches until
    /// the timeout.
    pub size_limit: Option<usize>,
    /// Read and write the result cache.
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    pub solver: SolverConfig,
    /// Cardinality assumptions of the per-query cost model. Overridden by
    /// a cost-model file's `collection_size`.
    pub cost: CostParams,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            timeout: None,
            size_limit: Some(DEFAULT_SIZE_LIMIT),
            cache_enabled: true,
            cache_dir: FsPlanCache::default_dir(),
            solver: SolverConfig::default(),
            cost: CostParams::default(),
        }
    }
}

/// Runs every query of a [`Specification`] and selects the final plans.
pub struct Synthesizer<'a> {
    config: SynthConfig,
    registry: &'a ExtensionRegistry,
    cache: Box<dyn PlanCache + 'a>,
    global: Option<WeightedCostModel>,
}

impl<'a> Synthesizer<'a> {
    /// Synthesizer caching under `config.cache_dir`, or not at all when
    /// caching is disabled.
    pub fn new(config: SynthConfig, registry: &'a ExtensionRegistry) -> Self {
        let cache: Box<dyn PlanCache + 'a> = if config.cache_enabled {
            Box::new(FsPlanCache::new(config.cache_dir.clone()))
        } else {
            Box::new(NoCache)
        };
        Synthesizer {
            config,
            registry,
            cache,
            global: None,
        }
    }

    /// Replace the result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: impl PlanCache + 'a) -> Self {
        self.cache = Box::new(cache);
        self
    }

    /// Select plans jointly under `model` instead of taking the first
    /// plan of each best-set.
    #[must_use]
    pub fn with_cost_model(mut self, model: WeightedCostModel) -> Self {
        self.global = Some(model);
        self
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Synthesize every query, then select one plan per query.
    ///
    /// `input` is the full input text the specification was parsed from;
    /// it keys the cache.
    pub fn run(&self, input: &str, spec: &Specification) -> Vec<QueryResult> {
        let arg_vars: Vec<_> = spec.queries.iter().flat_map(|q| q.args.iter().cloned()).collect();
        let structure = Structure::new(spec.fields.clone(), &arg_vars);
        let mut results: Vec<QueryResult> = spec
            .queries
            .iter()
            .map(|query| {
                let result = self.synthesize(input, &structure, &spec.assumptions, query);
                tracing::info!(
                    query = %result.query,
                    plans = result.best.len(),
                    cost = ?result.best.cost(),
                    "found {} great plans",
                    result.best.len()
                );
                for plan in result.best.plans() {
                    tracing::info!(query = %result.query, "    {plan}");
                }
                result
            })
            .collect();
        self.select(&mut results);
        results
    }

    /// One query's best-set, from the cache or by enumeration.
    pub fn synthesize(
        &self,
        input: &str,
        structure: &Structure,
        global: &[Expr],
        query: &crate::Query,
    ) -> QueryResult {
        let _span = tracing::info_span!("synthesize", query = %query.name).entered();
        let key = CacheKey::new(input, query.name.as_str());

        if self.config.cache_enabled {
            if let Some(best) = self.cache.get(&key) {
                tracing::info!(%key, "loaded cached plans");
                return QueryResult {
                    query: query.name.clone(),
                    best,
                    chosen: None,
                    stats: EnumStats::default(),
                    from_cache: true,
                    error: None,
                };
            }
        }

        for a in global.iter().chain(&query.assumptions) {
            tracing::info!("assuming {a}");
        }
        tracing::info!("predicate {}", query.predicate);

        let Enumeration {
            best,
            stats,
            error,
            searched,
        } = self.enumerate(structure, global, query);
        tracing::info!(
            candidates = stats.candidates,
            proven = stats.proven,
            refuted = stats.refuted,
            heuristic = stats.heuristic,
            not_wf = stats.not_wf,
            too_expensive = stats.too_expensive,
            not_equivalent = stats.not_equivalent,
            inconclusive = stats.inconclusive,
            examples = stats.examples,
            "enumeration finished"
        );

        // A query rejected before the search has nothing worth keeping.
        if self.config.cache_enabled && searched {
            if let Err(e) = self.cache.put(&key, &best) {
                tracing::warn!(%key, "failed to save cached plans: {e}");
            }
        }

        QueryResult {
            query: query.name.clone(),
            best,
            chosen: None,
            stats,
            from_cache: false,
            error,
        }
    }

    fn enumerate(
        &self,
        structure: &Structure,
        global: &[Expr],
        query: &crate::Query,
    ) -> Enumeration {
        let mut best = BestSet::new();
        let model = self.per_query_model();
        let backend = Z3Solver::new(self.config.solver);
        let mut plans = match Enumerator::new(structure, query, global, self.registry, backend) {
            Ok(e) => e
                .with_deadline(self.config.timeout.and_then(|t| Instant::now().checked_add(t)))
                .with_cost_model(model.clone())
                .with_size_limit(self.config.size_limit),
            Err(e) => {
                tracing::error!("{e}");
                return Enumeration {
                    best,
                    stats: EnumStats::default(),
                    error: Some(e),
                    searched: false,
                };
            }
        };

        let mut seen = FxHashSet::default();
        let mut error = None;
        for item in plans.by_ref() {
            let plan = match item {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::warn!("stopping due to error: {e}");
                    error = Some(e);
                    break;
                }
            };
            if !seen.insert(plan.clone()) {
                continue;
            }
            let cost = model.cost(&plan);
            match best.offer(plan.clone(), cost) {
                Offer::Improved => tracing::info!(%cost, "found plan {plan} *** improvement"),
                Offer::Tied => tracing::info!(%cost, "found plan {plan}"),
                Offer::Worse => tracing::debug!(%cost, "found plan {plan}; worse than the best"),
                Offer::Duplicate => {}
            }
        }
        let stats = plans.stats();
        if stats.timed_out {
            tracing::info!("timed out");
        }
        Enumeration {
            best,
            stats,
            error,
            searched: true,
        }
    }

    fn per_query_model(&self) -> AsymptoticCostModel {
        match &self.global {
            Some(global) => global.per_query().clone(),
            None => AsymptoticCostModel::new(self.config.cost),
        }
    }

    fn select(&self, results: &mut [QueryResult]) {
        let chosen = {
            let queries: Vec<(&Name, &BestSet)> = results.iter().map(|r| (&r.query, &r.best)).collect();
            match &self.global {
                Some(model) => select(&queries, model),
                None => select_first(&queries),
            }
        };
        for (result, plan) in results.iter_mut().zip(chosen) {
            result.chosen = plan;
        }
    }
}

/// Outcome of one query's search.
struct Enumeration {
    best: BestSet,
    stats: EnumStats,
    error: Option<SynthError>,
    /// The search ran; false when the query was rejected up front.
    searched: bool,
}
