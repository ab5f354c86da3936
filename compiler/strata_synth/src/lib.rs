//! Plan synthesis for strata.
//!
//! Given a record type, global assumptions and a list of queries, finds for
//! each query the cheapest plans proven equal to it, then picks one plan
//! per query so the whole structure is cheapest:
//!
//! - [`Enumerator`]: lazy, proven-correct plans for one query, each
//!   cheaper than the last
//! - [`BestSet`]: the plans tied at minimal cost
//! - [`select`]: cross-query choice under a [`GlobalCostModel`]
//! - [`PlanCache`]: best-sets persisted between runs
//! - [`Synthesizer`]: all of the above, query by query

mod accelerate;
mod cache;
mod cost;
mod driver;
mod enumerate;
mod error;
mod explore;
mod grammar;
mod plan;
mod query;
mod select;
mod structure;

pub use cache::{CacheError, CacheKey, FsPlanCache, MemoryPlanCache, NoCache, PlanCache};
pub use cost::{
    AsymptoticCostModel, Cost, CostModel, CostModelError, CostModelFile, CostParams, GlobalCostModel,
    SumCostModel, WeightedCostModel,
};
pub use driver::{SynthConfig, Synthesizer};
pub use enumerate::{good_idea, heuristic_done, EnumStats, Enumerator, DEFAULT_SIZE_LIMIT};
pub use error::SynthError;
pub use plan::{BestSet, Offer, Plan};
pub use query::{Query, QueryResult, Specification};
pub use select::{select, select_first};
pub use structure::Structure;
