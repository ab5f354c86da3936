//! Parsed input handed to the engine.

use std::path::PathBuf;

use strata_ir::{Expr, Name, Type, Var};

use crate::{BestSet, EnumStats, Plan, SynthError};

/// Everything the parser collaborator produces for one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Specification {
    /// Record fields of the stored elements, in declaration order.
    pub fields: Vec<(Name, Type)>,
    /// Assumptions holding for every query. May mention fields, in which
    /// case they hold for every stored element.
    pub assumptions: Vec<Expr>,
    pub queries: Vec<Query>,
    /// Secondary cost-model file, as written in the input.
    pub cost_model: Option<PathBuf>,
}

/// A named query over the stored collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub name: Name,
    pub args: Vec<Var>,
    /// Query-specific assumptions, over fields and arguments.
    pub assumptions: Vec<Expr>,
    /// Which elements to return, over fields and arguments.
    pub predicate: Expr,
    /// Return matching elements ordered by this field.
    pub sort_field: Option<Name>,
}

/// What the engine produced for one query.
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub query: Name,
    /// Plans tied at minimal cost, in discovery order.
    pub best: BestSet,
    /// The plan picked by cross-query selection; `None` until selection ran
    /// or when no plan was found.
    pub chosen: Option<Plan>,
    /// Enumeration statistics; all zero when the cache answered.
    pub stats: EnumStats,
    pub from_cache: bool,
    /// Why enumeration stopped early, if it did. `best` still holds what
    /// was found before.
    pub error: Option<SynthError>,
}
