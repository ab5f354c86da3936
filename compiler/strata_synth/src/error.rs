use strata_ir::{Name, Type};
use thiserror::Error;

/// Per-query synthesis failures. None of these abort other queries.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SynthError {
    #[error("query {query}: unknown sort field {field}")]
    UnknownField { query: Name, field: Name },
    #[error("query {query}: cannot sort by {field} of type {ty}")]
    UnorderedField { query: Name, field: Name, ty: Type },
    #[error("query {query}: argument {arg} has the same name as a field")]
    ShadowedField { query: Name, arg: Name },
    #[error("query {query}: solver cannot decide the assumptions: {reason}")]
    Undecidable { query: Name, reason: String },
}
