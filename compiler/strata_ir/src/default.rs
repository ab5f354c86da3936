//! Zero values.

use crate::{Expr, Type};

/// The zero value of `ty`: `false`, `0`, `""`, an empty collection or map,
/// or a record of zero values.
///
/// Extension types have no zero value the core knows about.
pub fn default_value(ty: &Type) -> Option<Expr> {
    match ty {
        Type::Bool => Some(Expr::bool(false)),
        Type::Int => Some(Expr::int(0)),
        Type::Str => Some(Expr::str("")),
        Type::Bag(_) | Type::List(_) | Type::Map { .. } => Some(Expr::empty(ty.clone())),
        Type::Record(fields) => {
            let values = fields
                .iter()
                .map(|(name, t)| default_value(t).map(|v| (name.clone(), v)))
                .collect::<Option<Vec<_>>>()?;
            Some(Expr::make_record(values))
        }
        Type::Extension { .. } => None,
    }
}
