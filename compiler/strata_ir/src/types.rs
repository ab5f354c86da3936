//! Types attached to IR nodes.

use crate::Name;

/// Result type of an expression.
///
/// Types are immutable values with no lifecycle of their own; every
/// [`Expr`](crate::Expr) owns a copy of its type.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    // ===== Scalars =====
    Bool,
    Int,
    Str,

    // ===== Collections =====
    /// Unordered multiset.
    Bag(Box<Type>),
    /// Ordered sequence.
    List(Box<Type>),
    /// Finite map.
    Map { key: Box<Type>, value: Box<Type> },

    /// Record with named fields, in declaration order.
    Record(Vec<(Name, Type)>),

    /// Type contributed by a structure library, e.g. `array<int>`.
    Extension { name: Name, args: Vec<Type> },
}

impl Type {
    pub fn bag(elem: Type) -> Self {
        Type::Bag(Box::new(elem))
    }

    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Bool | Type::Int | Type::Str)
    }

    /// Bags and lists; maps are not iterable collections.
    pub fn is_collection(&self) -> bool {
        matches!(self, Type::Bag(_) | Type::List(_))
    }

    /// Element type of a bag or list.
    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Bag(t) | Type::List(t) => Some(t),
            _ => None,
        }
    }

    /// Same collection kind as `self`, holding `elem`.
    ///
    /// Non-collections yield a bag.
    pub fn with_elem(&self, elem: Type) -> Type {
        match self {
            Type::List(_) => Type::list(elem),
            _ => Type::bag(elem),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Type> {
        match self {
            Type::Record(fields) => fields.iter().find(|(f, _)| f == name).map(|(_, t)| t),
            _ => None,
        }
    }
}
