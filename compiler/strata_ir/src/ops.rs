//! Operators.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Integer addition, or union (concatenation) of two collections.
    Add,
    /// Integer subtraction, or multiset difference of two collections.
    Sub,
    /// Membership of the left operand in the right collection.
    In,
}

impl BinaryOp {
    /// Operators whose result is `bool` regardless of operand types.
    pub fn is_predicate(self) -> bool {
        !matches!(self, BinaryOp::Add | BinaryOp::Sub)
    }

    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::In => "in",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Not,
    Neg,
    /// Remove duplicate elements.
    Distinct,
    /// Number of elements.
    Len,
    /// Collection has no elements.
    Empty,
    /// Collection has at least one element.
    Exists,
    /// Sum of an integer collection.
    Sum,
}

impl UnaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "-",
            UnaryOp::Distinct => "distinct",
            UnaryOp::Len => "len",
            UnaryOp::Empty => "empty",
            UnaryOp::Exists => "exists",
            UnaryOp::Sum => "sum",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}
