//! Typed expression trees.

use crate::extension::ExtensionExpr;
use crate::{BinaryOp, Name, Type, UnaryOp};

/// A typed variable: free variables, lambda binders and context bindings.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Var {
    pub name: Name,
    pub ty: Type,
}

impl Var {
    pub fn new(name: impl Into<Name>, ty: Type) -> Self {
        Var {
            name: name.into(),
            ty,
        }
    }

    /// Reference to this variable.
    pub fn to_expr(&self) -> Expr {
        Expr::new(ExprKind::Var(self.name.clone()), self.ty.clone())
    }
}

/// A single-argument function, used by filters, maps, sorts and map
/// construction.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Lambda {
    pub arg: Var,
    pub body: Box<Expr>,
}

impl Lambda {
    pub fn new(arg: Var, body: Expr) -> Self {
        Lambda {
            arg,
            body: Box::new(body),
        }
    }

    /// Substitute `value` for the argument in the body.
    ///
    /// Capture-avoiding: inner binders that would capture a free variable of
    /// `value` are renamed first.
    pub fn apply_to(&self, value: &Expr) -> Expr {
        crate::visit::subst_one(&self.body, &self.arg.name, value)
    }
}

/// An expression node together with its result type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

/// Expression variants.
///
/// Built-in variants form a closed set; structure libraries contribute
/// nodes through [`ExprKind::Extension`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    // ===== Literals =====
    Bool(bool),
    Int(i64),
    Str(String),
    /// Empty collection or map of the node's type.
    Empty,

    Var(Name),

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    // ===== Comprehensions =====
    /// Elements of `source` satisfying `predicate`; keeps the collection kind.
    Filter { source: Box<Expr>, predicate: Lambda },
    /// `func` applied to each element of `source`.
    Map { source: Box<Expr>, func: Lambda },
    /// Stable sort of `source` by `key`; always produces a list.
    SortBy { source: Box<Expr>, key: Lambda },

    // ===== Maps =====
    /// Map from each distinct element of `keys` to `value` applied to it.
    MakeMap { keys: Box<Expr>, value: Lambda },
    /// Lookup; a missing key yields the default value of the value type.
    MapGet { map: Box<Expr>, key: Box<Expr> },

    // ===== Records =====
    GetField { record: Box<Expr>, field: Name },
    MakeRecord(Vec<(Name, Expr)>),

    /// One-element collection.
    Singleton(Box<Expr>),

    /// Value computed in the state pool and read back at runtime.
    StateVar(Box<Expr>),

    Extension(ExtensionExpr),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr { kind, ty }
    }

    // ===== Literals =====

    pub fn bool(b: bool) -> Self {
        Expr::new(ExprKind::Bool(b), Type::Bool)
    }

    pub fn int(i: i64) -> Self {
        Expr::new(ExprKind::Int(i), Type::Int)
    }

    pub fn str(s: impl Into<String>) -> Self {
        Expr::new(ExprKind::Str(s.into()), Type::Str)
    }

    pub fn empty(ty: Type) -> Self {
        Expr::new(ExprKind::Empty, ty)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ExprKind::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    // ===== Operators =====

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let ty = if op.is_predicate() {
            Type::Bool
        } else {
            left.ty.clone()
        };
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        let ty = match op {
            UnaryOp::Not | UnaryOp::Empty | UnaryOp::Exists => Type::Bool,
            UnaryOp::Neg | UnaryOp::Len | UnaryOp::Sum => Type::Int,
            UnaryOp::Distinct => operand.ty.clone(),
        };
        Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn and(a: Expr, b: Expr) -> Self {
        Expr::binary(BinaryOp::And, a, b)
    }

    pub fn or(a: Expr, b: Expr) -> Self {
        Expr::binary(BinaryOp::Or, a, b)
    }

    pub fn not(a: Expr) -> Self {
        Expr::unary(UnaryOp::Not, a)
    }

    pub fn implies(a: Expr, b: Expr) -> Self {
        Expr::or(Expr::not(a), b)
    }

    pub fn equals(a: Expr, b: Expr) -> Self {
        Expr::binary(BinaryOp::Eq, a, b)
    }

    pub fn lt(a: Expr, b: Expr) -> Self {
        Expr::binary(BinaryOp::Lt, a, b)
    }

    pub fn le(a: Expr, b: Expr) -> Self {
        Expr::binary(BinaryOp::Le, a, b)
    }

    pub fn is_in(elem: Expr, collection: Expr) -> Self {
        Expr::binary(BinaryOp::In, elem, collection)
    }

    pub fn len(collection: Expr) -> Self {
        Expr::unary(UnaryOp::Len, collection)
    }

    /// Conjunction of `parts`; `true` when empty.
    pub fn all(parts: impl IntoIterator<Item = Expr>) -> Self {
        parts
            .into_iter()
            .reduce(Expr::and)
            .unwrap_or_else(|| Expr::bool(true))
    }

    /// Disjunction of `parts`; `false` when empty.
    pub fn any(parts: impl IntoIterator<Item = Expr>) -> Self {
        parts
            .into_iter()
            .reduce(Expr::or)
            .unwrap_or_else(|| Expr::bool(false))
    }

    pub fn cond(cond: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        let ty = then_branch.ty.clone();
        Expr::new(
            ExprKind::Cond {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            ty,
        )
    }

    // ===== Comprehensions =====

    pub fn filter(source: Expr, predicate: Lambda) -> Self {
        let ty = source.ty.clone();
        Expr::new(
            ExprKind::Filter {
                source: Box::new(source),
                predicate,
            },
            ty,
        )
    }

    pub fn map(source: Expr, func: Lambda) -> Self {
        let ty = source.ty.with_elem(func.body.ty.clone());
        Expr::new(
            ExprKind::Map {
                source: Box::new(source),
                func,
            },
            ty,
        )
    }

    pub fn sort_by(source: Expr, key: Lambda) -> Self {
        let ty = Type::list(key.arg.ty.clone());
        Expr::new(
            ExprKind::SortBy {
                source: Box::new(source),
                key,
            },
            ty,
        )
    }

    // ===== Maps =====

    pub fn make_map(keys: Expr, value: Lambda) -> Self {
        let ty = Type::map(value.arg.ty.clone(), value.body.ty.clone());
        Expr::new(
            ExprKind::MakeMap {
                keys: Box::new(keys),
                value,
            },
            ty,
        )
    }

    /// Lookup in `map`. An operand that is not a map yields its own type,
    /// i.e. ill-typed input produces ill-typed output.
    pub fn map_get(map: Expr, key: Expr) -> Self {
        let ty = match &map.ty {
            Type::Map { value, .. } => (**value).clone(),
            other => other.clone(),
        };
        Expr::new(
            ExprKind::MapGet {
                map: Box::new(map),
                key: Box::new(key),
            },
            ty,
        )
    }

    // ===== Records =====

    pub fn get_field(record: Expr, field: impl Into<Name>) -> Self {
        let field = field.into();
        let ty = record
            .ty
            .field(field.as_str())
            .cloned()
            .unwrap_or_else(|| record.ty.clone());
        Expr::new(
            ExprKind::GetField {
                record: Box::new(record),
                field,
            },
            ty,
        )
    }

    pub fn make_record(fields: Vec<(Name, Expr)>) -> Self {
        let ty = Type::Record(fields.iter().map(|(n, e)| (n.clone(), e.ty.clone())).collect());
        Expr::new(ExprKind::MakeRecord(fields), ty)
    }

    pub fn singleton(elem: Expr) -> Self {
        let ty = Type::bag(elem.ty.clone());
        Expr::new(ExprKind::Singleton(Box::new(elem)), ty)
    }

    pub fn state_var(inner: Expr) -> Self {
        let ty = inner.ty.clone();
        Expr::new(ExprKind::StateVar(Box::new(inner)), ty)
    }

    pub fn extension(kind: impl Into<Name>, args: Vec<Expr>, ty: Type) -> Self {
        Expr::new(
            ExprKind::Extension(ExtensionExpr {
                kind: kind.into(),
                args,
            }),
            ty,
        )
    }
}
