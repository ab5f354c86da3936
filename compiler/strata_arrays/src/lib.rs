//! Array-backed structures.
//!
//! Contributes to the IR:
//! - the type `array<T>`
//! - expressions `ArrayCapacity(a)` and `ArrayGet(a, i)`
//! - statements `ArrayAlloc(a, n)`, `ArrayReAlloc(a, n)` and
//!   `EnsureCapacity(a, n)`
//!
//! and registers one well-formedness hook ([`ArrayExtension`]) that
//! rejects array reads which cannot be proven in bounds.

use std::sync::Arc;

use strata_ir::{
    Expr, ExprKind, ExtensionHandler, ExtensionRegistry, ExtensionStmt, Name, Stmt, Type, WfRequest,
};

pub const ARRAY: &str = "array";
pub const ARRAY_CAPACITY: &str = "ArrayCapacity";
pub const ARRAY_GET: &str = "ArrayGet";
pub const ARRAY_ALLOC: &str = "ArrayAlloc";
pub const ARRAY_REALLOC: &str = "ArrayReAlloc";
pub const ENSURE_CAPACITY: &str = "EnsureCapacity";

/// `array<elem>`.
pub fn array_type(elem: Type) -> Type {
    Type::Extension {
        name: Name::from(ARRAY),
        args: vec![elem],
    }
}

/// Element type of an array type.
pub fn array_elem(ty: &Type) -> Option<&Type> {
    match ty {
        Type::Extension { name, args } if name == ARRAY => args.first(),
        _ => None,
    }
}

pub fn array_capacity(array: Expr) -> Expr {
    Expr::extension(ARRAY_CAPACITY, vec![array], Type::Int)
}

/// Read element `index`. A non-array operand yields an `int`-typed node,
/// which the well-formedness hook rejects.
pub fn array_get(array: Expr, index: Expr) -> Expr {
    let ty = array_elem(&array.ty).cloned().unwrap_or(Type::Int);
    Expr::extension(ARRAY_GET, vec![array, index], ty)
}

fn stmt(kind: &str, args: Vec<Expr>) -> Stmt {
    Stmt::Extension(ExtensionStmt {
        kind: Name::from(kind),
        args,
    })
}

pub fn array_alloc(array: Expr, capacity: Expr) -> Stmt {
    stmt(ARRAY_ALLOC, vec![array, capacity])
}

pub fn array_realloc(array: Expr, new_capacity: Expr) -> Stmt {
    stmt(ARRAY_REALLOC, vec![array, new_capacity])
}

pub fn ensure_capacity(array: Expr, capacity: Expr) -> Stmt {
    stmt(ENSURE_CAPACITY, vec![array, capacity])
}

/// Statements that materialise a persisted collection of `len` elements
/// into the array `target`: allocate on first use, grow afterwards.
pub fn materialize(target: Expr, len: Expr) -> Stmt {
    Stmt::seq([
        array_alloc(target.clone(), len.clone()),
        ensure_capacity(target, len),
    ])
}

/// Well-formedness hook for array expressions.
#[derive(Debug, Default)]
pub struct ArrayExtension;

impl ArrayExtension {
    pub fn registry() -> ExtensionRegistry {
        ExtensionRegistry::new().with(Arc::new(ArrayExtension))
    }
}

impl ExtensionHandler for ArrayExtension {
    fn expr_kinds(&self) -> &'static [&'static str] {
        &[ARRAY_CAPACITY, ARRAY_GET]
    }

    fn check_wf(
        &self,
        e: &Expr,
        request: &WfRequest<'_>,
        is_valid: &mut dyn FnMut(&Expr) -> bool,
    ) -> Option<String> {
        let ExprKind::Extension(ext) = &e.kind else {
            return Some("not an array expression".to_string());
        };
        let Some(array) = ext.args.first() else {
            return Some(format!("{} without an array operand", ext.kind));
        };
        if array_elem(&array.ty).is_none() {
            return Some(format!("{} applied to non-array of type {}", ext.kind, array.ty));
        }
        match ext.kind.as_str() {
            ARRAY_CAPACITY => None,
            ARRAY_GET => {
                let Some(index) = ext.args.get(1) else {
                    return Some("ArrayGet without an index".to_string());
                };
                if index.ty != Type::Int {
                    return Some(format!("array index of type {}", index.ty));
                }
                let in_bounds = Expr::and(
                    Expr::le(Expr::int(0), index.clone()),
                    Expr::lt(index.clone(), array_capacity(array.clone())),
                );
                if is_valid(&Expr::implies(request.assumptions.clone(), in_bounds)) {
                    None
                } else {
                    Some(format!("index {index} may be out of bounds of {array}"))
                }
            }
            other => Some(format!("unknown array expression {other}")),
        }
    }
}
