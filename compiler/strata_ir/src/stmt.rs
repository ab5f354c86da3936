//! Structure-mutation statements.
//!
//! Statements are produced by structure libraries (e.g. array allocation)
//! and consumed by code emitters. The synthesizer routes them alongside
//! plans and never interprets them.

use crate::extension::ExtensionStmt;
use crate::Expr;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Stmt {
    NoOp,
    Seq(Vec<Stmt>),
    Assign { target: Expr, value: Expr },
    Extension(ExtensionStmt),
}

impl Stmt {
    /// Flatten nested sequences and drop no-ops.
    pub fn seq(stmts: impl IntoIterator<Item = Stmt>) -> Stmt {
        let mut flat = Vec::new();
        for s in stmts {
            match s {
                Stmt::NoOp => {}
                Stmt::Seq(inner) => {
                    if let Stmt::Seq(inner) = Stmt::seq(inner) {
                        flat.extend(inner);
                    }
                }
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Stmt::NoOp,
            _ => Stmt::Seq(flat),
        }
    }
}
