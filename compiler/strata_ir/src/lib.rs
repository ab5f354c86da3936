//! Strata IR - typed terms for data-structure synthesis
//!
//! This crate contains the term language every other strata crate works on:
//! - [`Type`]: scalars, collections, maps, records, extension types
//! - [`Expr`] / [`ExprKind`]: typed expression trees
//! - [`Stmt`]: structure-mutation steps, routed to code emitters untouched
//! - [`Pool`]: the STATE / RUNTIME tag on bound variables
//! - [`ExtensionRegistry`]: the single plug-in point for structure libraries
//!
//! # Design
//!
//! - **Boxed trees, structural equality**: plans are compared and hashed
//!   structurally for de-duplication, so every node derives `Eq + Hash`.
//! - **Typed nodes**: each [`Expr`] carries its result type; nothing here
//!   infers types, builders compute them from operand types.
//! - **Uniform extension payloads**: extension nodes carry a kind name plus
//!   child expressions, so generic walks never need extension knowledge.
//!
//! With the `cache` feature every IR type also implements serde's
//! `Serialize` / `Deserialize`.

mod default;
mod expr;
pub mod extension;
mod name;
mod ops;
mod pool;
mod pretty;
mod stmt;
mod types;
pub mod visit;

pub use default::default_value;
pub use expr::{Expr, ExprKind, Lambda, Var};
pub use extension::{ExtensionExpr, ExtensionHandler, ExtensionRegistry, ExtensionStmt, WfRequest};
pub use name::Name;
pub use ops::{BinaryOp, UnaryOp};
pub use pool::Pool;
pub use stmt::Stmt;
pub use types::Type;
pub use visit::{
    all_names, binder_of, free_vars, fresh_var, map_children, rewrite_bottom_up, subst, subst_one,
    ExprRewriter,
};
