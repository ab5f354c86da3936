//! Pool discipline for strata plans.
//!
//! Every bound variable is tagged with a [`Pool`](strata_ir::Pool): STATE
//! values are computed once and persisted in the structure, RUNTIME values
//! are recomputed per call. This crate provides:
//!
//! - [`Context`]: a scope tree of bindings with pool tags and path conditions
//! - [`shred`]: every subexpression paired with the context and pool it
//!   executes under
//! - [`exp_wf`]: the well-formedness checker built on top of both

mod context;
mod shred;
mod wf;

pub use context::{Context, Scope};
pub use shred::{shred, Shredded};
pub use wf::{exp_wf, WfError};
