//! Well-formedness checking.

use strata_ir::{Expr, ExprKind, ExtensionRegistry, Pool, WfRequest};
use strata_solver::{DecisionProcedure, Oracle};
use thiserror::Error;

use crate::context::conj;
use crate::{shred, Context};

/// A well-formedness violation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{reason} (at `{offending}` in `{expr}`)")]
pub struct WfError {
    /// The expression handed to [`exp_wf`].
    pub expr: Expr,
    /// The node that violates the rules.
    pub offending: Expr,
    pub reason: String,
}

/// Check `e`, evaluated in `pool` under `ctx`, for pool discipline and
/// extension-specific rules.
///
/// `assumptions` is expressed in `ctx`; it is adapted to every nested
/// context and conjoined with that context's path condition before being
/// handed to extension hooks. The oracle is only consulted through those
/// hooks.
pub fn exp_wf<D: DecisionProcedure>(
    e: &Expr,
    ctx: &Context,
    pool: Pool,
    assumptions: &Expr,
    registry: &ExtensionRegistry,
    oracle: &mut Oracle<D>,
) -> Result<(), WfError> {
    for (sub, sub_ctx, sub_pool) in shred(e, ctx, pool) {
        if let Some(reason) = check_node(sub, &sub_ctx, sub_pool, ctx, assumptions, registry, oracle) {
            tracing::trace!(%reason, offending = %sub, "not well-formed");
            return Err(WfError {
                expr: e.clone(),
                offending: sub.clone(),
                reason,
            });
        }
    }
    Ok(())
}

fn check_node<D: DecisionProcedure>(
    e: &Expr,
    ctx: &Context,
    pool: Pool,
    root: &Context,
    assumptions: &Expr,
    registry: &ExtensionRegistry,
    oracle: &mut Oracle<D>,
) -> Option<String> {
    match &e.kind {
        ExprKind::Extension(ext) => {
            let Some(handler) = registry.handler(ext.kind.as_str()) else {
                return Some(format!("no handler for extension {}", ext.kind));
            };
            let state_vars = ctx.visible(Pool::State);
            let args = ctx.visible(Pool::Runtime);
            let known = conj(ctx.adapt(assumptions, root), ctx.path_condition());
            let request = WfRequest {
                state_vars: &state_vars,
                args: &args,
                pool,
                assumptions: &known,
            };
            handler.check_wf(e, &request, &mut |f| oracle.is_valid(f))
        }
        ExprKind::StateVar(_) if pool == Pool::State => {
            Some("state promotion inside persisted state".to_string())
        }
        ExprKind::Var(name) => match ctx.pool_of(name) {
            None => Some(format!("unbound variable {name}")),
            Some(Pool::State) if pool == Pool::Runtime => Some(format!(
                "state variable {name} used at runtime without promotion"
            )),
            Some(Pool::Runtime) if pool == Pool::State => {
                Some(format!("runtime argument {name} leaked into persisted state"))
            }
            Some(_) => None,
        },
        _ => None,
    }
}
