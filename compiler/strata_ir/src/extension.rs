//! Extension mechanism for structure libraries.
//!
//! A structure library (see `strata_arrays`) contributes:
//! - types as [`Type::Extension`](crate::Type::Extension)
//! - expressions as [`ExprKind::Extension`](crate::ExprKind::Extension)
//!   carrying an [`ExtensionExpr`]
//! - statements as [`Stmt::Extension`](crate::Stmt::Extension)
//! - exactly one behavioural hook, [`ExtensionHandler::check_wf`]
//!
//! Built-in nodes are dispatched by exhaustive matching; extension nodes
//! fall back to a lookup of their kind name in an [`ExtensionRegistry`].
//! Nothing else in the engine depends on extension internals.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{Expr, Name, Pool, Var};

/// Payload of an extension expression: a kind name plus child expressions.
///
/// The node's result type lives on the enclosing [`Expr`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionExpr {
    pub kind: Name,
    pub args: Vec<Expr>,
}

/// Payload of an extension statement.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionStmt {
    pub kind: Name,
    pub args: Vec<Expr>,
}

/// Everything an extension may consult when judging well-formedness.
pub struct WfRequest<'a> {
    /// Variables bound in the state pool at the node's position.
    pub state_vars: &'a [Var],
    /// Variables bound in the runtime pool at the node's position.
    pub args: &'a [Var],
    /// Pool the node executes in.
    pub pool: Pool,
    /// Caller assumptions conjoined with the path condition, already adapted
    /// to the node's context.
    pub assumptions: &'a Expr,
}

/// Well-formedness hook of a structure library.
pub trait ExtensionHandler: Send + Sync {
    /// Extension expression kinds owned by this handler.
    fn expr_kinds(&self) -> &'static [&'static str];

    /// Check a single node (not its children).
    ///
    /// `is_valid` asks the solver oracle whether a boolean expression holds
    /// under all assignments; inconclusive answers come back as `false`.
    /// Returns a human-readable reason when the node is not well-formed.
    fn check_wf(
        &self,
        e: &Expr,
        request: &WfRequest<'_>,
        is_valid: &mut dyn FnMut(&Expr) -> bool,
    ) -> Option<String>;
}

/// Kind name to handler lookup.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    handlers: FxHashMap<Name, Arc<dyn ExtensionHandler>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every kind it claims. A later registration of
    /// the same kind replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn ExtensionHandler>) {
        for kind in handler.expr_kinds() {
            self.handlers.insert(Name::from(*kind), Arc::clone(&handler));
        }
    }

    #[must_use]
    pub fn with(mut self, handler: Arc<dyn ExtensionHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn handler(&self, kind: &str) -> Option<&dyn ExtensionHandler> {
        self.handlers.get(kind).map(|h| &**h)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(Name::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ExtensionRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
