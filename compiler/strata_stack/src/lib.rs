//! Stack growth for recursive IR walks.
//!
//! Expression trees handed to the synthesizer can nest arbitrarily deep
//! (long conjunction chains, nested filters produced by the enumerator).
//! Every recursive walk in the workspace (substitution, free variables,
//! shredding, simplification, evaluation) goes through
//! [`ensure_sufficient_stack`] so that nesting depth is bounded by memory,
//! not by the thread's initial stack.

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if less than the red zone remains.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// WASM manages its own stack; call through.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
