//! Where in the current target the search tries substitutions.

use std::cmp::Reverse;

use strata_ir::{map_children, Expr, Pool};
use strata_stack::ensure_sufficient_stack;
use strata_wf::{shred, Context};

/// A subexpression of the target, addressed by child indices from the
/// root, with the context and pool it runs under.
#[derive(Clone, Debug)]
pub(crate) struct Site {
    pub path: Vec<usize>,
    pub sub: Expr,
    pub ctx: Context,
    pub pool: Pool,
}

/// Every site of `target`: RUNTIME before STATE, shallow binder depth
/// first, larger subexpressions first. Ties keep pre-order.
pub(crate) fn exploration_order(target: &Expr, root: &Context) -> Vec<Site> {
    let mut paths = Vec::new();
    preorder_paths(target, &mut Vec::new(), &mut paths);
    let mut sites: Vec<Site> = shred(target, root, Pool::Runtime)
        .into_iter()
        .zip(paths)
        .map(|((sub, ctx, pool), path)| Site {
            path,
            sub: sub.clone(),
            ctx,
            pool,
        })
        .collect();
    sites.sort_by_key(|s| (s.pool == Pool::State, s.ctx.complexity(), Reverse(s.sub.size())));
    sites
}

fn preorder_paths(e: &Expr, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    out.push(path.clone());
    for (i, child) in e.children().iter().enumerate() {
        path.push(i);
        ensure_sufficient_stack(|| preorder_paths(child, path, out));
        path.pop();
    }
}

/// `e` with the subexpression at `path` replaced by `new`.
pub(crate) fn replace_at(e: &Expr, path: &[usize], new: &Expr) -> Expr {
    let Some((&first, rest)) = path.split_first() else {
        return new.clone();
    };
    let mut index = 0;
    map_children(e, &mut |child| {
        let out = if index == first {
            ensure_sufficient_stack(|| replace_at(child, rest, new))
        } else {
            child.clone()
        };
        index += 1;
        out
    })
}

#[cfg(test)]
mod tests;
