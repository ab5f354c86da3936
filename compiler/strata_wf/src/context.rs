//! Scope tree with pool tags and path conditions.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_ir::{all_names, free_vars, fresh_var, subst, Expr, Name, Pool, Var};

#[derive(Debug)]
enum Node {
    /// Root: the structure's state variables and the query's arguments.
    Root { vars: Vec<(Var, Pool)> },
    /// `var` ranges over `source`, which is expressed in `parent`.
    Binder {
        parent: Context,
        var: Var,
        pool: Pool,
        source: Expr,
    },
    /// `parent` narrowed by `cond`.
    Condition { parent: Context, cond: Expr },
}

/// What one level of a [`Context`] adds to its parent.
#[derive(Copy, Clone, Debug)]
pub enum Scope<'a> {
    Root(&'a [(Var, Pool)]),
    Binder { var: &'a Var, pool: Pool, source: &'a Expr },
    Condition(&'a Expr),
}

/// A position in an expression: what is bound there, in which pool, and
/// what is known to hold.
///
/// Cheap to clone; children share their parent chain.
#[derive(Clone, Debug)]
pub struct Context(Rc<Node>);

impl Context {
    pub fn root(state_vars: Vec<Var>, args: Vec<Var>) -> Self {
        let vars = state_vars
            .into_iter()
            .map(|v| (v, Pool::State))
            .chain(args.into_iter().map(|v| (v, Pool::Runtime)))
            .collect();
        Context(Rc::new(Node::Root { vars }))
    }

    /// Child context binding `var` to the elements of `source`.
    #[must_use]
    pub fn bind(&self, var: Var, pool: Pool, source: Expr) -> Self {
        Context(Rc::new(Node::Binder {
            parent: self.clone(),
            var,
            pool,
            source,
        }))
    }

    /// Child context in which `cond` holds.
    #[must_use]
    pub fn assume(&self, cond: Expr) -> Self {
        if cond.is_true() {
            return self.clone();
        }
        Context(Rc::new(Node::Condition {
            parent: self.clone(),
            cond,
        }))
    }

    pub fn parent(&self) -> Option<&Context> {
        match &*self.0 {
            Node::Root { .. } => None,
            Node::Binder { parent, .. } | Node::Condition { parent, .. } => Some(parent),
        }
    }

    pub fn scope(&self) -> Scope<'_> {
        match &*self.0 {
            Node::Root { vars } => Scope::Root(vars),
            Node::Binder {
                var, pool, source, ..
            } => Scope::Binder {
                var,
                pool: *pool,
                source,
            },
            Node::Condition { cond, .. } => Scope::Condition(cond),
        }
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Is `self` equal to `other` or one of its ancestors?
    pub fn is_ancestor_of(&self, other: &Context) -> bool {
        let mut cur = Some(other);
        while let Some(c) = cur {
            if self.ptr_eq(c) {
                return true;
            }
            cur = c.parent();
        }
        false
    }

    /// Every binding in scope, innermost first. Shadowed bindings are
    /// listed too, after the bindings that shadow them.
    pub fn vars(&self) -> Vec<(&Var, Pool)> {
        let mut out = Vec::new();
        let mut cur = Some(self);
        while let Some(c) = cur {
            match &*c.0 {
                Node::Root { vars } => out.extend(vars.iter().rev().map(|(v, p)| (v, *p))),
                Node::Binder { var, pool, .. } => out.push((var, *pool)),
                Node::Condition { .. } => {}
            }
            cur = c.parent();
        }
        out
    }

    /// The binding `name` refers to here.
    pub fn lookup(&self, name: &Name) -> Option<(&Var, Pool)> {
        self.vars().into_iter().find(|(v, _)| v.name == *name)
    }

    pub fn pool_of(&self, name: &Name) -> Option<Pool> {
        self.lookup(name).map(|(_, pool)| pool)
    }

    /// Variables visible here (not shadowed) that live in `pool`.
    pub fn visible(&self, pool: Pool) -> Vec<Var> {
        let mut seen = FxHashSet::default();
        self.vars()
            .into_iter()
            .filter(|(v, _)| seen.insert(v.name.clone()))
            .filter(|(_, p)| *p == pool)
            .map(|(v, _)| v.clone())
            .collect()
    }

    /// Number of binders between the root and here.
    pub fn complexity(&self) -> usize {
        let mut depth = 0;
        let mut cur = Some(self);
        while let Some(c) = cur {
            if let Node::Binder { .. } = &*c.0 {
                depth += 1;
            }
            cur = c.parent();
        }
        depth
    }

    /// Everything known to hold here: the conditions and binder
    /// memberships on the way from the root, expressed in this context.
    pub fn path_condition(&self) -> Expr {
        match &*self.0 {
            Node::Root { .. } => Expr::bool(true),
            Node::Condition { parent, cond } => conj(parent.path_condition(), cond.clone()),
            Node::Binder {
                parent, var, source, ..
            } => {
                let outer = parent.path_condition();
                let renaming = self.shadow_renaming(&[&outer, source], parent);
                let (outer, source) = (subst(&outer, &renaming), subst(source, &renaming));
                conj(outer, Expr::is_in(var.to_expr(), source))
            }
        }
    }

    /// Rewrite `e`, valid in the ancestor context `from`, into an
    /// equivalent expression valid here.
    ///
    /// Free variables of `e` that are shadowed by binders between `from`
    /// and `self` are renamed to fresh variables: they denote values this
    /// scope can no longer refer to.
    pub fn adapt(&self, e: &Expr, from: &Context) -> Expr {
        subst(e, &self.shadow_renaming(&[e], from))
    }

    /// Fresh names for the free variables of `es` that are shadowed between
    /// `from` and `self`. A variable gets the same name in all of `es`.
    fn shadow_renaming(&self, es: &[&Expr], from: &Context) -> FxHashMap<Name, Expr> {
        debug_assert!(from.is_ancestor_of(self), "adapt from a context that is not an ancestor");

        let mut shadowing = FxHashSet::default();
        let mut cur = Some(self);
        while let Some(c) = cur {
            if c.ptr_eq(from) {
                break;
            }
            if let Node::Binder { var, .. } = &*c.0 {
                shadowing.insert(var.name.clone());
            }
            cur = c.parent();
        }

        let mut renaming = FxHashMap::default();
        if shadowing.is_empty() {
            return renaming;
        }
        let mut avoid: FxHashSet<Name> = self.vars().into_iter().map(|(v, _)| v.name.clone()).collect();
        for e in es {
            avoid.extend(all_names(e));
        }
        for e in es {
            for v in free_vars(e) {
                if shadowing.contains(&v.name) && !renaming.contains_key(&v.name) {
                    let fresh = fresh_var(&v, &avoid);
                    avoid.insert(fresh.name.clone());
                    renaming.insert(v.name, fresh.to_expr());
                }
            }
        }
        renaming
    }
}

/// `a and b`, dropping literal `true` operands.
pub(crate) fn conj(a: Expr, b: Expr) -> Expr {
    if a.is_true() {
        b
    } else if b.is_true() {
        a
    } else {
        Expr::and(a, b)
    }
}
