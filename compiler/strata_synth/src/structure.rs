//! Binding of field names to the stored collection.
//!
//! Predicates and assumptions are written against bare field names. The
//! engine stores elements as records in one persisted bag `xs`, so a
//! predicate `age < 18` becomes the element test `\r -> r.age < 18` and a
//! query becomes `filter(state(xs), \r -> r.age < 18)`.

use rustc_hash::{FxHashMap, FxHashSet};
use strata_ir::{fresh_var, free_vars, subst, Expr, Lambda, Name, Type, Var};

use crate::{Query, SynthError};

/// The stored collection and its element binder.
#[derive(Clone, Debug)]
pub struct Structure {
    pub fields: Vec<(Name, Type)>,
    /// The persisted collection, `bag<{fields}>`.
    pub xs: Var,
    /// Element binder used by every lambda over `xs`.
    pub row: Var,
}

impl Structure {
    /// Name the collection `xs` and the element `r`, unless a field or an
    /// argument already uses those names.
    pub fn new(fields: Vec<(Name, Type)>, args: &[Var]) -> Self {
        let mut taken: FxHashSet<Name> = fields.iter().map(|(n, _)| n.clone()).collect();
        taken.extend(args.iter().map(|v| v.name.clone()));
        let row_ty = Type::Record(fields.clone());
        let xs = pick(Var::new("xs", Type::bag(row_ty.clone())), &mut taken);
        let row = pick(Var::new("r", row_ty), &mut taken);
        Structure { fields, xs, row }
    }

    pub fn field_type(&self, name: &Name) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn mentions_fields(&self, e: &Expr) -> bool {
        free_vars(e)
            .iter()
            .any(|v| self.field_type(&v.name).is_some())
    }

    /// `e` with every field reference replaced by a read of the element.
    pub fn bind(&self, e: &Expr) -> Expr {
        let mapping: FxHashMap<Name, Expr> = self
            .fields
            .iter()
            .map(|(name, _)| (name.clone(), Expr::get_field(self.row.to_expr(), name.clone())))
            .collect();
        subst(e, &mapping)
    }

    /// `\r -> e[f := r.f]`.
    pub fn element_test(&self, e: &Expr) -> Lambda {
        Lambda::new(self.row.clone(), self.bind(e))
    }

    /// `\r -> r.field`.
    pub fn key(&self, field: &Name) -> Lambda {
        Lambda::new(self.row.clone(), Expr::get_field(self.row.to_expr(), field.clone()))
    }

    /// The defining expression of `query`: what every plan must equal.
    pub fn specification(&self, query: &Query) -> Result<Expr, SynthError> {
        let scan = Expr::filter(Expr::state_var(self.xs.to_expr()), self.element_test(&query.predicate));
        match &query.sort_field {
            None => Ok(scan),
            Some(field) => {
                self.sort_key(query, field)?;
                Ok(Expr::sort_by(scan, self.key(field)))
            }
        }
    }

    /// Check that `field` can order the results of `query`.
    pub fn sort_key(&self, query: &Query, field: &Name) -> Result<(), SynthError> {
        match self.field_type(field) {
            None => Err(SynthError::UnknownField {
                query: query.name.clone(),
                field: field.clone(),
            }),
            Some(ty) if !ty.is_scalar() => Err(SynthError::UnorderedField {
                query: query.name.clone(),
                field: field.clone(),
                ty: ty.clone(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// An assumption as a solver formula. Assumptions over fields hold for
    /// every stored element: `len(filter(xs, \r -> not a)) == 0`.
    pub fn assumption(&self, a: &Expr) -> Expr {
        if !self.mentions_fields(a) {
            return a.clone();
        }
        let violations = Expr::filter(self.xs.to_expr(), self.element_test(&Expr::not(a.clone())));
        Expr::equals(Expr::len(violations), Expr::int(0))
    }
}

fn pick(var: Var, taken: &mut FxHashSet<Name>) -> Var {
    let var = if taken.contains(&var.name) {
        fresh_var(&var, taken)
    } else {
        var
    };
    taken.insert(var.name.clone());
    var
}
