//! Solver oracle for strata.
//!
//! The synthesizer never decides formulas itself. It asks an [`Oracle`]:
//!
//! - [`Oracle::valid`]: does a boolean expression hold under every
//!   assignment consistent with the accumulated assumptions?
//! - [`Oracle::satisfiable`]: is there such an assignment?
//!
//! The oracle memoises answers keyed by the syntactic (assumptions,
//! formula) pair and delegates misses to a [`DecisionProcedure`]. An
//! undecided query surfaces as [`Validity::Inconclusive`], never as
//! "false" and never as "valid".
//!
//! [`Z3Solver`] is the bundled decision procedure. It decides integer and
//! boolean arithmetic exactly and treats collections up to a configured
//! cardinality. The reference evaluator in [`eval`] gives every construct
//! its meaning; tests and the synthesizer use it to check models.

pub mod eval;
mod oracle;
mod smt;
mod value;

pub use smt::{SolverConfig, Z3Solver};
pub use eval::{eval, Env, EvalError};
pub use oracle::{Oracle, OracleStats, Validity};
pub use value::Value;

use std::fmt;

use strata_ir::{Expr, Var};

/// A satisfying assignment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Model {
    pub assignments: Vec<(Var, Value)>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.assignments
            .iter()
            .find(|(v, _)| v.name == name)
            .map(|(_, value)| value)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (var, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {value}", var.name)?;
        }
        Ok(())
    }
}

/// Answer of a decision procedure.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SatResult {
    Sat(Model),
    Unsat,
    /// The procedure could not decide within its resource bounds.
    Unknown(String),
}

/// External decision procedure consulted by the [`Oracle`].
///
/// The formula's free variables are its unknowns.
pub trait DecisionProcedure {
    fn satisfy(&mut self, formula: &Expr) -> SatResult;
}
