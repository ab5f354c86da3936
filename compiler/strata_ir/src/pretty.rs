//! Human-readable rendering of IR, used in diagnostics and progress output.

use std::fmt;

use crate::extension::ExtensionStmt;
use crate::{Expr, ExprKind, Lambda, Stmt, Type, UnaryOp};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::Str => f.write_str("str"),
            Type::Bag(t) => write!(f, "bag<{t}>"),
            Type::List(t) => write!(f, "list<{t}>"),
            Type::Map { key, value } => write!(f, "map<{key}, {value}>"),
            Type::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {t}")?;
                }
                f.write_str("}")
            }
            Type::Extension { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    write_list(f, args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\{} -> {}", self.arg.name, self.body)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::Int(i) => write!(f, "{i}"),
            ExprKind::Str(s) => write!(f, "{s:?}"),
            ExprKind::Empty => f.write_str("[]"),
            ExprKind::Var(name) => write!(f, "{name}"),
            ExprKind::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "not {operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
                _ => write!(f, "{op}({operand})"),
            },
            ExprKind::Cond {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "({cond} ? {then_branch} : {else_branch})"),
            ExprKind::Filter { source, predicate } => write!(f, "filter({source}, {predicate})"),
            ExprKind::Map { source, func } => write!(f, "map({source}, {func})"),
            ExprKind::SortBy { source, key } => write!(f, "sort_by({source}, {key})"),
            ExprKind::MakeMap { keys, value } => write!(f, "make_map({keys}, {value})"),
            ExprKind::MapGet { map, key } => write!(f, "{map}[{key}]"),
            ExprKind::GetField { record, field } => write!(f, "{record}.{field}"),
            ExprKind::MakeRecord(fields) => {
                f.write_str("{")?;
                for (i, (name, e)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {e}")?;
                }
                f.write_str("}")
            }
            ExprKind::Singleton(e) => write!(f, "[{e}]"),
            ExprKind::StateVar(e) => write!(f, "state({e})"),
            ExprKind::Extension(ext) => {
                write!(f, "{}(", ext.kind)?;
                write_list(f, &ext.args)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for ExtensionStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        write_list(f, &self.args)?;
        f.write_str(")")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::NoOp => f.write_str("pass"),
            Stmt::Seq(stmts) => {
                for (i, s) in stmts.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{s}")?;
                }
                Ok(())
            }
            Stmt::Assign { target, value } => write!(f, "{target} = {value}"),
            Stmt::Extension(ext) => write!(f, "{ext}"),
        }
    }
}
