//! Reference evaluator for strata expressions.
//!
//! Used by the synthesizer to fingerprint candidates and vet solver models,
//! and by tests as the ground truth for semantic equivalence. Extension nodes
//! are opaque here: evaluating one is an error.

use std::cmp::Ordering;

use strata_ir::{default_value, BinaryOp, Expr, ExprKind, Lambda, Name, Type, UnaryOp};
use strata_stack::ensure_sufficient_stack;
use thiserror::Error;

use crate::Value;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unbound variable `{0}`")]
    Unbound(Name),
    #[error("ill-typed operands in `{0}`")]
    TypeMismatch(String),
    #[error("cannot evaluate extension node `{0}`")]
    Extension(Name),
    #[error("type {0} has no default value")]
    NoDefault(Type),
}

/// Variable bindings, innermost last.
#[derive(Clone, Debug, Default)]
pub struct Env {
    bindings: Vec<(Name, Value)>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: Name, value: Value) {
        self.bindings.push((name, value));
    }

    fn unbind(&mut self) {
        self.bindings.pop();
    }

    pub fn lookup(&self, name: &Name) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

impl FromIterator<(Name, Value)> for Env {
    fn from_iter<I: IntoIterator<Item = (Name, Value)>>(iter: I) -> Self {
        Env {
            bindings: iter.into_iter().collect(),
        }
    }
}

fn mismatch(e: &Expr) -> EvalError {
    EvalError::TypeMismatch(e.to_string())
}

fn apply(lam: &Lambda, arg: Value, env: &mut Env) -> Result<Value, EvalError> {
    env.bind(lam.arg.name.clone(), arg);
    let result = eval(&lam.body, env);
    env.unbind();
    result
}

fn collection(v: Value, e: &Expr) -> Result<(Vec<Value>, Value), EvalError> {
    match v {
        Value::Bag(items) => Ok((items, Value::Bag(Vec::new()))),
        Value::List(items) => Ok((items, Value::List(Vec::new()))),
        _ => Err(mismatch(e)),
    }
}

/// Evaluate `e` under `env`.
pub fn eval(e: &Expr, env: &mut Env) -> Result<Value, EvalError> {
    ensure_sufficient_stack(|| match &e.kind {
        ExprKind::Bool(b) => Ok(Value::Bool(*b)),
        ExprKind::Int(i) => Ok(Value::Int(*i)),
        ExprKind::Str(s) => Ok(Value::Str(s.clone())),
        ExprKind::Empty => Ok(match &e.ty {
            Type::List(_) => Value::List(Vec::new()),
            Type::Map { .. } => Value::Map(Vec::new()),
            _ => Value::Bag(Vec::new()),
        }),
        ExprKind::Var(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::Unbound(name.clone())),
        ExprKind::Binary { op, left, right } => eval_binary(e, *op, left, right, env),
        ExprKind::Unary { op, operand } => eval_unary(e, *op, operand, env),
        ExprKind::Cond {
            cond,
            then_branch,
            else_branch,
        } => match eval(cond, env)?.as_bool() {
            Some(true) => eval(then_branch, env),
            Some(false) => eval(else_branch, env),
            None => Err(mismatch(e)),
        },
        ExprKind::Filter { source, predicate } => {
            let (items, kind) = collection(eval(source, env)?, e)?;
            let mut kept = Vec::new();
            for item in items {
                match apply(predicate, item.clone(), env)?.as_bool() {
                    Some(true) => kept.push(item),
                    Some(false) => {}
                    None => return Err(mismatch(e)),
                }
            }
            Ok(kind.rebuild(kept))
        }
        ExprKind::Map { source, func } => {
            let (items, kind) = collection(eval(source, env)?, e)?;
            let mapped = items
                .into_iter()
                .map(|item| apply(func, item, env))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(kind.rebuild(mapped))
        }
        ExprKind::SortBy { source, key } => {
            let (items, _) = collection(eval(source, env)?, e)?;
            let mut keyed = items
                .into_iter()
                .map(|item| Ok((apply(key, item.clone(), env)?, item)))
                .collect::<Result<Vec<_>, EvalError>>()?;
            // Stable: ties keep source order.
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(Value::List(keyed.into_iter().map(|(_, item)| item).collect()))
        }
        ExprKind::MakeMap { keys, value } => {
            let (items, _) = collection(eval(keys, env)?, e)?;
            let mut entries = Vec::with_capacity(items.len());
            for k in items {
                if entries.iter().any(|(existing, _)| *existing == k) {
                    continue;
                }
                let v = apply(value, k.clone(), env)?;
                entries.push((k, v));
            }
            Ok(Value::map(entries))
        }
        ExprKind::MapGet { map, key } => {
            let Value::Map(entries) = eval(map, env)? else {
                return Err(mismatch(e));
            };
            let key = eval(key, env)?;
            match entries.binary_search_by(|(k, _)| k.cmp(&key)) {
                Ok(i) => Ok(entries[i].1.clone()),
                Err(_) => {
                    let zero = default_value(&e.ty).ok_or_else(|| EvalError::NoDefault(e.ty.clone()))?;
                    eval(&zero, env)
                }
            }
        }
        ExprKind::GetField { record, field } => match eval(record, env)? {
            Value::Record(fields) => fields
                .into_iter()
                .find(|(name, _)| name == field)
                .map(|(_, v)| v)
                .ok_or_else(|| mismatch(e)),
            _ => Err(mismatch(e)),
        },
        ExprKind::MakeRecord(fields) => fields
            .iter()
            .map(|(name, f)| Ok((name.clone(), eval(f, env)?)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Record),
        ExprKind::Singleton(inner) => {
            let v = eval(inner, env)?;
            Ok(match e.ty {
                Type::List(_) => Value::List(vec![v]),
                _ => Value::Bag(vec![v]),
            })
        }
        ExprKind::StateVar(inner) => eval(inner, env),
        ExprKind::Extension(ext) => Err(EvalError::Extension(ext.kind.clone())),
    })
}

fn eval_binary(e: &Expr, op: BinaryOp, left: &Expr, right: &Expr, env: &mut Env) -> Result<Value, EvalError> {
    // Short-circuit first: the right operand may be ill-defined when the
    // left one decides the result.
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let l = eval(left, env)?.as_bool().ok_or_else(|| mismatch(e))?;
            if l == (op == BinaryOp::Or) {
                return Ok(Value::Bool(l));
            }
            let r = eval(right, env)?.as_bool().ok_or_else(|| mismatch(e))?;
            return Ok(Value::Bool(r));
        }
        _ => {}
    }
    let l = eval(left, env)?;
    let r = eval(right, env)?;
    let ordering = |l: &Value, r: &Value| -> Result<Ordering, EvalError> {
        match (l, r) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            _ => Err(mismatch(e)),
        }
    };
    Ok(match op {
        BinaryOp::Eq => Value::Bool(l == r),
        BinaryOp::Ne => Value::Bool(l != r),
        BinaryOp::Lt => Value::Bool(ordering(&l, &r)? == Ordering::Less),
        BinaryOp::Le => Value::Bool(ordering(&l, &r)? != Ordering::Greater),
        BinaryOp::Gt => Value::Bool(ordering(&l, &r)? == Ordering::Greater),
        BinaryOp::Ge => Value::Bool(ordering(&l, &r)? != Ordering::Less),
        BinaryOp::Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
            (Value::Bag(mut a), Value::Bag(b)) => {
                a.extend(b);
                Value::bag(a)
            }
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Value::List(a)
            }
            _ => return Err(mismatch(e)),
        },
        BinaryOp::Sub => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(b)),
            (l @ (Value::Bag(_) | Value::List(_)), r) => {
                let removed = r.elements().ok_or_else(|| mismatch(e))?;
                let (mut items, kind) = collection(l, e)?;
                for x in removed {
                    if let Some(pos) = items.iter().position(|y| y == x) {
                        items.remove(pos);
                    }
                }
                kind.rebuild(items)
            }
            _ => return Err(mismatch(e)),
        },
        BinaryOp::In => match &r {
            Value::Bag(items) | Value::List(items) => Value::Bool(items.contains(&l)),
            Value::Map(entries) => Value::Bool(entries.iter().any(|(k, _)| *k == l)),
            _ => return Err(mismatch(e)),
        },
        BinaryOp::And | BinaryOp::Or => return Err(mismatch(e)),
    })
}

fn eval_unary(e: &Expr, op: UnaryOp, operand: &Expr, env: &mut Env) -> Result<Value, EvalError> {
    let v = eval(operand, env)?;
    Ok(match op {
        UnaryOp::Not => Value::Bool(!v.as_bool().ok_or_else(|| mismatch(e))?),
        UnaryOp::Neg => Value::Int(v.as_int().ok_or_else(|| mismatch(e))?.wrapping_neg()),
        UnaryOp::Distinct => {
            let (items, kind) = collection(v, e)?;
            let mut unique: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            kind.rebuild(unique)
        }
        UnaryOp::Len => {
            let n = v.elements().ok_or_else(|| mismatch(e))?.len();
            Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
        }
        UnaryOp::Empty => Value::Bool(v.elements().ok_or_else(|| mismatch(e))?.is_empty()),
        UnaryOp::Exists => Value::Bool(!v.elements().ok_or_else(|| mismatch(e))?.is_empty()),
        UnaryOp::Sum => {
            let items = v.elements().ok_or_else(|| mismatch(e))?;
            let mut total = 0i64;
            for item in items {
                total = total.wrapping_add(item.as_int().ok_or_else(|| mismatch(e))?);
            }
            Value::Int(total)
        }
    })
}
