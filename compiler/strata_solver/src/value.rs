//! Runtime values of the reference evaluator.

use std::fmt;

use strata_ir::Name;

/// A concrete value.
///
/// Bags are kept sorted so that structural equality is multiset equality;
/// maps are kept sorted by key with unique keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Bag(Vec<Value>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Vec<(Name, Value)>),
}

impl Value {
    /// Canonical bag from elements in any order.
    pub fn bag(mut items: Vec<Value>) -> Self {
        items.sort();
        Value::Bag(items)
    }

    /// Canonical map; on duplicate keys the first entry wins.
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        let mut out: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            if !out.iter().any(|(existing, _)| *existing == k) {
                out.push((k, v));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Value::Map(out)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Elements of a bag or list.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Bag(items) | Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Same collection kind as `self`, holding `items`.
    pub(crate) fn rebuild(&self, items: Vec<Value>) -> Value {
        match self {
            Value::List(_) => Value::List(items),
            _ => Value::bag(items),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
            f.write_str(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(close)
        }
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bag(items) => list(f, "{", items, "}"),
            Value::List(items) => list(f, "[", items, "]"),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                f.write_str("}")
            }
            Value::Record(fields) => {
                f.write_str("(")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                f.write_str(")")
            }
        }
    }
}
