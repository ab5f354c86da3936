//! Decision procedure backed by z3.
//!
//! Scalars are encoded natively: `int` and `bool` as z3 integers and
//! booleans, `str` as integer codes that preserve the order of the string
//! literals in the formula. Records are tuples of their fields.
//!
//! Collections are encoded with explicit cardinality: an unknown bag or
//! list is `collection_bound` element slots plus a length, and every slot
//! carries a presence guard and a position. Comprehensions only rewrite
//! guards, positions and elements, so the whole formula stays
//! quantifier-free. An `Unsat` answer therefore means "no model in which
//! every unknown collection has at most `collection_bound` elements".
//!
//! Maps are guarded (key, value) entries plus the default value; unknowns
//! of map or extension type are not supported and answer `Unknown`.

use std::collections::BTreeSet;
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_ir::{
    all_names, binder_of, default_value, free_vars, fresh_var, map_children, BinaryOp, Expr, ExprKind, Lambda, Name,
    Type, UnaryOp, Var,
};
use strata_stack::ensure_sufficient_stack;
use z3::ast::{Ast, Bool, Int};
use z3::{Config, Context, Solver};

use crate::{DecisionProcedure, Model, SatResult, Value};

/// Resource bounds of the [`Z3Solver`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    /// Largest bag or list an unknown collection may hold.
    pub collection_bound: usize,
    /// Per-call limit handed to z3; running out answers `Unknown`.
    pub timeout: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            collection_bound: 4,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// SMT decision procedure. Every call runs in a fresh z3 context.
#[derive(Clone, Debug, Default)]
pub struct Z3Solver {
    config: SolverConfig,
}

impl Z3Solver {
    pub fn new(config: SolverConfig) -> Self {
        Z3Solver { config }
    }

    pub fn config(&self) -> SolverConfig {
        self.config
    }
}

impl DecisionProcedure for Z3Solver {
    fn satisfy(&mut self, formula: &Expr) -> SatResult {
        let (formula, abstracted) = match abstract_extensions(formula) {
            Ok(r) => r,
            Err(reason) => return SatResult::Unknown(reason),
        };

        let mut cfg = Config::new();
        cfg.set_model_generation(true);
        if let Some(timeout) = self.config.timeout {
            cfg.set_timeout_msec(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        }
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);

        let mut enc = Encoder::new(&ctx, &formula, self.config.collection_bound);
        let unknowns = free_vars(&formula);
        for var in &unknowns {
            if let Err(reason) = enc.declare(var) {
                return SatResult::Unknown(reason);
            }
        }
        enc.seal_strings();
        let goal = match enc.encode(&formula).and_then(Sym::into_bool) {
            Ok(goal) => goal,
            Err(reason) => return SatResult::Unknown(reason),
        };
        for side in &enc.side {
            solver.assert(side);
        }
        solver.assert(&goal);
        tracing::trace!(unknowns = unknowns.len(), bound = self.config.collection_bound, "z3 check");

        match solver.check() {
            z3::SatResult::Unsat => SatResult::Unsat,
            z3::SatResult::Unknown => SatResult::Unknown(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "z3 gave up".to_string()),
            ),
            z3::SatResult::Sat => {
                let Some(model) = solver.get_model() else {
                    return SatResult::Unknown("z3 produced no model".to_string());
                };
                let mut assignments = Vec::new();
                for var in unknowns.iter().filter(|v| !abstracted.contains(&v.name)) {
                    let Some(sym) = enc.unknowns.get(&var.name) else {
                        continue;
                    };
                    match enc.read(&model, sym, &var.ty) {
                        Ok(value) => assignments.push((var.clone(), value)),
                        Err(reason) => return SatResult::Unknown(reason),
                    }
                }
                SatResult::Sat(Model { assignments })
            }
        }
    }
}

// Symbolic values

#[derive(Clone, Debug)]
struct Slot<'ctx> {
    present: Bool<'ctx>,
    /// Rank among the present slots. Only meaningful for lists.
    pos: Int<'ctx>,
    elem: Sym<'ctx>,
}

#[derive(Clone, Debug)]
struct Entry<'ctx> {
    /// Present entries have pairwise distinct keys.
    present: Bool<'ctx>,
    key: Sym<'ctx>,
    value: Sym<'ctx>,
}

#[derive(Clone, Debug)]
enum Sym<'ctx> {
    Bool(Bool<'ctx>),
    Int(Int<'ctx>),
    /// Order-preserving code of a string.
    Str(Int<'ctx>),
    Record(Vec<(Name, Sym<'ctx>)>),
    Coll { list: bool, slots: Vec<Slot<'ctx>> },
    Map { entries: Vec<Entry<'ctx>>, default: Box<Sym<'ctx>> },
}

type Encoded<'ctx> = Result<Sym<'ctx>, String>;

impl<'ctx> Sym<'ctx> {
    fn into_bool(self) -> Result<Bool<'ctx>, String> {
        match self {
            Sym::Bool(b) => Ok(b),
            other => Err(format!("expected a boolean, found {}", other.shape())),
        }
    }

    fn into_int(self) -> Result<Int<'ctx>, String> {
        match self {
            Sym::Int(i) => Ok(i),
            other => Err(format!("expected an integer, found {}", other.shape())),
        }
    }

    fn into_slots(self) -> Result<(bool, Vec<Slot<'ctx>>), String> {
        match self {
            Sym::Coll { list, slots } => Ok((list, slots)),
            other => Err(format!("expected a collection, found {}", other.shape())),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Sym::Bool(_) => "bool",
            Sym::Int(_) => "int",
            Sym::Str(_) => "str",
            Sym::Record(_) => "record",
            Sym::Coll { list: true, .. } => "list",
            Sym::Coll { list: false, .. } => "bag",
            Sym::Map { .. } => "map",
        }
    }
}

// Encoder

struct Encoder<'ctx> {
    ctx: &'ctx Context,
    bound: usize,
    /// String literals of the formula, in order; `""` always included.
    literals: Vec<String>,
    /// Distance between the codes of consecutive literals.
    gap: i64,
    /// Number of string-valued unknown leaves declared.
    string_leaves: usize,
    unknowns: FxHashMap<Name, Sym<'ctx>>,
    /// Lambda bindings, innermost last.
    scope: Vec<(Name, Sym<'ctx>)>,
    /// Domain constraints of the unknowns.
    side: Vec<Bool<'ctx>>,
}

impl<'ctx> Encoder<'ctx> {
    fn new(ctx: &'ctx Context, formula: &Expr, bound: usize) -> Self {
        let mut literals = BTreeSet::new();
        literals.insert(String::new());
        collect_strings(formula, &mut literals);
        Encoder {
            ctx,
            bound,
            literals: literals.into_iter().collect(),
            gap: 1,
            string_leaves: 0,
            unknowns: FxHashMap::default(),
            scope: Vec::new(),
            side: Vec::new(),
        }
    }

    fn int(&self, i: i64) -> Int<'ctx> {
        Int::from_i64(self.ctx, i)
    }

    fn tt(&self) -> Bool<'ctx> {
        Bool::from_bool(self.ctx, true)
    }

    fn all(&self, parts: &[Bool<'ctx>]) -> Bool<'ctx> {
        match parts {
            [] => self.tt(),
            [one] => one.clone(),
            _ => Bool::and(self.ctx, &parts.iter().collect::<Vec<_>>()),
        }
    }

    fn any(&self, parts: &[Bool<'ctx>]) -> Bool<'ctx> {
        match parts {
            [] => Bool::from_bool(self.ctx, false),
            [one] => one.clone(),
            _ => Bool::or(self.ctx, &parts.iter().collect::<Vec<_>>()),
        }
    }

    fn sum(&self, parts: &[Int<'ctx>]) -> Int<'ctx> {
        match parts {
            [] => self.int(0),
            [one] => one.clone(),
            _ => Int::add(self.ctx, &parts.iter().collect::<Vec<_>>()),
        }
    }

    /// `1` where `b` holds, else `0`.
    fn indicator(&self, b: &Bool<'ctx>) -> Int<'ctx> {
        b.ite(&self.int(1), &self.int(0))
    }

    // ===== Unknowns =====

    fn declare(&mut self, var: &Var) -> Result<(), String> {
        let sym = self.fresh(var.name.as_str(), &var.ty)?;
        self.unknowns.insert(var.name.clone(), sym);
        Ok(())
    }

    fn fresh(&mut self, prefix: &str, ty: &Type) -> Encoded<'ctx> {
        Ok(match ty {
            Type::Bool => Sym::Bool(Bool::new_const(self.ctx, prefix)),
            Type::Int => Sym::Int(Int::new_const(self.ctx, prefix)),
            Type::Str => {
                let code = Int::new_const(self.ctx, prefix);
                self.side.push(code.ge(&self.int(0)));
                self.string_leaves += 1;
                Sym::Str(code)
            }
            Type::Record(fields) => Sym::Record(
                fields
                    .iter()
                    .map(|(name, t)| Ok((name.clone(), self.fresh(&format!("{prefix}.{name}"), t)?)))
                    .collect::<Result<_, String>>()?,
            ),
            Type::Bag(elem) | Type::List(elem) => {
                let len = Int::new_const(self.ctx, format!("{prefix}#len"));
                let max = i64::try_from(self.bound).unwrap_or(i64::MAX);
                self.side.push(len.ge(&self.int(0)));
                self.side.push(len.le(&self.int(max)));
                let mut slots = Vec::with_capacity(self.bound);
                for i in 0..max {
                    slots.push(Slot {
                        present: self.int(i).lt(&len),
                        pos: self.int(i),
                        elem: self.fresh(&format!("{prefix}[{i}]"), elem)?,
                    });
                }
                Sym::Coll {
                    list: matches!(ty, Type::List(_)),
                    slots,
                }
            }
            Type::Map { .. } => return Err(format!("unknown `{prefix}` of map type {ty}")),
            Type::Extension { .. } => return Err(format!("unknown `{prefix}` of extension type {ty}")),
        })
    }

    /// Fix the string codes once every unknown is declared: literals are
    /// spaced so that every string unknown can sit strictly between any two.
    fn seal_strings(&mut self) {
        self.gap = i64::try_from(self.string_leaves).unwrap_or(i64::MAX / 2).saturating_add(1);
    }

    fn code(&self, s: &str) -> Int<'ctx> {
        let rank = self.literals.iter().position(|l| l == s).unwrap_or(0);
        self.int(i64::try_from(rank).unwrap_or(0).saturating_mul(self.gap))
    }

    // ===== Expressions =====

    fn encode(&mut self, e: &Expr) -> Encoded<'ctx> {
        ensure_sufficient_stack(|| self.encode_node(e))
    }

    fn encode_node(&mut self, e: &Expr) -> Encoded<'ctx> {
        match &e.kind {
            ExprKind::Bool(b) => Ok(Sym::Bool(Bool::from_bool(self.ctx, *b))),
            ExprKind::Int(i) => Ok(Sym::Int(self.int(*i))),
            ExprKind::Str(s) => Ok(Sym::Str(self.code(s))),
            ExprKind::Empty => self.empty(&e.ty),
            ExprKind::Var(name) => self
                .scope
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, sym)| sym.clone())
                .or_else(|| self.unknowns.get(name).cloned())
                .ok_or_else(|| format!("unbound variable `{name}`")),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right),
            ExprKind::Unary { op, operand } => self.unary(*op, operand),
            ExprKind::Cond {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.encode(cond)?.into_bool()?;
                let t = self.encode(then_branch)?;
                let f = self.encode(else_branch)?;
                self.ite(&c, t, f)
            }
            ExprKind::Filter { source, predicate } => {
                let (list, slots) = self.encode(source)?.into_slots()?;
                let mut kept = Vec::with_capacity(slots.len());
                for slot in slots {
                    let keep = self.apply(predicate, &slot.elem)?.into_bool()?;
                    kept.push(Slot {
                        present: self.all(&[slot.present, keep]),
                        ..slot
                    });
                }
                Ok(self.collection(list, kept))
            }
            ExprKind::Map { source, func } => {
                let (list, slots) = self.encode(source)?.into_slots()?;
                let mut mapped = Vec::with_capacity(slots.len());
                for slot in slots {
                    let elem = self.apply(func, &slot.elem)?;
                    mapped.push(Slot { elem, ..slot });
                }
                Ok(Sym::Coll { list, slots: mapped })
            }
            ExprKind::SortBy { source, key } => {
                let (list, slots) = self.encode(source)?.into_slots()?;
                let keys = slots
                    .iter()
                    .map(|s| self.apply(key, &s.elem))
                    .collect::<Result<Vec<_>, _>>()?;
                self.sort(list, slots, &keys)
            }
            ExprKind::MakeMap { keys, value } => {
                let (list, slots) = self.encode(keys)?.into_slots()?;
                let Type::Map { value: value_ty, .. } = &e.ty else {
                    return Err(format!("map construction of type {}", e.ty));
                };
                let default = self.default_of(value_ty)?;
                let mut entries = Vec::with_capacity(slots.len());
                for (i, slot) in slots.iter().enumerate() {
                    let earlier = self.earlier_equal(list, &slots, i)?;
                    let value = self.apply(value, &slot.elem)?;
                    entries.push(Entry {
                        present: self.all(&[slot.present.clone(), earlier.not()]),
                        key: slot.elem.clone(),
                        value,
                    });
                }
                Ok(Sym::Map {
                    entries,
                    default: Box::new(default),
                })
            }
            ExprKind::MapGet { map, key } => {
                let Sym::Map { entries, default } = self.encode(map)? else {
                    return Err(format!("lookup in non-map `{map}`"));
                };
                let key = self.encode(key)?;
                let mut result = *default;
                for entry in entries.into_iter().rev() {
                    let hit = self.all(&[entry.present, self.eq(&entry.key, &key)?]);
                    result = self.ite(&hit, entry.value, result)?;
                }
                Ok(result)
            }
            ExprKind::GetField { record, field } => match self.encode(record)? {
                Sym::Record(fields) => fields
                    .into_iter()
                    .find(|(name, _)| name == field)
                    .map(|(_, v)| v)
                    .ok_or_else(|| format!("no field `{field}` in `{record}`")),
                other => Err(format!("field `{field}` of {}", other.shape())),
            },
            ExprKind::MakeRecord(fields) => Ok(Sym::Record(
                fields
                    .iter()
                    .map(|(name, f)| Ok((name.clone(), self.encode(f)?)))
                    .collect::<Result<_, String>>()?,
            )),
            ExprKind::Singleton(inner) => {
                let elem = self.encode(inner)?;
                Ok(Sym::Coll {
                    list: matches!(e.ty, Type::List(_)),
                    slots: vec![Slot {
                        present: self.tt(),
                        pos: self.int(0),
                        elem,
                    }],
                })
            }
            ExprKind::StateVar(inner) => self.encode(inner),
            ExprKind::Extension(ext) => Err(format!("extension node `{}` was not abstracted", ext.kind)),
        }
    }

    fn apply(&mut self, lam: &Lambda, arg: &Sym<'ctx>) -> Encoded<'ctx> {
        self.scope.push((lam.arg.name.clone(), arg.clone()));
        let result = self.encode(&lam.body);
        self.scope.pop();
        result
    }

    fn empty(&mut self, ty: &Type) -> Encoded<'ctx> {
        match ty {
            Type::Map { value, .. } => Ok(Sym::Map {
                entries: Vec::new(),
                default: Box::new(self.default_of(value)?),
            }),
            Type::Bag(_) | Type::List(_) => Ok(Sym::Coll {
                list: matches!(ty, Type::List(_)),
                slots: Vec::new(),
            }),
            other => Err(format!("empty value of type {other}")),
        }
    }

    fn default_of(&mut self, ty: &Type) -> Encoded<'ctx> {
        let zero = default_value(ty).ok_or_else(|| format!("type {ty} has no default value"))?;
        self.encode(&zero)
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Encoded<'ctx> {
        let l = self.encode(left)?;
        let r = self.encode(right)?;
        Ok(match op {
            BinaryOp::And => Sym::Bool(self.all(&[l.into_bool()?, r.into_bool()?])),
            BinaryOp::Or => Sym::Bool(self.any(&[l.into_bool()?, r.into_bool()?])),
            BinaryOp::Eq => Sym::Bool(self.eq(&l, &r)?),
            BinaryOp::Ne => Sym::Bool(self.eq(&l, &r)?.not()),
            BinaryOp::Lt => Sym::Bool(self.scalar_lt(&l, &r)?),
            BinaryOp::Le => Sym::Bool(self.scalar_lt(&r, &l)?.not()),
            BinaryOp::Gt => Sym::Bool(self.scalar_lt(&r, &l)?),
            BinaryOp::Ge => Sym::Bool(self.scalar_lt(&l, &r)?.not()),
            BinaryOp::Add => match (l, r) {
                (Sym::Int(a), Sym::Int(b)) => Sym::Int(self.sum(&[a, b])),
                (Sym::Coll { list, slots: a }, Sym::Coll { slots: b, .. }) => {
                    let offset = self.len(&a);
                    let shifted = b.into_iter().map(|s| Slot {
                        pos: Int::add(self.ctx, &[&s.pos, &offset]),
                        ..s
                    });
                    Sym::Coll {
                        list,
                        slots: a.into_iter().chain(shifted).collect(),
                    }
                }
                (a, b) => return Err(format!("cannot add {} and {}", a.shape(), b.shape())),
            },
            BinaryOp::Sub => match (l, r) {
                (Sym::Int(a), Sym::Int(b)) => Sym::Int(Int::sub(self.ctx, &[&a, &b])),
                (Sym::Coll { list, slots: a }, Sym::Coll { slots: b, .. }) => self.difference(list, a, &b)?,
                (a, b) => return Err(format!("cannot subtract {} from {}", b.shape(), a.shape())),
            },
            BinaryOp::In => Sym::Bool(self.member(&l, &r)?),
        })
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Encoded<'ctx> {
        let v = self.encode(operand)?;
        Ok(match op {
            UnaryOp::Not => Sym::Bool(v.into_bool()?.not()),
            UnaryOp::Neg => Sym::Int(v.into_int()?.unary_minus()),
            UnaryOp::Len => {
                let (_, slots) = v.into_slots()?;
                Sym::Int(self.len(&slots))
            }
            UnaryOp::Empty | UnaryOp::Exists => {
                let (_, slots) = v.into_slots()?;
                let some = self.any(&slots.iter().map(|s| s.present.clone()).collect::<Vec<_>>());
                Sym::Bool(if op == UnaryOp::Exists { some } else { some.not() })
            }
            UnaryOp::Sum => {
                let (_, slots) = v.into_slots()?;
                let mut parts = Vec::with_capacity(slots.len());
                for slot in slots {
                    let value = slot.elem.into_int()?;
                    parts.push(slot.present.ite(&value, &self.int(0)));
                }
                Sym::Int(self.sum(&parts))
            }
            UnaryOp::Distinct => {
                let (list, slots) = v.into_slots()?;
                let mut kept = Vec::with_capacity(slots.len());
                for i in 0..slots.len() {
                    let earlier = self.earlier_equal(list, &slots, i)?;
                    kept.push(Slot {
                        present: self.all(&[slots[i].present.clone(), earlier.not()]),
                        ..slots[i].clone()
                    });
                }
                self.collection(list, kept)
            }
        })
    }

    // ===== Collections =====

    fn len(&self, slots: &[Slot<'ctx>]) -> Int<'ctx> {
        self.sum(&slots.iter().map(|s| self.indicator(&s.present)).collect::<Vec<_>>())
    }

    /// Slot `j` comes before slot `i`: by position in a list, by slot
    /// index otherwise.
    fn before(&self, list: bool, slots: &[Slot<'ctx>], j: usize, i: usize) -> Bool<'ctx> {
        if list {
            slots[j].pos.lt(&slots[i].pos)
        } else {
            Bool::from_bool(self.ctx, j < i)
        }
    }

    /// Some present slot before `i` holds an element equal to slot `i`'s.
    fn earlier_equal(&self, list: bool, slots: &[Slot<'ctx>], i: usize) -> Result<Bool<'ctx>, String> {
        let mut hits = Vec::new();
        for j in (0..slots.len()).filter(|&j| j != i) {
            hits.push(self.all(&[
                slots[j].present.clone(),
                self.before(list, slots, j, i),
                self.eq(&slots[j].elem, &slots[i].elem)?,
            ]));
        }
        Ok(self.any(&hits))
    }

    /// Re-rank the present slots of a list after some were dropped.
    fn collection(&self, list: bool, slots: Vec<Slot<'ctx>>) -> Sym<'ctx> {
        if !list {
            return Sym::Coll { list, slots };
        }
        let ranks: Vec<Int<'ctx>> = (0..slots.len())
            .map(|i| {
                let below: Vec<Int<'ctx>> = (0..slots.len())
                    .filter(|&j| j != i)
                    .map(|j| self.indicator(&self.all(&[slots[j].present.clone(), slots[j].pos.lt(&slots[i].pos)])))
                    .collect();
                self.sum(&below)
            })
            .collect();
        Sym::Coll {
            list,
            slots: slots
                .into_iter()
                .zip(ranks)
                .map(|(s, pos)| Slot { pos, ..s })
                .collect(),
        }
    }

    /// Stable sort by `keys`. Ties keep list order; a bag is kept in value
    /// order, so its ties fall back to comparing whole elements.
    fn sort(&self, list: bool, slots: Vec<Slot<'ctx>>, keys: &[Sym<'ctx>]) -> Encoded<'ctx> {
        let mut ranks = Vec::with_capacity(slots.len());
        for i in 0..slots.len() {
            let mut below = Vec::new();
            for j in (0..slots.len()).filter(|&j| j != i) {
                let tie_break = if list {
                    self.before(true, &slots, j, i)
                } else {
                    let same = self.eq(&slots[j].elem, &slots[i].elem)?;
                    self.any(&[
                        self.value_lt(&slots[j].elem, &slots[i].elem)?,
                        self.all(&[same, self.before(false, &slots, j, i)]),
                    ])
                };
                let first = self.any(&[
                    self.scalar_lt(&keys[j], &keys[i])?,
                    self.all(&[self.eq(&keys[j], &keys[i])?, tie_break]),
                ]);
                below.push(self.indicator(&self.all(&[slots[j].present.clone(), first])));
            }
            ranks.push(self.sum(&below));
        }
        Ok(Sym::Coll {
            list: true,
            slots: slots
                .into_iter()
                .zip(ranks)
                .map(|(s, pos)| Slot { pos, ..s })
                .collect(),
        })
    }

    /// Multiset difference: each element of `b` removes one equal element
    /// of `a`, the earliest first.
    fn difference(&self, list: bool, a: Vec<Slot<'ctx>>, b: &[Slot<'ctx>]) -> Encoded<'ctx> {
        let mut kept = Vec::with_capacity(a.len());
        for i in 0..a.len() {
            let mut rank = vec![self.int(1)];
            for j in (0..a.len()).filter(|&j| j != i) {
                rank.push(self.indicator(&self.all(&[
                    a[j].present.clone(),
                    self.before(list, &a, j, i),
                    self.eq(&a[j].elem, &a[i].elem)?,
                ])));
            }
            let removed = self.sum(&rank).le(&self.count(b, &a[i].elem)?);
            kept.push(Slot {
                present: self.all(&[a[i].present.clone(), removed.not()]),
                ..a[i].clone()
            });
        }
        Ok(self.collection(list, kept))
    }

    fn count(&self, slots: &[Slot<'ctx>], v: &Sym<'ctx>) -> Result<Int<'ctx>, String> {
        let mut parts = Vec::with_capacity(slots.len());
        for s in slots {
            parts.push(self.indicator(&self.all(&[s.present.clone(), self.eq(&s.elem, v)?])));
        }
        Ok(self.sum(&parts))
    }

    fn member(&self, x: &Sym<'ctx>, collection: &Sym<'ctx>) -> Result<Bool<'ctx>, String> {
        let mut hits = Vec::new();
        match collection {
            Sym::Coll { slots, .. } => {
                for s in slots {
                    hits.push(self.all(&[s.present.clone(), self.eq(&s.elem, x)?]));
                }
            }
            Sym::Map { entries, .. } => {
                for entry in entries {
                    hits.push(self.all(&[entry.present.clone(), self.eq(&entry.key, x)?]));
                }
            }
            other => return Err(format!("membership in {}", other.shape())),
        }
        Ok(self.any(&hits))
    }

    // ===== Comparison =====

    fn eq(&self, a: &Sym<'ctx>, b: &Sym<'ctx>) -> Result<Bool<'ctx>, String> {
        Ok(match (a, b) {
            (Sym::Bool(x), Sym::Bool(y)) => x._eq(y),
            (Sym::Int(x), Sym::Int(y)) | (Sym::Str(x), Sym::Str(y)) => x._eq(y),
            (Sym::Record(xs), Sym::Record(ys)) if xs.len() == ys.len() => {
                let mut parts = Vec::with_capacity(xs.len());
                for ((n, x), (m, y)) in xs.iter().zip(ys) {
                    if n != m {
                        return Err(format!("records with fields `{n}` and `{m}`"));
                    }
                    parts.push(self.eq(x, y)?);
                }
                self.all(&parts)
            }
            (Sym::Coll { list: true, slots: xs }, Sym::Coll { slots: ys, .. }) => {
                let mut parts = vec![self.len(xs)._eq(&self.len(ys))];
                for x in xs {
                    for y in ys {
                        let aligned = self.all(&[x.present.clone(), y.present.clone(), x.pos._eq(&y.pos)]);
                        parts.push(aligned.implies(&self.eq(&x.elem, &y.elem)?));
                    }
                }
                self.all(&parts)
            }
            (Sym::Coll { list: false, slots: xs }, Sym::Coll { slots: ys, .. }) => {
                let mut parts = Vec::with_capacity(xs.len() + ys.len());
                for s in xs.iter().chain(ys) {
                    let same = self.count(xs, &s.elem)?._eq(&self.count(ys, &s.elem)?);
                    parts.push(s.present.implies(&same));
                }
                self.all(&parts)
            }
            (Sym::Map { entries: xs, default: dx }, Sym::Map { entries: ys, default: dy }) => {
                let mut parts = Vec::with_capacity(xs.len() + ys.len());
                for (here, there, there_default) in [(xs, ys, dy), (ys, xs, dx)] {
                    for entry in here {
                        let mut lookup = (**there_default).clone();
                        let mut found = Vec::with_capacity(there.len());
                        for other in there.iter().rev() {
                            let hit = self.all(&[other.present.clone(), self.eq(&other.key, &entry.key)?]);
                            lookup = self.ite(&hit, other.value.clone(), lookup)?;
                            found.push(hit);
                        }
                        let agrees = self.all(&[self.any(&found), self.eq(&entry.value, &lookup)?]);
                        parts.push(entry.present.implies(&agrees));
                    }
                }
                self.all(&parts)
            }
            (x, y) => return Err(format!("cannot compare {} with {}", x.shape(), y.shape())),
        })
    }

    /// Order of scalar values: integers numerically, strings by code,
    /// `false` before `true`.
    fn scalar_lt(&self, a: &Sym<'ctx>, b: &Sym<'ctx>) -> Result<Bool<'ctx>, String> {
        Ok(match (a, b) {
            (Sym::Int(x), Sym::Int(y)) | (Sym::Str(x), Sym::Str(y)) => x.lt(y),
            (Sym::Bool(x), Sym::Bool(y)) => self.all(&[x.not(), y.clone()]),
            (x, y) => return Err(format!("cannot order {} and {}", x.shape(), y.shape())),
        })
    }

    /// Order of whole values: scalars as [`Encoder::scalar_lt`], records
    /// field by field.
    fn value_lt(&self, a: &Sym<'ctx>, b: &Sym<'ctx>) -> Result<Bool<'ctx>, String> {
        match (a, b) {
            (Sym::Record(xs), Sym::Record(ys)) => {
                let mut result = Bool::from_bool(self.ctx, false);
                for ((_, x), (_, y)) in xs.iter().zip(ys).rev() {
                    let less = self.value_lt(x, y)?;
                    result = self.any(&[less, self.all(&[self.eq(x, y)?, result])]);
                }
                Ok(result)
            }
            _ => self.scalar_lt(a, b),
        }
    }

    fn ite(&self, c: &Bool<'ctx>, t: Sym<'ctx>, f: Sym<'ctx>) -> Encoded<'ctx> {
        Ok(match (t, f) {
            (Sym::Bool(x), Sym::Bool(y)) => Sym::Bool(c.ite(&x, &y)),
            (Sym::Int(x), Sym::Int(y)) => Sym::Int(c.ite(&x, &y)),
            (Sym::Str(x), Sym::Str(y)) => Sym::Str(c.ite(&x, &y)),
            (Sym::Record(xs), Sym::Record(ys)) => Sym::Record(
                xs.into_iter()
                    .zip(ys)
                    .map(|((n, x), (_, y))| Ok((n, self.ite(c, x, y)?)))
                    .collect::<Result<_, String>>()?,
            ),
            (Sym::Coll { list, slots: xs }, Sym::Coll { slots: ys, .. }) => {
                let guard = |s: Slot<'ctx>, g: &Bool<'ctx>| Slot {
                    present: self.all(&[s.present.clone(), g.clone()]),
                    ..s
                };
                let not_c = c.not();
                Sym::Coll {
                    list,
                    slots: xs
                        .into_iter()
                        .map(|s| guard(s, c))
                        .chain(ys.into_iter().map(|s| guard(s, &not_c)))
                        .collect(),
                }
            }
            (Sym::Map { entries: xs, default: dx }, Sym::Map { entries: ys, default: dy }) => {
                let not_c = c.not();
                let guard = |e: Entry<'ctx>, g: &Bool<'ctx>| Entry {
                    present: self.all(&[e.present.clone(), g.clone()]),
                    ..e
                };
                Sym::Map {
                    entries: xs
                        .into_iter()
                        .map(|e| guard(e, c))
                        .chain(ys.into_iter().map(|e| guard(e, &not_c)))
                        .collect(),
                    default: Box::new(self.ite(c, *dx, *dy)?),
                }
            }
            (x, y) => return Err(format!("branches of different shape: {} and {}", x.shape(), y.shape())),
        })
    }

    // ===== Models =====

    fn read(&self, model: &z3::Model<'ctx>, sym: &Sym<'ctx>, ty: &Type) -> Result<Value, String> {
        Ok(match (sym, ty) {
            (Sym::Bool(b), _) => Value::Bool(
                model
                    .eval(b, true)
                    .and_then(|v| v.as_bool())
                    .ok_or("z3 model has no boolean value")?,
            ),
            (Sym::Int(i), _) => Value::Int(self.read_int(model, i)?),
            (Sym::Str(code), _) => {
                let code = self.read_int(model, code)?;
                let literal = (code % self.gap == 0)
                    .then(|| usize::try_from(code / self.gap).ok())
                    .flatten()
                    .and_then(|rank| self.literals.get(rank));
                Value::Str(match literal {
                    Some(s) => s.clone(),
                    None => format!("s{code}"),
                })
            }
            (Sym::Record(fields), Type::Record(types)) => Value::Record(
                fields
                    .iter()
                    .zip(types)
                    .map(|((name, v), (_, t))| Ok((name.clone(), self.read(model, v, t)?)))
                    .collect::<Result<_, String>>()?,
            ),
            (Sym::Coll { slots, .. }, Type::Bag(elem) | Type::List(elem)) => {
                let mut items = Vec::new();
                for slot in slots {
                    let present = model
                        .eval(&slot.present, true)
                        .and_then(|v| v.as_bool())
                        .ok_or("z3 model has no slot guard")?;
                    if present {
                        items.push(self.read(model, &slot.elem, elem)?);
                    }
                }
                match ty {
                    Type::List(_) => Value::List(items),
                    _ => Value::bag(items),
                }
            }
            (sym, ty) => return Err(format!("cannot read a {} as {ty}", sym.shape())),
        })
    }

    fn read_int(&self, model: &z3::Model<'ctx>, i: &Int<'ctx>) -> Result<i64, String> {
        model
            .eval(i, true)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| "z3 model value does not fit in 64 bits".to_string())
    }
}

fn collect_strings(e: &Expr, out: &mut BTreeSet<String>) {
    if let ExprKind::Str(s) = &e.kind {
        out.insert(s.clone());
    }
    for child in e.children() {
        ensure_sufficient_stack(|| collect_strings(child, out));
    }
}

// Extension abstraction

/// Replace every scalar extension node by a fresh unknown.
///
/// Returns the rewritten formula and the names of the introduced unknowns.
fn abstract_extensions(formula: &Expr) -> Result<(Expr, FxHashSet<Name>), String> {
    let mut found = Vec::new();
    collect_extensions(formula, &mut Vec::new(), &mut found)?;
    if found.is_empty() {
        return Ok((formula.clone(), FxHashSet::default()));
    }

    let mut avoid = all_names(formula);
    let mut table: FxHashMap<Expr, Var> = FxHashMap::default();
    for node in found {
        if table.contains_key(node) {
            continue;
        }
        let var = fresh_var(&Var::new("ext", node.ty.clone()), &avoid);
        avoid.insert(var.name.clone());
        table.insert(node.clone(), var);
    }
    let names = table.values().map(|v| v.name.clone()).collect();
    Ok((replace(formula, &table), names))
}

fn collect_extensions<'a>(e: &'a Expr, bound: &mut Vec<Name>, out: &mut Vec<&'a Expr>) -> Result<(), String> {
    if let ExprKind::Extension(_) = &e.kind {
        if !e.ty.is_scalar() {
            return Err(format!("extension node {e} has non-scalar type {}", e.ty));
        }
        if free_vars(e).iter().any(|v| bound.contains(&v.name)) {
            return Err(format!("extension node {e} depends on a bound variable"));
        }
        out.push(e);
        return Ok(());
    }
    let body = binder_of(e).map(|lam| (&*lam.body as *const Expr, lam.arg.name.clone()));
    for child in e.children() {
        match &body {
            Some((ptr, arg)) if std::ptr::eq(child, *ptr) => {
                bound.push(arg.clone());
                let r = ensure_sufficient_stack(|| collect_extensions(child, bound, out));
                bound.pop();
                r?;
            }
            _ => ensure_sufficient_stack(|| collect_extensions(child, bound, out))?,
        }
    }
    Ok(())
}

fn replace(e: &Expr, table: &FxHashMap<Expr, Var>) -> Expr {
    if let Some(var) = table.get(e) {
        return var.to_expr();
    }
    ensure_sufficient_stack(|| map_children(e, &mut |child| replace(child, table)))
}
