//! Output of the chosen plans.
//!
//! Both emitters list, per query, the tied best plans and the one chosen,
//! followed by the persisted values the chosen plans share. Collection
//! values are materialised into arrays; maps are kept as they are.

use std::fmt::Write as _;

use serde::Serialize;
use strata_arrays::{array_type, materialize};
use strata_ir::{Expr, Name, Stmt, Type, Var};
use strata_synth::{QueryResult, Specification};

/// A value the structure persists, shared by every plan that reads it.
struct StateSlot<'a> {
    name: Name,
    value: &'a Expr,
    init: Option<Stmt>,
}

fn state_slots(results: &[QueryResult]) -> Vec<StateSlot<'_>> {
    let mut slots: Vec<StateSlot<'_>> = Vec::new();
    for plan in results.iter().filter_map(|r| r.chosen.as_ref()) {
        for value in plan.persisted() {
            if slots.iter().any(|s| s.value == value) {
                continue;
            }
            let name = Name::from(format!("s{}", slots.len()));
            let init = value.ty.elem().map(|elem| {
                let target = Var::new(name.clone(), array_type(elem.clone()));
                materialize(target.to_expr(), Expr::len(value.clone()))
            });
            slots.push(StateSlot { name, value, init });
        }
    }
    slots
}

fn signature(spec: &Specification, query: &Name) -> String {
    let args = spec
        .queries
        .iter()
        .find(|q| q.name == *query)
        .map(|q| {
            q.args
                .iter()
                .map(|a| format!("{}: {}", a.name, a.ty))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    format!("{query}({args})")
}

/// Human-readable listing.
pub fn text(spec: &Specification, results: &[QueryResult]) -> String {
    let mut out = String::new();
    let fields: Vec<String> = spec.fields.iter().map(|(f, t)| format!("{f}: {t}")).collect();
    let _ = writeln!(out, "fields {}", fields.join(", "));
    for r in results {
        let _ = writeln!(out);
        let _ = writeln!(out, "query {}", signature(spec, &r.query));
        if let Some(e) = &r.error {
            let _ = writeln!(out, "    error: {e}");
        }
        match r.best.cost() {
            Some(cost) => {
                let cached = if r.from_cache { ", cached" } else { "" };
                let _ = writeln!(out, "    {} plan(s) at cost {cost}{cached}:", r.best.len());
                for plan in r.best.plans() {
                    let _ = writeln!(out, "        {plan}");
                }
            }
            None => {
                let _ = writeln!(out, "    no plan found");
            }
        }
        if let Some(chosen) = &r.chosen {
            let _ = writeln!(out, "    chosen: {chosen}");
        }
    }
    let slots = state_slots(results);
    if !slots.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "state");
        for slot in &slots {
            let _ = writeln!(out, "    {}: {} = {}", slot.name, slot.value.ty, slot.value);
            if let Some(init) = &slot.init {
                let _ = writeln!(out, "        init: {init}");
            }
        }
    }
    out
}

#[derive(Serialize)]
struct JsonOutput {
    fields: Vec<JsonField>,
    queries: Vec<JsonQuery>,
    state: Vec<JsonState>,
}

#[derive(Serialize)]
struct JsonField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Serialize)]
struct JsonQuery {
    name: String,
    args: Vec<JsonField>,
    cost: Option<u64>,
    plans: Vec<String>,
    chosen: Option<String>,
    from_cache: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonState {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    value: String,
    init: Option<String>,
}

fn json_field(name: &Name, ty: &Type) -> JsonField {
    JsonField {
        name: name.to_string(),
        ty: ty.to_string(),
    }
}

/// Machine-readable listing, pretty-printed.
pub fn json(spec: &Specification, results: &[QueryResult]) -> Result<String, serde_json::Error> {
    let queries = results
        .iter()
        .map(|r| JsonQuery {
            name: r.query.to_string(),
            args: spec
                .queries
                .iter()
                .find(|q| q.name == r.query)
                .map(|q| q.args.iter().map(|a| json_field(&a.name, &a.ty)).collect())
                .unwrap_or_default(),
            cost: r.best.cost().map(|c| c.0),
            plans: r.best.plans().iter().map(ToString::to_string).collect(),
            chosen: r.chosen.as_ref().map(ToString::to_string),
            from_cache: r.from_cache,
            error: r.error.as_ref().map(ToString::to_string),
        })
        .collect();
    let state = state_slots(results)
        .into_iter()
        .map(|s| JsonState {
            name: s.name.to_string(),
            ty: s.value.ty.to_string(),
            value: s.value.to_string(),
            init: s.init.as_ref().map(ToString::to_string),
        })
        .collect();
    let output = JsonOutput {
        fields: spec.fields.iter().map(|(f, t)| json_field(f, t)).collect(),
        queries,
        state,
    };
    serde_json::to_string_pretty(&output)
}

#[cfg(test)]
mod tests;
