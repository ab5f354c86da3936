use pretty_assertions::assert_eq;

use super::{json, text};
use strata_ir::{Expr, Lambda, Name, Type, Var};
use strata_synth::{BestSet, Cost, EnumStats, Plan, Query, QueryResult, Specification, SynthError};

fn row() -> Var {
    Var::new("r", Type::Record(vec![(Name::from("age"), Type::Int)]))
}

fn xs() -> Var {
    Var::new("xs", Type::bag(row().ty))
}

fn young() -> Expr {
    Expr::lt(Expr::get_field(row().to_expr(), "age"), Expr::int(18))
}

fn spec() -> Specification {
    Specification {
        fields: vec![(Name::from("age"), Type::Int)],
        assumptions: vec![],
        queries: vec![
            Query {
                name: Name::from("young"),
                args: vec![],
                assumptions: vec![],
                predicate: Expr::lt(Var::new("age", Type::Int).to_expr(), Expr::int(18)),
                sort_field: None,
            },
            Query {
                name: Name::from("bad"),
                args: vec![Var::new("age", Type::Int)],
                assumptions: vec![],
                predicate: Expr::bool(true),
                sort_field: None,
            },
        ],
        cost_model: None,
    }
}

fn results() -> Vec<QueryResult> {
    let plan = Plan::new(Expr::state_var(Expr::filter(xs().to_expr(), Lambda::new(row(), young()))));
    let mut best = BestSet::new();
    best.offer(plan.clone(), Cost(1));
    vec![
        QueryResult {
            query: Name::from("young"),
            best,
            chosen: Some(plan),
            stats: EnumStats::default(),
            from_cache: true,
            error: None,
        },
        QueryResult {
            query: Name::from("bad"),
            best: BestSet::new(),
            chosen: None,
            stats: EnumStats::default(),
            from_cache: false,
            error: Some(SynthError::ShadowedField {
                query: Name::from("bad"),
                arg: Name::from("age"),
            }),
        },
    ]
}

#[test]
fn text_lists_plans_and_shared_state() {
    let expected = "\
fields age: int

query young()
    1 plan(s) at cost 1, cached:
        state(filter(xs, \\r -> (r.age < 18)))
    chosen: state(filter(xs, \\r -> (r.age < 18)))

query bad(age: int)
    error: query bad: argument age has the same name as a field
    no plan found

state
    s0: bag<{age: int}> = filter(xs, \\r -> (r.age < 18))
        init: ArrayAlloc(s0, len(filter(xs, \\r -> (r.age < 18)))); EnsureCapacity(s0, len(filter(xs, \\r -> (r.age < 18))))
";
    assert_eq!(text(&spec(), &results()), expected);
}

#[test]
fn json_is_structured() {
    let out = json(&spec(), &results()).unwrap_or_else(|e| panic!("{e}"));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(value["fields"][0]["type"], "int");
    assert_eq!(value["queries"][0]["cost"], 1);
    assert_eq!(value["queries"][0]["from_cache"], true);
    assert_eq!(value["queries"][1]["chosen"], serde_json::Value::Null);
    assert_eq!(value["queries"][1]["args"][0]["name"], "age");
    assert_eq!(value["state"][0]["name"], "s0");
    assert_eq!(value["state"][0]["type"], "bag<{age: int}>");
}
