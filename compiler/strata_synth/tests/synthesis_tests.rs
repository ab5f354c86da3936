#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
//! End-to-end synthesis tests.
//!
//! Each test builds a specification the way the CLI parser would, runs the
//! whole pipeline, and checks the plans that come out.

use pretty_assertions::assert_eq;

use strata_ir::{BinaryOp, Expr, ExtensionRegistry, Name, Type, Var};
use strata_solver::{eval, Env, Value, Z3Solver};
use strata_synth::{
    AsymptoticCostModel, BestSet, Cost, CostModel, Enumerator, FsPlanCache, Offer, Plan, Query, Specification, Structure,
    SynthConfig, Synthesizer,
};

fn age() -> Expr {
    Var::new("age", Type::Int).to_expr()
}

fn limit() -> Var {
    Var::new("limit", Type::Int)
}

fn fields() -> Vec<(Name, Type)> {
    vec![(Name::from("age"), Type::Int), (Name::from("name"), Type::Str)]
}

/// ```text
/// fields age: int, name: str
/// assume age >= 0
/// query young(limit: int)
///     assume limit > 0
///     age < 18 and age < limit
///     sort age
/// ```
fn young_spec() -> Specification {
    Specification {
        fields: fields(),
        assumptions: vec![Expr::le(Expr::int(0), age())],
        queries: vec![Query {
            name: Name::from("young"),
            args: vec![limit()],
            assumptions: vec![Expr::lt(Expr::int(0), limit().to_expr())],
            predicate: Expr::and(Expr::lt(age(), Expr::int(18)), Expr::lt(age(), limit().to_expr())),
            sort_field: Some(Name::from("age")),
        }],
        cost_model: None,
    }
}

const YOUNG_INPUT: &str = "fields age: int, name: str\n\
                           assume age >= 0\n\
                           query young(limit: int)\n    assume limit > 0\n    age < 18 and age < limit\n    sort age\n";

fn uncached() -> SynthConfig {
    SynthConfig {
        cache_enabled: false,
        ..SynthConfig::default()
    }
}

// ── Scenarios ───────────────────────────────────────────

#[test]
fn young_query_persists_the_sorted_prefix() {
    let registry = ExtensionRegistry::new();
    let spec = young_spec();
    let results = Synthesizer::new(uncached(), &registry).run(YOUNG_INPUT, &spec);

    let young = &results[0];
    assert_eq!(young.error, None);
    let chosen = young.chosen.as_ref().expect("a plan for young");
    assert_eq!(
        chosen.to_string(),
        "filter(state(sort_by(filter(xs, \\r -> (r.age < 18)), \\r -> r.age)), \\r -> (r.age < limit))"
    );

    // Never worse than the plain scan.
    let structure = Structure::new(fields(), &[limit()]);
    let scan = Plan::new(Expr::sort_by(
        Expr::filter(
            Expr::state_var(structure.xs.to_expr()),
            structure.element_test(&spec.queries[0].predicate),
        ),
        structure.key(&Name::from("age")),
    ));
    let model = AsymptoticCostModel::default();
    assert!(model.cost(chosen) <= model.cost(&scan));
    assert_eq!(young.best.cost(), Some(model.cost(chosen)));
    assert_eq!(young.best.cost(), Some(Cost(2001)));
}

#[test]
fn conjunct_over_an_argument_is_never_dropped() {
    let spec = Specification {
        fields: vec![(Name::from("age"), Type::Int)],
        assumptions: vec![],
        queries: vec![Query {
            name: Name::from("q"),
            args: vec![limit()],
            assumptions: vec![],
            predicate: Expr::and(
                Expr::lt(age(), Expr::int(18)),
                Expr::lt(age(), Expr::binary(BinaryOp::Add, limit().to_expr(), Expr::int(50))),
            ),
            sort_field: None,
        }],
        cost_model: None,
    };
    let registry = ExtensionRegistry::new();
    let results =
        Synthesizer::new(uncached(), &registry).run("fields age: int
query q(limit: int)
    age < 18 and age < limit + 50
", &spec);

    let chosen = results[0].chosen.as_ref().expect("a plan for q");
    assert!(chosen.to_string().contains("limit"), "{chosen}");

    // Age 10 passes `age < 18` but not `age < limit + 50` at limit -45.
    let structure = Structure::new(spec.fields.clone(), &[limit()]);
    let row = Value::Record(vec![(Name::from("age"), Value::Int(10))]);
    let mut env: Env = [
        (structure.xs.name.clone(), Value::bag(vec![row])),
        (Name::from("limit"), Value::Int(-45)),
    ]
    .into_iter()
    .collect();
    assert_eq!(eval(&chosen.expr, &mut env).map(|v| v.elements().map(<[Value]>::len)), Ok(Some(0)));
}

#[test]
fn equality_on_an_argument_becomes_an_index_lookup() {
    let a = Var::new("a", Type::Int);
    let spec = Specification {
        fields: vec![(Name::from("age"), Type::Int)],
        assumptions: vec![],
        queries: vec![Query {
            name: Name::from("by_age"),
            args: vec![a.clone()],
            assumptions: vec![],
            predicate: Expr::equals(age(), a.to_expr()),
            sort_field: None,
        }],
        cost_model: None,
    };
    let registry = ExtensionRegistry::new();
    let results = Synthesizer::new(uncached(), &registry).run("fields age: int\nquery by_age(a: int)\n    age == a\n", &spec);

    let shown: Vec<String> = results[0].best.plans().iter().map(ToString::to_string).collect();
    assert_eq!(
        shown,
        vec!["state(make_map(map(xs, \\r -> r.age), \\k -> filter(xs, \\r -> (r.age == k))))[a]"]
    );
}

// ── Best-set discipline ─────────────────────────────────

#[test]
fn best_cost_only_ever_decreases() {
    let spec = young_spec();
    let query = &spec.queries[0];
    let structure = Structure::new(spec.fields.clone(), &query.args);
    let registry = ExtensionRegistry::new();
    let model = AsymptoticCostModel::default();

    let mut best = BestSet::new();
    let mut costs = Vec::new();
    let mut history = Vec::new();
    let plans = Enumerator::new(&structure, query, &spec.assumptions, &registry, Z3Solver::default()).unwrap();
    for plan in plans {
        let plan = plan.unwrap();
        let cost = model.cost(&plan);
        costs.push(cost);
        if best.offer(plan, cost) == Offer::Improved {
            history.push(cost);
        }
    }

    assert!(!costs.is_empty());
    assert!(history.windows(2).all(|w| w[1] < w[0]), "{history:?}");
    assert_eq!(best.cost(), costs.iter().min().copied());
    let tied = costs.iter().filter(|c| Some(**c) == best.cost()).count();
    assert!((1..=tied).contains(&best.len()));
}

// ── Cache ───────────────────────────────────────────────

#[test]
fn results_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = SynthConfig {
        cache_enabled: true,
        cache_dir: dir.path().to_path_buf(),
        ..SynthConfig::default()
    };
    let registry = ExtensionRegistry::new();
    let spec = young_spec();

    let first = Synthesizer::new(config.clone(), &registry).run(YOUNG_INPUT, &spec);
    assert!(!first[0].from_cache);
    assert!(FsPlanCache::new(dir.path()).has(&strata_synth::CacheKey::new(YOUNG_INPUT, "young")));

    let second = Synthesizer::new(config, &registry).run(YOUNG_INPUT, &spec);
    assert!(second[0].from_cache);
    assert_eq!(second[0].stats.candidates, 0);
    assert_eq!(second[0].best, first[0].best);
    assert_eq!(second[0].chosen, first[0].chosen);
}

#[test]
fn corrupt_cache_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let key = strata_synth::CacheKey::new(YOUNG_INPUT, "young");
    std::fs::write(dir.path().join(format!("{key}.bin")), b"not bincode").unwrap();
    let config = SynthConfig {
        cache_enabled: true,
        cache_dir: dir.path().to_path_buf(),
        ..SynthConfig::default()
    };
    let registry = ExtensionRegistry::new();
    let results = Synthesizer::new(config, &registry).run(YOUNG_INPUT, &young_spec());
    assert!(!results[0].from_cache);
    assert!(results[0].chosen.is_some());
}
