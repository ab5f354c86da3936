use pretty_assertions::assert_eq;

use super::{emit, synthesize, CliError, Options};
use strata_synth::CostModelError;

const INPUT: &str = "\
fields age: int
assume age >= 0
query young()
    age < 18
";

fn uncached() -> Options {
    Options {
        disable_cache: true,
        ..Options::default()
    }
}

#[test]
fn end_to_end_text() {
    let (spec, results) = synthesize(INPUT, None, &uncached()).unwrap_or_else(|e| panic!("{e}"));
    let out = emit::text(&spec, &results);
    assert!(
        out.contains("    chosen: state(filter(xs, \\r -> (r.age < 18)))\n"),
        "{out}"
    );
    assert!(out.contains("init: ArrayAlloc(s0, "), "{out}");
}

#[test]
fn parse_errors_are_rendered() {
    let err = synthesize("fields age: int\nquery q()\n    agee < 1\n", None, &uncached())
        .err()
        .unwrap_or_else(|| panic!("expected a parse error"));
    match err {
        CliError::Parse(report) => assert!(report.contains("unknown name `agee`"), "{report}"),
        other => panic!("unexpected {other}"),
    }
}

// ── Cost model resolution ───────────────────────────────

#[test]
fn cost_model_needs_an_input_file() {
    let input = format!("{INPUT}costmodel \"weights.json\"\n");
    let err = synthesize(&input, None, &uncached())
        .err()
        .unwrap_or_else(|| panic!("expected an error"));
    assert!(matches!(err, CliError::CostModelFromStdin(_)), "{err}");
}

#[test]
fn missing_cost_model_is_fatal() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
    let input_path = dir.path().join("input.strata");
    let input = format!("{INPUT}costmodel \"weights.json\"\n");
    let err = synthesize(&input, Some(&input_path), &uncached())
        .err()
        .unwrap_or_else(|| panic!("expected an error"));
    assert!(matches!(err, CliError::CostModel(CostModelError::Io { .. })), "{err}");
}

#[test]
fn cost_model_is_resolved_next_to_the_input() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
    std::fs::write(dir.path().join("weights.json"), r#"{ "query_weights": { "young": 3 } }"#)
        .unwrap_or_else(|e| panic!("{e}"));
    let input_path = dir.path().join("input.strata");
    let input = format!("costmodel \"weights.json\"\n{INPUT}");
    let (_, results) = synthesize(&input, Some(&input_path), &uncached()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(results.len(), 1);
    assert!(results[0].chosen.is_some());
}
