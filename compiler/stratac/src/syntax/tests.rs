use pretty_assertions::assert_eq;

use super::{lex, parse, ParseError, Token};
use std::path::PathBuf;
use strata_ir::{Expr, Name, Type, Var};

const YOUNG: &str = "\
fields age: int, name: str
assume age >= 0
costmodel \"weights.json\"

query young(limit: int)
    assume limit > 0
    age < 18 and age < limit
    sort age
";

fn age() -> Expr {
    Var::new("age", Type::Int).to_expr()
}

// ── Lexer ───────────────────────────────────────────────

#[test]
fn indentation_is_recorded_per_line() {
    let tokens = lex("query q()\n    age < 1\n").unwrap_or_else(|e| panic!("{e}"));
    let indented: Vec<(Token, bool)> = tokens
        .iter()
        .filter(|t| t.token != Token::Newline)
        .map(|t| (t.token.clone(), t.indented))
        .collect();
    assert_eq!(
        indented,
        vec![
            (Token::Query, false),
            (Token::Ident("q".into()), false),
            (Token::LParen, false),
            (Token::RParen, false),
            (Token::Ident("age".into()), true),
            (Token::Lt, false),
            (Token::Int(1), false),
        ]
    );
}

#[test]
fn comments_and_missing_final_newline() {
    let tokens = lex("# header\nfields a: int # trailing").unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(tokens.first().map(|t| &t.token), Some(&Token::Newline));
    assert_eq!(tokens.last().map(|t| &t.token), Some(&Token::Newline));
    assert!(!tokens.iter().any(|t| matches!(&t.token, Token::Ident(s) if s == "header")));
}

#[test]
fn string_escapes() {
    let tokens = lex(r#"costmodel "a\"b.json""#).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(tokens[1].token, Token::Str("a\"b.json".into()));
}

// ── Parser ──────────────────────────────────────────────

#[test]
fn parses_a_complete_input() {
    let spec = parse(YOUNG).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(spec.fields, vec![(Name::from("age"), Type::Int), (Name::from("name"), Type::Str)]);
    assert_eq!(spec.assumptions, vec![Expr::binary(strata_ir::BinaryOp::Ge, age(), Expr::int(0))]);
    assert_eq!(spec.cost_model, Some(PathBuf::from("weights.json")));

    let q = &spec.queries[0];
    let limit = Var::new("limit", Type::Int);
    assert_eq!(q.name, Name::from("young"));
    assert_eq!(q.args, vec![limit.clone()]);
    assert_eq!(
        q.assumptions,
        vec![Expr::binary(strata_ir::BinaryOp::Gt, limit.to_expr(), Expr::int(0))]
    );
    assert_eq!(
        q.predicate,
        Expr::and(Expr::lt(age(), Expr::int(18)), Expr::lt(age(), limit.to_expr()))
    );
    assert_eq!(q.sort_field, Some(Name::from("age")));
}

#[test]
fn precedence_and_builtins() {
    let spec = parse("fields a: int\nquery q(xs: bag<int>)\n    not a in xs or len(xs) == a + -1\n")
        .unwrap_or_else(|e| panic!("{e}"));
    let a = Var::new("a", Type::Int).to_expr();
    let xs = Var::new("xs", Type::bag(Type::Int)).to_expr();
    assert_eq!(
        spec.queries[0].predicate,
        Expr::or(
            Expr::not(Expr::is_in(a.clone(), xs.clone())),
            Expr::equals(Expr::len(xs), Expr::binary(strata_ir::BinaryOp::Add, a, Expr::int(-1))),
        )
    );
}

#[test]
fn empty_body_means_every_element() {
    let spec = parse("fields a: int\nquery all()\n\nquery none()\n    false\n").unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(spec.queries.len(), 2);
    assert_eq!(spec.queries[0].predicate, Expr::bool(true));
    assert_eq!(spec.queries[1].predicate, Expr::bool(false));
}

#[test]
fn several_predicate_lines_are_conjoined() {
    let spec = parse("fields a: int\nquery q()\n    a < 3\n    0 < a\n").unwrap_or_else(|e| panic!("{e}"));
    let a = Var::new("a", Type::Int).to_expr();
    assert_eq!(
        spec.queries[0].predicate,
        Expr::and(Expr::lt(a.clone(), Expr::int(3)), Expr::lt(Expr::int(0), a))
    );
}

// ── Errors ──────────────────────────────────────────────

fn error(source: &str) -> ParseError {
    match parse(source) {
        Ok(spec) => panic!("expected an error, got {spec:?}"),
        Err(e) => e,
    }
}

#[test]
fn unknown_names_point_at_the_name() {
    let source = "fields a: int\nquery q()\n    b < 1\n";
    let e = error(source);
    assert_eq!(
        e,
        ParseError::UnknownName {
            name: "b".into(),
            span: 28..29,
        }
    );
    assert_eq!(&source[e.span()], "b");
}

#[test]
fn arguments_are_local_to_their_query() {
    let e = error("fields a: int\nquery q(x: int)\n    a < x\nquery r()\n    a < x\n");
    assert!(matches!(e, ParseError::UnknownName { ref name, .. } if name == "x"), "{e:?}");
}

#[test]
fn global_assumptions_see_only_fields() {
    let e = error("fields a: int\nassume a < x\n");
    assert!(matches!(e, ParseError::UnknownName { .. }), "{e:?}");
}

#[test]
fn type_errors() {
    assert!(matches!(error("fields a: int\nquery q()\n    a\n"), ParseError::Type { .. }));
    assert!(matches!(error("fields a: int, s: str\nquery q()\n    a == s\n"), ParseError::Type { .. }));
    assert!(matches!(error("fields a: bool\nquery q()\n    a < a\n"), ParseError::Type { .. }));
    assert!(matches!(error("fields a: int\nquery q()\n    len(a) == 0\n"), ParseError::Type { .. }));
}

#[test]
fn duplicates_are_rejected() {
    assert!(matches!(error("fields a: int, a: str\n"), ParseError::Duplicate { .. }));
    assert!(matches!(error("fields a: int\nquery q()\nquery q()\n"), ParseError::Duplicate { .. }));
    assert!(matches!(error("fields a: int\nquery q(x: int, x: int)\n"), ParseError::Duplicate { .. }));
}

#[test]
fn stray_indentation_and_garbage() {
    assert!(matches!(error("    fields a: int\n"), ParseError::Unexpected { .. }));
    assert!(matches!(error("fields a: int\n@\n"), ParseError::InvalidToken { .. }));
    assert!(matches!(error("fields a: float\n"), ParseError::Unexpected { .. }));
}

#[test]
fn report_shows_the_message_and_file() {
    let source = "fields a: int\nquery q()\n    b < 1\n";
    let report = error(source).report("input.strata", source, false);
    assert!(report.contains("unknown name `b`"), "{report}");
    assert!(report.contains("input.strata"), "{report}");
    assert!(report.contains("not a field or argument"), "{report}");
}
