//! Tokens of the input language, via logos.

use std::fmt;

use logos::Logos;

use super::{ParseError, Span};

#[derive(Logos, Clone, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("\n")]
    Newline,

    // ===== Items =====
    #[token("fields")]
    Fields,
    #[token("assume")]
    Assume,
    #[token("costmodel")]
    CostModel,
    #[token("query")]
    Query,
    #[token("sort")]
    Sort,

    // ===== Operators =====
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,

    // ===== Punctuation =====
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,

    // ===== Literals =====
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Newline => f.write_str("end of line"),
            Token::Fields => f.write_str("`fields`"),
            Token::Assume => f.write_str("`assume`"),
            Token::CostModel => f.write_str("`costmodel`"),
            Token::Query => f.write_str("`query`"),
            Token::Sort => f.write_str("`sort`"),
            Token::And => f.write_str("`and`"),
            Token::Or => f.write_str("`or`"),
            Token::Not => f.write_str("`not`"),
            Token::In => f.write_str("`in`"),
            Token::EqEq => f.write_str("`==`"),
            Token::NotEq => f.write_str("`!=`"),
            Token::LtEq => f.write_str("`<=`"),
            Token::GtEq => f.write_str("`>=`"),
            Token::Lt => f.write_str("`<`"),
            Token::Gt => f.write_str("`>`"),
            Token::Plus => f.write_str("`+`"),
            Token::Minus => f.write_str("`-`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::Comma => f.write_str("`,`"),
            Token::Colon => f.write_str("`:`"),
            Token::True => f.write_str("`true`"),
            Token::False => f.write_str("`false`"),
            Token::Int(i) => write!(f, "`{i}`"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Ident(name) => write!(f, "`{name}`"),
        }
    }
}

/// A token with its location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
    /// First token of its line, preceded by whitespace.
    pub indented: bool,
}

/// Tokenize `source`. The result always ends with a newline token.
pub fn lex(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut out: Vec<Spanned> = Vec::new();
    let mut lexer = Token::lexer(source);
    let mut line_start = 0;
    let mut at_line_start = true;
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let Ok(token) = result else {
            return Err(ParseError::InvalidToken { span });
        };
        let indented = at_line_start && span.start > line_start;
        if token == Token::Newline {
            line_start = span.end;
            at_line_start = true;
        } else {
            at_line_start = false;
        }
        out.push(Spanned { token, span, indented });
    }
    if out.last().map_or(true, |t| t.token != Token::Newline) {
        out.push(Spanned {
            token: Token::Newline,
            span: source.len()..source.len(),
            indented: false,
        });
    }
    Ok(out)
}
