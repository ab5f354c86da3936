//! The input language.
//!
//! ```text
//! fields age: int, name: str
//! assume age >= 0
//! costmodel "weights.json"
//! query young(limit: int)
//!     assume limit > 0
//!     age < 18 and age < limit
//!     sort age
//! ```
//!
//! Top-level items start at column 0; the body of a query is the indented
//! lines after its header. `#` starts a comment.

mod lexer;
mod parser;

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use thiserror::Error;

pub use lexer::{lex, Spanned, Token};
pub use parser::parse;

/// Byte range in the input text.
pub type Span = Range<usize>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognised input")]
    InvalidToken { span: Span },
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("unknown name `{name}`")]
    UnknownName { name: String, span: Span },
    #[error("`{name}` is declared twice")]
    Duplicate { name: String, span: Span },
    #[error("{message}")]
    Type { message: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::InvalidToken { span }
            | ParseError::Unexpected { span, .. }
            | ParseError::UnknownName { span, .. }
            | ParseError::Duplicate { span, .. }
            | ParseError::Type { span, .. } => span.clone(),
        }
    }

    /// Render with the offending source line, for the terminal.
    pub fn report(&self, path: &str, source: &str, color: bool) -> String {
        let span = self.span();
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, path, span.start)
            .with_config(Config::default().with_color(color))
            .with_message(self.to_string())
            .with_label(
                Label::new((path, span))
                    .with_message(self.label())
                    .with_color(Color::Red),
            )
            .finish()
            .write((path, Source::from(source)), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => format!("{path}: {self}"),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ParseError::InvalidToken { .. } => "not part of the language",
            ParseError::Unexpected { .. } => "unexpected here",
            ParseError::UnknownName { .. } => "not a field or argument",
            ParseError::Duplicate { .. } => "declared again here",
            ParseError::Type { .. } => "ill-typed",
        }
    }
}

#[cfg(test)]
mod tests;
