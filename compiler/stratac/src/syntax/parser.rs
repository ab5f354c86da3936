//! Recursive-descent parser producing a [`Specification`].
//!
//! Names are resolved and expressions type-checked while parsing: fields
//! are in scope everywhere, query arguments only inside their query.

use std::path::PathBuf;

use strata_ir::{BinaryOp, Expr, Name, Type, UnaryOp, Var};
use strata_synth::{Query, Specification};

use super::lexer::{lex, Spanned, Token};
use super::{ParseError, Span};

/// Parse a whole input file.
pub fn parse(source: &str) -> Result<Specification, ParseError> {
    let tokens = lex(source)?;
    Parser {
        tokens,
        pos: 0,
        spec: Specification {
            fields: Vec::new(),
            assumptions: Vec::new(),
            queries: Vec::new(),
            cost_model: None,
        },
    }
    .file()
}

/// An expression and the source it came from.
struct Typed {
    expr: Expr,
    span: Span,
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    spec: Specification,
}

impl Parser {
    // ===== Token access =====

    fn current(&self) -> &Spanned {
        // `lex` guarantees a trailing newline, so `tokens` is never empty.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, token: &Token) -> bool {
        !self.at_end() && &self.current().token == token
    }

    fn advance(&mut self) -> Spanned {
        let t = self.current().clone();
        self.pos += 1;
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let (found, span) = if self.at_end() {
            let end = self.tokens.last().map_or(0, |t| t.span.end);
            ("end of input".to_string(), end..end)
        } else {
            (self.current().token.to_string(), self.current().span.clone())
        };
        ParseError::Unexpected {
            expected: expected.to_string(),
            found,
            span,
        }
    }

    fn expect(&mut self, token: &Token, expected: &str) -> Result<Span, ParseError> {
        if self.check(token) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn ident(&mut self, expected: &str) -> Result<(Name, Span), ParseError> {
        match &self.current().token {
            Token::Ident(name) if !self.at_end() => {
                let name = Name::from(name.as_str());
                Ok((name, self.advance().span))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn end_line(&mut self) -> Result<(), ParseError> {
        self.expect(&Token::Newline, "end of line").map(|_| ())
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    // ===== Items =====

    fn file(mut self) -> Result<Specification, ParseError> {
        loop {
            self.skip_newlines();
            if self.at_end() {
                return Ok(self.spec);
            }
            if self.current().indented {
                return Err(self.unexpected("a top-level item"));
            }
            match self.current().token {
                Token::Fields => self.fields()?,
                Token::Assume => {
                    self.advance();
                    let a = self.condition(&[])?;
                    self.spec.assumptions.push(a);
                    self.end_line()?;
                }
                Token::CostModel => self.cost_model()?,
                Token::Query => self.query()?,
                _ => return Err(self.unexpected("`fields`, `assume`, `costmodel` or `query`")),
            }
        }
    }

    fn fields(&mut self) -> Result<(), ParseError> {
        self.advance();
        loop {
            let (name, span) = self.ident("a field name")?;
            if self.spec.fields.iter().any(|(f, _)| *f == name) {
                return Err(ParseError::Duplicate {
                    name: name.to_string(),
                    span,
                });
            }
            self.expect(&Token::Colon, "`:`")?;
            let ty = self.ty()?;
            self.spec.fields.push((name, ty));
            if !self.eat(&Token::Comma) {
                return self.end_line();
            }
        }
    }

    fn cost_model(&mut self) -> Result<(), ParseError> {
        let keyword = self.advance().span;
        let Token::Str(path) = self.current().token.clone() else {
            return Err(self.unexpected("a quoted file name"));
        };
        self.advance();
        if self.spec.cost_model.is_some() {
            return Err(ParseError::Duplicate {
                name: "costmodel".to_string(),
                span: keyword,
            });
        }
        self.spec.cost_model = Some(PathBuf::from(path));
        self.end_line()
    }

    fn query(&mut self) -> Result<(), ParseError> {
        self.advance();
        let (name, name_span) = self.ident("a query name")?;
        if self.spec.queries.iter().any(|q| q.name == name) {
            return Err(ParseError::Duplicate {
                name: name.to_string(),
                span: name_span,
            });
        }

        self.expect(&Token::LParen, "`(`")?;
        let mut args: Vec<Var> = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                let (arg, span) = self.ident("an argument name")?;
                if args.iter().any(|a| a.name == arg) {
                    return Err(ParseError::Duplicate {
                        name: arg.to_string(),
                        span,
                    });
                }
                self.expect(&Token::Colon, "`:`")?;
                args.push(Var::new(arg, self.ty()?));
                if !self.eat(&Token::Comma) {
                    self.expect(&Token::RParen, "`,` or `)`")?;
                    break;
                }
            }
        }
        self.end_line()?;

        let mut assumptions = Vec::new();
        let mut predicate: Option<Expr> = None;
        let mut sort_field = None;
        loop {
            self.skip_newlines();
            if self.at_end() || !self.current().indented {
                break;
            }
            match self.current().token {
                Token::Assume => {
                    self.advance();
                    assumptions.push(self.condition(&args)?);
                }
                Token::Sort => {
                    self.advance();
                    sort_field = Some(self.ident("a field name")?.0);
                }
                _ => {
                    let p = self.condition(&args)?;
                    predicate = Some(match predicate {
                        Some(prev) => Expr::and(prev, p),
                        None => p,
                    });
                }
            }
            self.end_line()?;
        }

        self.spec.queries.push(Query {
            name,
            args,
            assumptions,
            predicate: predicate.unwrap_or_else(|| Expr::bool(true)),
            sort_field,
        });
        Ok(())
    }

    fn ty(&mut self) -> Result<Type, ParseError> {
        let (name, _) = self.ident("a type")?;
        match name.as_str() {
            "int" => Ok(Type::Int),
            "bool" => Ok(Type::Bool),
            "str" => Ok(Type::Str),
            "bag" | "list" => {
                self.expect(&Token::Lt, "`<`")?;
                let elem = self.ty()?;
                self.expect(&Token::Gt, "`>`")?;
                Ok(if name == "bag" { Type::bag(elem) } else { Type::list(elem) })
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected("`int`, `bool`, `str`, `bag<..>` or `list<..>`"))
            }
        }
    }

    // ===== Expressions =====

    /// A boolean expression.
    fn condition(&mut self, args: &[Var]) -> Result<Expr, ParseError> {
        let e = self.or(args)?;
        expect_type(&e, &Type::Bool)?;
        Ok(e.expr)
    }

    fn or(&mut self, args: &[Var]) -> Result<Typed, ParseError> {
        let mut left = self.and(args)?;
        while self.eat(&Token::Or) {
            let right = self.and(args)?;
            left = logical(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn and(&mut self, args: &[Var]) -> Result<Typed, ParseError> {
        let mut left = self.not(args)?;
        while self.eat(&Token::And) {
            let right = self.not(args)?;
            left = logical(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    fn not(&mut self, args: &[Var]) -> Result<Typed, ParseError> {
        if self.check(&Token::Not) {
            let start = self.advance().span.start;
            let operand = self.not(args)?;
            expect_type(&operand, &Type::Bool)?;
            return Ok(Typed {
                span: start..operand.span.end,
                expr: Expr::not(operand.expr),
            });
        }
        self.comparison(args)
    }

    fn comparison(&mut self, args: &[Var]) -> Result<Typed, ParseError> {
        let left = self.additive(args)?;
        let op = match self.current().token {
            _ if self.at_end() => return Ok(left),
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::Ne,
            Token::Lt => BinaryOp::Lt,
            Token::LtEq => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::GtEq => BinaryOp::Ge,
            Token::In => BinaryOp::In,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive(args)?;
        let span = left.span.start..right.span.end;
        match op {
            BinaryOp::In => {
                if right.expr.ty.elem() != Some(&left.expr.ty) {
                    return Err(ParseError::Type {
                        message: format!("cannot test {} for membership in {}", left.expr.ty, right.expr.ty),
                        span,
                    });
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => same_type(&left, &right, &span)?,
            _ => {
                same_type(&left, &right, &span)?;
                if !matches!(left.expr.ty, Type::Int | Type::Str) {
                    return Err(ParseError::Type {
                        message: format!("values of type {} are not ordered", left.expr.ty),
                        span,
                    });
                }
            }
        }
        Ok(Typed {
            expr: Expr::binary(op, left.expr, right.expr),
            span,
        })
    }

    fn additive(&mut self, args: &[Var]) -> Result<Typed, ParseError> {
        let mut left = self.unary(args)?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinaryOp::Add
            } else if self.eat(&Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.unary(args)?;
            let span = left.span.start..right.span.end;
            same_type(&left, &right, &span)?;
            if left.expr.ty != Type::Int && !left.expr.ty.is_collection() {
                return Err(ParseError::Type {
                    message: format!("cannot apply `{op}` to {}", left.expr.ty),
                    span,
                });
            }
            left = Typed {
                expr: Expr::binary(op, left.expr, right.expr),
                span,
            };
        }
    }

    fn unary(&mut self, args: &[Var]) -> Result<Typed, ParseError> {
        if !self.check(&Token::Minus) {
            return self.atom(args);
        }
        let start = self.advance().span.start;
        let operand = self.unary(args)?;
        expect_type(&operand, &Type::Int)?;
        let span = start..operand.span.end;
        let expr = match operand.expr.kind {
            strata_ir::ExprKind::Int(i) => Expr::int(i.wrapping_neg()),
            _ => Expr::unary(UnaryOp::Neg, operand.expr),
        };
        Ok(Typed { expr, span })
    }

    fn atom(&mut self, args: &[Var]) -> Result<Typed, ParseError> {
        if self.at_end() {
            return Err(self.unexpected("an expression"));
        }
        let Spanned { token, span, .. } = self.current().clone();
        let expr = match token {
            Token::Int(i) => Expr::int(i),
            Token::Str(s) => Expr::str(s),
            Token::True => Expr::bool(true),
            Token::False => Expr::bool(false),
            Token::LParen => {
                self.advance();
                let inner = self.or(args)?;
                let end = self.expect(&Token::RParen, "`)`")?.end;
                return Ok(Typed {
                    expr: inner.expr,
                    span: span.start..end,
                });
            }
            Token::Ident(name) => {
                self.advance();
                if self.check(&Token::LParen) {
                    return self.builtin(&name, span, args);
                }
                return self.variable(&name, span, args);
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(Typed { expr, span })
    }

    fn variable(&self, name: &str, span: Span, args: &[Var]) -> Result<Typed, ParseError> {
        let var = args.iter().find(|a| a.name == name).cloned().or_else(|| {
            self.spec
                .fields
                .iter()
                .find(|(f, _)| f == name)
                .map(|(f, ty)| Var::new(f.clone(), ty.clone()))
        });
        match var {
            Some(var) => Ok(Typed {
                expr: var.to_expr(),
                span,
            }),
            None => Err(ParseError::UnknownName {
                name: name.to_string(),
                span,
            }),
        }
    }

    /// `len(e)`, `sum(e)`, `exists(e)`, `empty(e)`, `distinct(e)`.
    fn builtin(&mut self, name: &str, span: Span, args: &[Var]) -> Result<Typed, ParseError> {
        let op = match name {
            "len" => UnaryOp::Len,
            "sum" => UnaryOp::Sum,
            "exists" => UnaryOp::Exists,
            "empty" => UnaryOp::Empty,
            "distinct" => UnaryOp::Distinct,
            _ => {
                return Err(ParseError::UnknownName {
                    name: name.to_string(),
                    span,
                })
            }
        };
        self.advance();
        let operand = self.or(args)?;
        let end = self.expect(&Token::RParen, "`)`")?.end;
        let full = span.start..end;
        let ok = match op {
            UnaryOp::Sum => operand.expr.ty.elem() == Some(&Type::Int),
            _ => operand.expr.ty.is_collection(),
        };
        if !ok {
            return Err(ParseError::Type {
                message: format!("cannot apply {name} to {}", operand.expr.ty),
                span: full,
            });
        }
        Ok(Typed {
            expr: Expr::unary(op, operand.expr),
            span: full,
        })
    }
}

fn expect_type(e: &Typed, ty: &Type) -> Result<(), ParseError> {
    if e.expr.ty == *ty {
        Ok(())
    } else {
        Err(ParseError::Type {
            message: format!("expected {ty}, found {}", e.expr.ty),
            span: e.span.clone(),
        })
    }
}

fn same_type(left: &Typed, right: &Typed, span: &Span) -> Result<(), ParseError> {
    if left.expr.ty == right.expr.ty {
        Ok(())
    } else {
        Err(ParseError::Type {
            message: format!("mismatched operands: {} and {}", left.expr.ty, right.expr.ty),
            span: span.clone(),
        })
    }
}

fn logical(op: BinaryOp, left: Typed, right: Typed) -> Result<Typed, ParseError> {
    expect_type(&left, &Type::Bool)?;
    expect_type(&right, &Type::Bool)?;
    Ok(Typed {
        span: left.span.start..right.span.end,
        expr: Expr::binary(op, left.expr, right.expr),
    })
}
