use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    ast::{Expr, InterpPart},
    lexer::{LexError, Lexer, Span, Token},
};

#[derive(Debug, Error, Diagnostic)]
#[error("invalid expression: {message}")]
#[diagnostic(code(zr::expr::invalid_expression))]
pub struct InvalidExpression {
    message: String,
    #[source_code]
    src: String,
    #[label("here")]
    span: Option<SourceSpan>,
}

impl InvalidExpression {
    fn new(src: &str, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            src: src.to_string(),
            span: span.map(|s| (s.start, s.end.saturating_sub(s.start)).into()),
        }
    }
}

/// Parses a bare boolean/comparison expression (no surrounding `{{ }}`), per
/// spec.md §4.2: `==`, `!=`, `&&`, `||`, `!`, parenthesization, dotted paths,
/// and built-in calls.
pub fn parse(src: &str) -> Result<Expr, InvalidExpression> {
    let tokens = Lexer::new(src)
        .tokenize()
        .map_err(|e| lex_err_to_invalid(src, e))?;
    let mut parser = Parser { src, tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parses the string-interpolation form: a string possibly containing
/// `{{ expr }}` segments. Returns `Expr::StrLit` unchanged if there are no
/// interpolations, `Expr::Interpolated` otherwise.
pub fn parse_interpolated(src: &str) -> Result<Expr, InvalidExpression> {
    if !src.contains("{{") {
        return Ok(Expr::StrLit(src.to_string()));
    }
    let mut parts = Vec::new();
    let mut rest = src;
    let mut consumed = 0usize;
    loop {
        match rest.find("{{") {
            None => {
                if !rest.is_empty() {
                    parts.push(InterpPart::Literal(rest.to_string()));
                }
                break;
            }
            Some(open) => {
                if open > 0 {
                    parts.push(InterpPart::Literal(rest[..open].to_string()));
                }
                let after_open = &rest[open + 2..];
                let Some(close) = after_open.find("}}") else {
                    return Err(InvalidExpression::new(
                        src,
                        "unterminated '{{' interpolation",
                        Some(Span {
                            start: consumed + open,
                            end: src.len(),
                        }),
                    ));
                };
                let inner = after_open[..close].trim();
                let inner_expr = parse(inner).map_err(|mut e| {
                    e.src = src.to_string();
                    e
                })?;
                parts.push(InterpPart::Expr(Box::new(inner_expr)));
                let advance = open + 2 + close + 2;
                consumed += advance;
                rest = &after_open[close + 2..];
            }
        }
    }
    Ok(Expr::Interpolated(parts))
}

fn lex_err_to_invalid(src: &str, e: LexError) -> InvalidExpression {
    match e {
        LexError::UnterminatedString { start } => InvalidExpression::new(
            src,
            "unterminated string literal",
            Some(Span {
                start,
                end: src.len(),
            }),
        ),
        LexError::UnexpectedChar(c, pos) => InvalidExpression::new(
            src,
            format!("unexpected character {c:?}"),
            Some(Span {
                start: pos,
                end: pos + 1,
            }),
        ),
    }
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), InvalidExpression> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(InvalidExpression::new(
                self.src,
                format!("unexpected trailing token {:?}", self.peek()),
                Some(self.span()),
            ))
        }
    }

    fn err(&self, message: impl Into<String>) -> InvalidExpression {
        InvalidExpression::new(self.src, message, Some(self.span()))
    }

    fn parse_or(&mut self) -> Result<Expr, InvalidExpression> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, InvalidExpression> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Token::AndAnd) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, InvalidExpression> {
        let lhs = self.parse_unary()?;
        match self.peek() {
            Token::EqEq => {
                self.advance();
                let rhs = self.parse_unary()?;
                Ok(Expr::Eq(Box::new(lhs), Box::new(rhs)))
            }
            Token::NotEq => {
                self.advance();
                let rhs = self.parse_unary()?;
                Ok(Expr::NotEq(Box::new(lhs), Box::new(rhs)))
            }
            _ => Ok(lhs),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, InvalidExpression> {
        if matches!(self.peek(), Token::Bang) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, InvalidExpression> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                if !matches!(self.peek(), Token::RParen) {
                    return Err(self.err("expected ')'"));
                }
                self.advance();
                Ok(inner)
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::StrLit(s))
            }
            Token::Ident(first) => {
                self.advance();
                if first == "true" {
                    return Ok(Expr::BoolLit(true));
                }
                if first == "false" {
                    return Ok(Expr::BoolLit(false));
                }
                let mut path = vec![first];
                while matches!(self.peek(), Token::Dot) {
                    self.advance();
                    match self.advance() {
                        Token::Ident(seg) => path.push(seg),
                        _ => return Err(self.err("expected identifier after '.'")),
                    }
                }
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if matches!(self.peek(), Token::Comma) {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    if !matches!(self.peek(), Token::RParen) {
                        return Err(self.err("expected ')' to close call arguments"));
                    }
                    self.advance();
                    Ok(Expr::Call { target: path, args })
                } else {
                    Ok(Expr::Path(path))
                }
            }
            _ => Err(self.err("expected an expression")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_equality() {
        let expr = parse(r#"platform.os == "linux""#).unwrap();
        assert_eq!(
            expr,
            Expr::Eq(
                Box::new(Expr::Path(vec!["platform".into(), "os".into()])),
                Box::new(Expr::StrLit("linux".into()))
            )
        );
    }

    #[test]
    fn parses_call_with_args() {
        let expr = parse(r#"file.exists("a/b.txt")"#).unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                target: vec!["file".into(), "exists".into()],
                args: vec![Expr::StrLit("a/b.txt".into())],
            }
        );
    }

    #[test]
    fn parses_and_or_not_precedence() {
        // `!` binds tighter than `==`, which binds tighter than `&&`, which
        // binds tighter than `||`.
        let expr = parse("a == b && c || !d").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                Box::new(Expr::And(
                    Box::new(Expr::Eq(
                        Box::new(Expr::Path(vec!["a".into()])),
                        Box::new(Expr::Path(vec!["b".into()]))
                    )),
                    Box::new(Expr::Path(vec!["c".into()]))
                )),
                Box::new(Expr::Not(Box::new(Expr::Path(vec!["d".into()]))))
            )
        );
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(parse("a ==").is_err());
        assert!(parse("(a && b").is_err());
        assert!(parse("a @ b").is_err());
    }

    #[test]
    fn parses_interpolation() {
        let expr = parse_interpolated("hello {{ env.NAME }}!").unwrap();
        assert_eq!(
            expr,
            Expr::Interpolated(vec![
                InterpPart::Literal("hello ".into()),
                InterpPart::Expr(Box::new(Expr::Path(vec!["env".into(), "NAME".into()]))),
                InterpPart::Literal("!".into()),
            ])
        );
    }

    #[test]
    fn plain_string_has_no_interpolation() {
        assert_eq!(
            parse_interpolated("plain text").unwrap(),
            Expr::StrLit("plain text".into())
        );
    }
}
