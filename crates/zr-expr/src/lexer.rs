//! Hand-written tokenizer, following the teacher's preference for a
//! recursive-descent hand-rolled parser (Design Note §9: "implement as a
//! hand-written recursive-descent parser over a small AST").

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Dot,
    Comma,
    LParen,
    RParen,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString { start: usize },
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char, usize),
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn push_simple(&mut self, tok: Token, start: usize, width: usize) -> (Token, Span) {
        (
            tok,
            Span {
                start,
                end: start + width,
            },
        )
    }

    pub fn tokenize(mut self) -> Result<Vec<(Token, Span)>, LexError> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(i, c)) = self.chars.peek() else {
                out.push((Token::Eof, Span { start: self.src.len(), end: self.src.len() }));
                break;
            };
            match c {
                '.' => {
                    self.chars.next();
                    out.push(self.push_simple(Token::Dot, i, 1));
                }
                ',' => {
                    self.chars.next();
                    out.push(self.push_simple(Token::Comma, i, 1));
                }
                '(' => {
                    self.chars.next();
                    out.push(self.push_simple(Token::LParen, i, 1));
                }
                ')' => {
                    self.chars.next();
                    out.push(self.push_simple(Token::RParen, i, 1));
                }
                '!' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '='))) {
                        self.chars.next();
                        out.push(self.push_simple(Token::NotEq, i, 2));
                    } else {
                        out.push(self.push_simple(Token::Bang, i, 1));
                    }
                }
                '=' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '='))) {
                        self.chars.next();
                        out.push(self.push_simple(Token::EqEq, i, 2));
                    } else {
                        return Err(LexError::UnexpectedChar('=', i));
                    }
                }
                '&' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '&'))) {
                        self.chars.next();
                        out.push(self.push_simple(Token::AndAnd, i, 2));
                    } else {
                        return Err(LexError::UnexpectedChar('&', i));
                    }
                }
                '|' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '|'))) {
                        self.chars.next();
                        out.push(self.push_simple(Token::OrOr, i, 2));
                    } else {
                        return Err(LexError::UnexpectedChar('|', i));
                    }
                }
                '"' | '\'' => {
                    let quote = c;
                    self.chars.next();
                    let mut s = String::new();
                    let mut closed = false;
                    while let Some((_, c2)) = self.chars.next() {
                        if c2 == quote {
                            closed = true;
                            break;
                        }
                        if c2 == '\\' {
                            if let Some((_, escaped)) = self.chars.next() {
                                s.push(escaped);
                            }
                        } else {
                            s.push(c2);
                        }
                    }
                    if !closed {
                        return Err(LexError::UnterminatedString { start: i });
                    }
                    let end = self.chars.peek().map(|&(j, _)| j).unwrap_or(self.src.len());
                    out.push((Token::Str(s), Span { start: i, end }));
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let start = i;
                    let mut end = i;
                    while let Some(&(j, c2)) = self.chars.peek() {
                        if c2.is_ascii_alphanumeric() || c2 == '_' {
                            end = j + c2.len_utf8();
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    let ident = self.src[start..end].to_string();
                    out.push((Token::Ident(ident), Span { start, end }));
                }
                other => return Err(LexError::UnexpectedChar(other, i)),
            }
        }
        Ok(out)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }
}
