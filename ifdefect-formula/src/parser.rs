//! Parser for the boolean expression surface syntax.
//!
//! Recursive descent over an eagerly lexed token vector. Relational and
//! arithmetic subterms are not interpreted: as soon as a comparison or
//! arithmetic operator follows an operand, the whole chain up to the next
//! boolean connective is captured verbatim as an [`Any`](BoolExpr::Any)
//! atom. Numeric and character literals standing on their own become
//! constants (nonzero is true).

use thiserror::Error;

use crate::expr::BoolExpr;

/// Possible errors while parsing a boolean expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}' in expression")]
    UnexpectedChar(char),
    #[error("unterminated character literal")]
    UnterminatedCharLiteral,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected '{expected}', found '{found}'")]
    Expected { expected: String, found: String },
    #[error("trailing input after expression: '{0}'")]
    TrailingInput(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Number(String),
    CharLit(String),
    LParen,
    RParen,
    Comma,
    Bang,
    AndAnd,
    OrOr,
    Arrow,
    BiArrow,
    /// Relational, arithmetic or bitwise operator, kept verbatim.
    Op(String),
}

impl Tok {
    fn render(&self) -> String {
        match self {
            Tok::Ident(s) | Tok::Number(s) | Tok::Op(s) => s.clone(),
            Tok::CharLit(s) => format!("'{}'", s),
            Tok::LParen => "(".to_string(),
            Tok::RParen => ")".to_string(),
            Tok::Comma => ",".to_string(),
            Tok::Bang => "!".to_string(),
            Tok::AndAnd => "&&".to_string(),
            Tok::OrOr => "||".to_string(),
            Tok::Arrow => "->".to_string(),
            Tok::BiArrow => "<->".to_string(),
        }
    }
}

fn lex(input: &str) -> Result<Vec<Tok>, ParseError> {
    let mut toks = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    // '.' continues an identifier: macro-rewrite variants
                    // (CONFIG_C.) and file atoms (FILE_foo.c) are single
                    // tokens.
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Ident(ident));
            }
            _ if c.is_ascii_digit() => {
                let mut number = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Number(number));
            }
            '\'' => {
                chars.next();
                let mut lit = String::new();
                loop {
                    match chars.next() {
                        None => return Err(ParseError::UnterminatedCharLiteral),
                        Some('\'') => break,
                        Some('\\') => {
                            lit.push('\\');
                            match chars.next() {
                                None => return Err(ParseError::UnterminatedCharLiteral),
                                Some(escaped) => lit.push(escaped),
                            }
                        }
                        Some(other) => lit.push(other),
                    }
                }
                toks.push(Tok::CharLit(lit));
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            ',' => {
                chars.next();
                toks.push(Tok::Comma);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Op("!=".to_string()));
                } else {
                    toks.push(Tok::Bang);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    toks.push(Tok::AndAnd);
                } else {
                    toks.push(Tok::Op("&".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    toks.push(Tok::OrOr);
                } else {
                    toks.push(Tok::Op("|".to_string()));
                }
            }
            '-' => {
                chars.next();
                if chars.peek() == Some(&'>') {
                    chars.next();
                    toks.push(Tok::Arrow);
                } else {
                    toks.push(Tok::Op("-".to_string()));
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('-') => {
                        chars.next();
                        if chars.next() == Some('>') {
                            toks.push(Tok::BiArrow);
                        } else {
                            return Err(ParseError::UnexpectedChar('-'));
                        }
                    }
                    Some('<') => {
                        chars.next();
                        toks.push(Tok::Op("<<".to_string()));
                    }
                    Some('=') => {
                        chars.next();
                        toks.push(Tok::Op("<=".to_string()));
                    }
                    _ => toks.push(Tok::Op("<".to_string())),
                }
            }
            '>' => {
                chars.next();
                match chars.peek() {
                    Some('>') => {
                        chars.next();
                        toks.push(Tok::Op(">>".to_string()));
                    }
                    Some('=') => {
                        chars.next();
                        toks.push(Tok::Op(">=".to_string()));
                    }
                    _ => toks.push(Tok::Op(">".to_string())),
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Op("==".to_string()));
                } else {
                    toks.push(Tok::Op("=".to_string()));
                }
            }
            '+' | '*' | '/' | '%' | '^' | '~' => {
                chars.next();
                toks.push(Tok::Op(c.to_string()));
            }
            _ => return Err(ParseError::UnexpectedChar(c)),
        }
    }
    Ok(toks)
}

/// Re-render a token span with canonical spacing, used for opaque atoms.
fn render_span(toks: &[Tok]) -> String {
    let mut out = String::new();
    for tok in toks {
        let piece = tok.render();
        if !out.is_empty() && !out.ends_with('(') && piece != ")" && piece != "," {
            out.push(' ');
        }
        out.push_str(&piece);
    }
    out
}

/// A number or character literal is false iff its value is zero.
fn literal_truth(tok: &Tok) -> bool {
    match tok {
        Tok::Number(text) => {
            let digits = text
                .trim_start_matches("0x")
                .trim_start_matches("0X")
                .trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
            !digits.chars().all(|c| c == '0')
        }
        Tok::CharLit(text) => text != "\\0",
        _ => unreachable!("literal_truth on non-literal token"),
    }
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Tok) -> Result<(), ParseError> {
        match self.next() {
            Some(ref tok) if *tok == expected => Ok(()),
            Some(tok) => Err(ParseError::Expected {
                expected: expected.render(),
                found: tok.render(),
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<BoolExpr, ParseError> {
        let mut lhs = self.impl_expr()?;
        while self.eat(&Tok::BiArrow) {
            let rhs = self.impl_expr()?;
            lhs = BoolExpr::iff(lhs, rhs);
        }
        Ok(lhs)
    }

    fn impl_expr(&mut self) -> Result<BoolExpr, ParseError> {
        let mut lhs = self.or_expr()?;
        while self.eat(&Tok::Arrow) {
            let rhs = self.or_expr()?;
            lhs = BoolExpr::implies(lhs, rhs);
        }
        Ok(lhs)
    }

    fn or_expr(&mut self) -> Result<BoolExpr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Tok::OrOr) {
            let rhs = self.and_expr()?;
            lhs = BoolExpr::or(lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<BoolExpr, ParseError> {
        let mut lhs = self.operand()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.operand()?;
            lhs = BoolExpr::and(lhs, rhs);
        }
        Ok(lhs)
    }

    /// One operand of a boolean connective: a unary expression, or an
    /// opaque relational/arithmetic chain collapsed into a single atom.
    fn operand(&mut self) -> Result<BoolExpr, ParseError> {
        let start = self.pos;
        let unary = self.unary()?;
        if let Some(Tok::Op(_)) = self.peek() {
            self.skip_opaque_chain();
            return Ok(BoolExpr::any(render_span(&self.toks[start..self.pos])));
        }
        Ok(unary)
    }

    /// Consume tokens until the next boolean connective, a comma, or an
    /// unbalanced closing parenthesis.
    fn skip_opaque_chain(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::AndAnd | Tok::OrOr | Tok::Arrow | Tok::BiArrow => break,
                Tok::Comma if depth == 0 => break,
                Tok::RParen if depth == 0 => break,
                Tok::RParen => {
                    depth -= 1;
                    self.pos += 1;
                }
                Tok::LParen => {
                    depth += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn unary(&mut self) -> Result<BoolExpr, ParseError> {
        match self.next() {
            None => Err(ParseError::UnexpectedEnd),
            Some(Tok::Bang) => Ok(BoolExpr::not(self.unary()?)),
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Ident(name)) => {
                if self.eat(&Tok::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Tok::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if self.eat(&Tok::Comma) {
                                continue;
                            }
                            self.expect(Tok::RParen)?;
                            break;
                        }
                    }
                    Ok(BoolExpr::call(name, args))
                } else {
                    Ok(BoolExpr::var(name))
                }
            }
            Some(tok @ Tok::Number(_)) | Some(tok @ Tok::CharLit(_)) => {
                Ok(BoolExpr::constant(literal_truth(&tok)))
            }
            Some(tok) => Err(ParseError::UnexpectedToken(tok.render())),
        }
    }
}

/// Parse a boolean expression.
pub fn parse(input: &str) -> Result<BoolExpr, ParseError> {
    let toks = lex(input)?;
    if toks.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { toks, pos: 0 };
    let expr = parser.expr()?;
    if parser.pos != parser.toks.len() {
        return Err(ParseError::TrailingInput(render_span(
            &parser.toks[parser.pos..],
        )));
    }
    Ok(expr)
}

impl std::str::FromStr for BoolExpr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<BoolExpr, ParseError> {
        parse(s)
    }
}
