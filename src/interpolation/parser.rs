//! Expression lexer and parser
//!
//! Parses the expression inside `{{ ... }}` into an [`Expr`] tree. The
//! grammar is a small Jinja-flavoured subset:
//!
//! ```text
//! expr       := or ("if" or "else" expr)?
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := sum (cmp_op sum | "is" "not"? ident)*
//! sum        := product (("+" | "-" | "~") product)*
//! product    := unary (("*" | "/" | "//" | "%") unary)*
//! unary      := "-" unary | filtered
//! filtered   := postfix ("|" ident ("(" args ")")?)*
//! postfix    := primary ("." ident | "[" expr "]" | "(" args ")")*
//! ```

use crate::error::{Error, Result};
use crate::types::JsonValue;

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Pipe,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    FloorDiv,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Split an expression into tokens
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            let mut is_float = false;
            while i < chars.len() {
                if chars[i].is_ascii_digit() {
                    i += 1;
                } else if chars[i] == '.'
                    && !is_float
                    && chars.get(i + 1).is_some_and(char::is_ascii_digit)
                {
                    is_float = true;
                    i += 1;
                } else {
                    break;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let token = if is_float {
                Token::Float(
                    text.parse()
                        .map_err(|_| Error::template(format!("Invalid number '{text}'")))?,
                )
            } else {
                Token::Int(
                    text.parse()
                        .map_err(|_| Error::template(format!("Invalid number '{text}'")))?,
                )
            };
            tokens.push(token);
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(Error::template("Unterminated string literal")),
                    Some(&ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or_else(|| Error::template("Unterminated string literal"))?;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => *other,
                        });
                        i += 2;
                    }
                    Some(&ch) => {
                        value.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(value));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('/', Some('/')) => (Token::FloorDiv, 2),
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            ('.', _) => (Token::Dot, 1),
            ('|', _) => (Token::Pipe, 1),
            ('~', _) => (Token::Tilde, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            _ => {
                return Err(Error::template(format!(
                    "Unexpected character '{c}' in expression"
                )))
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

// ============================================================================
// Syntax tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(JsonValue),
    Var(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Filter(Box<Expr>, String, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Test {
        expr: Box<Expr>,
        name: String,
        negated: bool,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
}

/// Parse an expression
pub(crate) fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(Error::template("Empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if parser.pos < parser.tokens.len() {
        return Err(Error::template(format!(
            "Unexpected token {:?} in '{source}'",
            parser.tokens[parser.pos]
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(Error::template(format!(
                "Expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(Error::template(format!(
                "Expected identifier, found {other:?}"
            ))),
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        let then = self.or()?;
        if self.eat_keyword("if") {
            let condition = self.or()?;
            let otherwise = if self.eat_keyword("else") {
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise,
            });
        }
        Ok(then)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut left = self.sum()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinOp::Eq,
                Some(Token::Ne) => BinOp::Ne,
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                Some(Token::Ident(name)) if name == "in" => BinOp::In,
                Some(Token::Ident(name)) if name == "not" => {
                    // `not in` is the only binary use of `not`
                    if matches!(self.tokens.get(self.pos + 1), Some(Token::Ident(n)) if n == "in")
                    {
                        self.pos += 1;
                        BinOp::NotIn
                    } else {
                        break;
                    }
                }
                Some(Token::Ident(name)) if name == "is" => {
                    self.pos += 1;
                    let negated = self.eat_keyword("not");
                    let name = self.ident()?;
                    left = Expr::Test {
                        expr: Box::new(left),
                        name,
                        negated,
                    };
                    continue;
                }
                _ => break,
            };
            self.pos += 1;
            let right = self.sum()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn sum(&mut self) -> Result<Expr> {
        let mut left = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                Some(Token::Tilde) => BinOp::Concat,
                _ => break,
            };
            self.pos += 1;
            let right = self.product()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn product(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::FloorDiv) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.filtered()
    }

    fn filtered(&mut self) -> Result<Expr> {
        let mut expr = self.postfix()?;
        while self.eat(&Token::Pipe) {
            let name = self.ident()?;
            let args = if self.eat(&Token::LParen) {
                self.arguments()?
            } else {
                Vec::new()
            };
            expr = Expr::Filter(Box::new(expr), name, args);
        }
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    Some(Token::Int(index)) => index.to_string(),
                    other => {
                        return Err(Error::template(format!(
                            "Expected attribute name, found {other:?}"
                        )))
                    }
                };
                expr = Expr::Attr(Box::new(expr), name);
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek() == Some(&Token::LParen) {
                let Expr::Var(name) = expr else {
                    return Err(Error::template("Only named functions can be called"));
                };
                self.pos += 1;
                let args = self.arguments()?;
                expr = Expr::Call(name, args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parse a comma separated argument list; the opening paren is consumed
    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(JsonValue::from(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(JsonValue::from(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(JsonValue::String(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" | "True" => Expr::Literal(JsonValue::Bool(true)),
                "false" | "False" => Expr::Literal(JsonValue::Bool(false)),
                "none" | "None" | "null" => Expr::Literal(JsonValue::Null),
                _ => Expr::Var(name),
            }),
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(Token::LBrace) => {
                let mut entries = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = self.expression()?;
                        self.expect(&Token::Colon)?;
                        let value = self.expression()?;
                        entries.push((key, value));
                        if self.eat(&Token::RBrace) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::Dict(entries))
            }
            other => Err(Error::template(format!("Unexpected token {other:?}"))),
        }
    }
}
