use crate::ast::*;
use crate::lexer::Token;

/// Deepest `parse_expr` recursion accepted before reporting K-P006.
pub const MAX_NESTING: usize = 10_000;

/// Remaining stack below which recursive passes switch to a fresh segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each extra stack segment.
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    depth: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("Parse error at token {position}: {message}")]
pub struct ParseError {
    pub code: &'static str,
    pub position: usize,
    pub span: Span,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

/// Binding power of operators, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn infix_precedence(token: &Token) -> Precedence {
    match token {
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Less | Token::Greater => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Star | Token::Slash | Token::Percent => Precedence::Product,
        Token::LParen => Precedence::Call,
        Token::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

fn infix_op(token: &Token) -> Option<InfixOp> {
    Some(match token {
        Token::Plus => InfixOp::Add,
        Token::Minus => InfixOp::Subtract,
        Token::Star => InfixOp::Multiply,
        Token::Slash => InfixOp::Divide,
        Token::Percent => InfixOp::Modulo,
        Token::Eq => InfixOp::Equals,
        Token::NotEq => InfixOp::NotEquals,
        Token::Less => InfixOp::LessThan,
        Token::Greater => InfixOp::GreaterThan,
        _ => return None,
    })
}

impl Parser {
    pub fn new(tokens: Vec<(Token, Span)>) -> Self {
        Parser { tokens, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| self.eof_span())
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            return Span::UNKNOWN;
        }
        self.tokens
            .get(self.pos - 1)
            .map(|(_, s)| *s)
            .unwrap_or(Span::UNKNOWN)
    }

    fn eof_span(&self) -> Span {
        let end = self.tokens.last().map(|(_, s)| s.end).unwrap_or(0);
        Span { start: end, end }
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span> {
        match self.peek() {
            Some(tok) if tok == expected => {
                let span = self.peek_span();
                self.advance();
                Ok(span)
            }
            Some(tok) => Err(self.error("K-P003", format!("expected {}, got {}", expected, tok))),
            None => Err(self.error("K-P004", format!("expected {}, got end of input", expected))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(name)
            }
            Some(tok) => Err(self.error("K-P005", format!("expected identifier, got {}", tok))),
            None => Err(self.error("K-P005", "expected identifier, got end of input".into())),
        }
    }

    fn error(&self, code: &'static str, message: String) -> ParseError {
        ParseError {
            code,
            position: self.pos,
            span: self.peek_span(),
            message,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    // ---- Top-level parsing ----

    pub fn parse_program(&mut self) -> (Program, Vec<ParseError>) {
        let mut statements = Vec::new();
        let mut errors: Vec<ParseError> = Vec::new();
        const MAX_ERRORS: usize = 20;

        while !self.at_end() {
            if errors.len() >= MAX_ERRORS {
                break;
            }
            match self.parse_stmt() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    errors.push(e);
                    self.sync_to_stmt_boundary();
                }
            }
        }

        (Program { statements, source: None }, errors)
    }

    /// Skip past the next `;` at nesting depth zero (or to EOF) so one bad
    /// statement does not hide errors in the ones after it.
    fn sync_to_stmt_boundary(&mut self) {
        let mut depth: usize = 0;
        while let Some(tok) = self.advance() {
            match tok {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
                Token::Semi if depth == 0 => break,
                _ => {}
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let start = self.peek_span();
        if self.eat(&Token::Let) {
            let name = self.expect_ident()?;
            self.expect(&Token::Assign)?;
            let value = self.parse_expr(Precedence::Lowest)?;
            let span = self.finish_stmt(start);
            Ok(Stmt::Let { name, value, span })
        } else {
            let expr = self.parse_expr(Precedence::Lowest)?;
            let span = self.finish_stmt(start);
            Ok(Stmt::Expr { expr, span })
        }
    }

    /// Span from `start` through the last consumed token; eats an optional `;`.
    fn finish_stmt(&mut self, start: Span) -> Span {
        let span = start.merge(self.prev_span());
        self.eat(&Token::Semi);
        span
    }

    /// `{ stmt* }`
    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.peek(), None | Some(Token::RBrace)) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(stmts)
    }

    // ---- Expressions ----

    fn parse_expr(&mut self, precedence: Precedence) -> Result<Expr> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(
                "K-P006",
                format!("expression nested more than {MAX_NESTING} levels deep"),
            ));
        }
        self.depth += 1;
        let expr = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.parse_expr_inner(precedence)
        });
        self.depth -= 1;
        expr
    }

    fn parse_expr_inner(&mut self, precedence: Precedence) -> Result<Expr> {
        let mut left = self.parse_prefix()?;

        while let Some(tok) = self.peek().cloned() {
            if precedence >= infix_precedence(&tok) {
                break;
            }
            left = match tok {
                Token::LParen => self.parse_call(left)?,
                Token::LBracket => self.parse_index(left)?,
                _ => match infix_op(&tok) {
                    Some(op) => self.parse_infix(op, left)?,
                    None => break,
                },
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let tok = match self.peek().cloned() {
            Some(tok) => tok,
            None => return Err(self.error("K-P002", "expected expression, got end of input".into())),
        };

        match tok {
            Token::Int(n) => {
                self.advance();
                Ok(Expr::Integer(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Boolean(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Boolean(false))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Token::Bang | Token::Minus => {
                self.advance();
                let op = if tok == Token::Bang { PrefixOp::Not } else { PrefixOp::Negate };
                let right = self.parse_expr(Precedence::Prefix)?;
                Ok(Expr::Prefix { op, right: Box::new(right) })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr(Precedence::Lowest)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.advance();
                let items = self.parse_expr_list(&Token::RBracket)?;
                Ok(Expr::Array(items))
            }
            Token::If => self.parse_if(),
            other => Err(self.error("K-P001", format!("expected expression, got {}", other))),
        }
    }

    fn parse_infix(&mut self, op: InfixOp, left: Expr) -> Result<Expr> {
        let precedence = self.peek().map(infix_precedence).unwrap_or(Precedence::Lowest);
        self.advance();
        let right = self.parse_expr(precedence)?;
        Ok(Expr::Infix {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_call(&mut self, function: Expr) -> Result<Expr> {
        self.expect(&Token::LParen)?;
        let args = self.parse_expr_list(&Token::RParen)?;
        Ok(Expr::Call {
            function: Box::new(function),
            args,
        })
    }

    fn parse_index(&mut self, left: Expr) -> Result<Expr> {
        self.expect(&Token::LBracket)?;
        let index = self.parse_expr(Precedence::Lowest)?;
        self.expect(&Token::RBracket)?;
        Ok(Expr::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    /// Comma-separated expressions up to and including `end`. The opening
    /// delimiter has already been consumed.
    fn parse_expr_list(&mut self, end: &Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.eat(end) {
            return Ok(items);
        }
        items.push(self.parse_expr(Precedence::Lowest)?);
        while self.eat(&Token::Comma) {
            items.push(self.parse_expr(Precedence::Lowest)?);
        }
        self.expect(end)?;
        Ok(items)
    }

    /// `if (cond) { ... }` with optional `else { ... }`
    fn parse_if(&mut self) -> Result<Expr> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr(Precedence::Lowest)?;
        self.expect(&Token::RParen)?;
        let consequence = self.parse_block()?;
        let alternative = if self.eat(&Token::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }
}

/// Parse a token stream. Always returns a program; errors are collected
/// alongside whatever statements parsed cleanly.
pub fn parse(tokens: Vec<(Token, Span)>) -> (Program, Vec<ParseError>) {
    Parser::new(tokens).parse_program()
}
