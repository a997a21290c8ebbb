use std::iter::Peekable;

use crate::lexer::token::{Token, TokenKind};

use super::error::ParseError;
use super::node::{Ast, BinaryOp, Expr, Fold, Method, Mode, Node, Subscript, UNBOUNDED, UnaryOp};

/// Maximum nesting of parenthesized and bracketed sub-expressions.
pub const MAX_NESTING_DEPTH: u32 = 128;

pub struct Parser<'a> {
    tokens: Peekable<core::slice::Iter<'a, Token>>,
    eof: Token,
    depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: core::slice::Iter<'a, Token>) -> Self {
        let eof = tokens
            .as_slice()
            .last()
            .filter(|token| token.is_eof())
            .cloned()
            .unwrap_or(Token {
                range: Default::default(),
                kind: TokenKind::Eof,
            });

        Self {
            tokens: tokens.peekable(),
            eof,
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Ast, ParseError> {
        let mode = match self.peek() {
            Some(token) if token.is_word("strict") => {
                self.tokens.next();
                Mode::Strict
            }
            Some(token) if token.is_word("lax") => {
                self.tokens.next();
                Mode::Lax
            }
            _ => Mode::Lax,
        };

        let root = self.parse_expr_list()?;

        match self.tokens.next() {
            Some(token) if token.is_eof() => Ok(Ast { mode, root }),
            Some(token) => Err(ParseError::UnexpectedToken(token.clone())),
            None => Ok(Ast { mode, root }),
        }
    }

    #[inline(always)]
    fn peek(&mut self) -> Option<&'a Token> {
        self.tokens.peek().copied()
    }

    #[inline(always)]
    fn peek_kind(&mut self) -> Option<&'a TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    #[inline(always)]
    fn peek_second(&self) -> Option<&'a Token> {
        let mut ahead = self.tokens.clone();
        ahead.next();
        ahead.next()
    }

    /// The token the parser is looking at, for error reporting.
    fn current(&mut self) -> Token {
        self.peek().unwrap_or(&self.eof).clone()
    }

    fn next_token(&mut self) -> Result<&'a Token, ParseError> {
        match self.tokens.next_if(|token| !token.is_eof()) {
            Some(token) => Ok(token),
            None => Err(ParseError::UnexpectedEOFDetected(self.current())),
        }
    }

    fn expect(
        &mut self,
        expected: TokenKind,
        err: fn(Token) -> ParseError,
    ) -> Result<&'a Token, ParseError> {
        match self.tokens.next_if(|token| token.kind == expected) {
            Some(token) => Ok(token),
            None => Err(err(self.current())),
        }
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep(self.current()));
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// `expr (',' expr)*`, a sequence when there is more than one item.
    fn parse_expr_list(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_expr()?;

        if !matches!(self.peek_kind(), Some(TokenKind::Comma)) {
            return Ok(first);
        }

        let mut items = vec![first];
        while let Some(TokenKind::Comma) = self.peek_kind() {
            self.tokens.next();
            items.push(self.parse_expr()?);
        }

        Ok(Node::new(Expr::Sequence(items)))
    }

    #[inline(always)]
    fn parse_expr(&mut self) -> Result<Node, ParseError> {
        self.nested(|p| p.parse_binary(1))
    }

    #[inline(always)]
    fn binary_op(&self) -> Option<(BinaryOp, u8, usize)> {
        let mut ahead = self.tokens.clone();
        let token = ahead.next()?;
        let op = match &token.kind {
            TokenKind::Or => (BinaryOp::Or, 1, 1),
            TokenKind::And => (BinaryOp::And, 2, 1),
            TokenKind::EqEq => (BinaryOp::Equal, 3, 1),
            TokenKind::NeEq => (BinaryOp::NotEqual, 3, 1),
            TokenKind::Lt => (BinaryOp::Less, 3, 1),
            TokenKind::Lte => (BinaryOp::LessOrEqual, 3, 1),
            TokenKind::Gt => (BinaryOp::Greater, 3, 1),
            TokenKind::Gte => (BinaryOp::GreaterOrEqual, 3, 1),
            TokenKind::Ident(word) if word == "starts" => match ahead.next() {
                Some(token) if token.is_word("with") => (BinaryOp::StartsWith, 3, 2),
                _ => return None,
            },
            TokenKind::Plus => (BinaryOp::Add, 4, 1),
            TokenKind::Minus => (BinaryOp::Sub, 4, 1),
            TokenKind::Asterisk => (BinaryOp::Mul, 5, 1),
            TokenKind::Slash => (BinaryOp::Div, 5, 1),
            TokenKind::Percent => (BinaryOp::Mod, 5, 1),
            _ => return None,
        };

        Some(op)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Node, ParseError> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, precedence, width)) = self.binary_op() {
            if precedence < min_precedence {
                break;
            }

            for _ in 0..width {
                self.tokens.next();
            }

            let rhs = self.nested(|p| p.parse_binary(precedence + 1))?;
            lhs = Node::new(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Not) => UnaryOp::Not,
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Minus) => UnaryOp::Minus,
            Some(TokenKind::Ident(word))
                if word == "exists"
                    && matches!(self.peek_second(), Some(Token { kind: TokenKind::LParen, .. })) =>
            {
                self.tokens.next();
                self.tokens.next();
                let arg = self.nested(|p| p.parse_expr_list())?;
                self.expect(TokenKind::RParen, ParseError::ExpectedClosingParen)?;
                return Ok(Node::new(Expr::Unary(UnaryOp::Exists, Box::new(arg))));
            }
            _ => return self.parse_accessors(),
        };

        self.tokens.next();
        let arg = self.nested(|p| p.parse_unary())?;
        Ok(Node::new(Expr::Unary(op, Box::new(arg))))
    }

    /// A primary followed by any number of `.key`, `[...]` and `?(...)` steps.
    fn parse_accessors(&mut self) -> Result<Node, ParseError> {
        let mut head = self.parse_primary()?;
        let mut steps = Vec::new();

        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    self.tokens.next();
                    steps.push(self.parse_dot_accessor()?);
                }
                Some(TokenKind::LBracket) => {
                    self.tokens.next();
                    steps.push(self.parse_bracket_accessor()?);
                }
                Some(TokenKind::Question) => {
                    self.tokens.next();
                    self.expect(TokenKind::LParen, ParseError::UnexpectedToken)?;
                    let predicate = self.parse_expr()?;
                    self.expect(TokenKind::RParen, ParseError::ExpectedClosingParen)?;
                    steps.push(Node::new(Expr::Filter(Box::new(predicate))));
                }
                _ => break,
            }
        }

        if let Some(steps) = Node::chain(steps) {
            head.append(steps);
        }

        Ok(head)
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let token = self.next_token()?;

        let expr = match &token.kind {
            TokenKind::Dollar => Expr::Root,
            TokenKind::At => Expr::Current,
            TokenKind::Argument(index) => Expr::Argument(*index),
            TokenKind::Variable(name) => Expr::Variable(name.clone()),
            TokenKind::NullLiteral => Expr::Null,
            TokenKind::BoolLiteral(b) => Expr::Bool(*b),
            TokenKind::NumberLiteral(n) => Expr::Numeric(*n),
            TokenKind::StringLiteral(s) => Expr::String(s.clone()),
            TokenKind::Ident(word) if word == "last" => Expr::Last,
            TokenKind::LParen => return self.parse_paren(),
            TokenKind::LBracket => return self.parse_array_constructor(),
            TokenKind::LBrace => return self.parse_object_constructor(),
            _ => return Err(ParseError::UnexpectedToken(token.clone())),
        };

        Ok(Node::new(expr))
    }

    fn parse_paren(&mut self) -> Result<Node, ParseError> {
        let expr = self.nested(|p| p.parse_expr_list())?;
        self.expect(TokenKind::RParen, ParseError::ExpectedClosingParen)?;

        let is_unknown = matches!(self.peek(), Some(token) if token.is_word("is"))
            && matches!(self.peek_second(), Some(token) if token.is_word("unknown"));

        if is_unknown {
            self.tokens.next();
            self.tokens.next();
            return Ok(Node::new(Expr::Unary(UnaryOp::IsUnknown, Box::new(expr))));
        }

        Ok(expr)
    }

    fn parse_array_constructor(&mut self) -> Result<Node, ParseError> {
        let mut elements = Vec::new();

        if let Some(TokenKind::RBracket) = self.peek_kind() {
            self.tokens.next();
            return Ok(Node::new(Expr::Array(elements)));
        }

        loop {
            elements.push(self.parse_expr()?);

            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.tokens.next();
                }
                _ => {
                    self.expect(TokenKind::RBracket, ParseError::ExpectedClosingBracket)?;
                    return Ok(Node::new(Expr::Array(elements)));
                }
            }
        }
    }

    fn parse_object_constructor(&mut self) -> Result<Node, ParseError> {
        let mut fields = Vec::new();

        if let Some(TokenKind::RBrace) = self.peek_kind() {
            self.tokens.next();
            return Ok(Node::new(Expr::Object(fields)));
        }

        loop {
            let key = match (self.peek_kind(), self.peek_second()) {
                (Some(TokenKind::Ident(name)), Some(Token { kind: TokenKind::Colon, .. })) => {
                    self.tokens.next();
                    Node::new(Expr::String(name.to_string()))
                }
                _ => self.parse_expr()?,
            };
            self.expect(TokenKind::Colon, ParseError::ExpectedColon)?;
            let value = self.parse_expr()?;
            fields.push((key, value));

            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.tokens.next();
                }
                _ => {
                    self.expect(TokenKind::RBrace, ParseError::ExpectedClosingBrace)?;
                    return Ok(Node::new(Expr::Object(fields)));
                }
            }
        }
    }

    /// Everything that may follow a `.`: keys, wildcards and method calls.
    fn parse_dot_accessor(&mut self) -> Result<Node, ParseError> {
        let token = self.next_token()?;

        let expr = match &token.kind {
            TokenKind::Asterisk => Expr::AnyKey,
            TokenKind::DoubleAsterisk => {
                let (first, last) = self.parse_any_bounds()?;
                Expr::Any { first, last }
            }
            TokenKind::Ident(name) if matches!(self.peek_kind(), Some(TokenKind::LParen)) => {
                self.tokens.next();
                return self.parse_method(token, name);
            }
            TokenKind::Ident(name) => Expr::Key(name.to_string()),
            TokenKind::StringLiteral(s) => Expr::Key(s.clone()),
            TokenKind::BoolLiteral(b) => Expr::Key(b.to_string()),
            TokenKind::NullLiteral => Expr::Key("null".to_string()),
            _ => return Err(ParseError::UnexpectedToken(token.clone())),
        };

        Ok(Node::new(expr))
    }

    /// Arguments of `.name(`; the opening parenthesis has been consumed.
    fn parse_method(&mut self, token: &'a Token, name: &str) -> Result<Node, ParseError> {
        let expr = match name {
            "datetime" => {
                let template = match self.peek_kind() {
                    Some(TokenKind::RParen) => None,
                    _ => Some(Box::new(self.parse_expr()?)),
                };
                Expr::Datetime(template)
            }
            "map" => Expr::Map(Box::new(self.parse_expr()?)),
            "reduce" => Expr::Reduce(Box::new(self.parse_expr()?)),
            "fold" | "foldl" | "foldr" => {
                let kind = match name {
                    "foldl" => Fold::Left,
                    "foldr" => Fold::Right,
                    _ => Fold::Fold,
                };
                let func = self.parse_expr()?;
                self.expect(TokenKind::Comma, ParseError::UnexpectedToken)?;
                let seed = self.parse_expr()?;
                Expr::Fold(kind, Box::new(func), Box::new(seed))
            }
            _ => match Method::from_name(name) {
                Some(method) => Expr::Method(method),
                None => return Err(ParseError::UnknownMethod(token.clone())),
            },
        };

        self.expect(TokenKind::RParen, ParseError::ExpectedClosingParen)?;
        Ok(Node::new(expr))
    }

    /// Optional `{m}`, `{m,n}`, `{m to n}`, `{,n}` or `{m,}` after `**`.
    fn parse_any_bounds(&mut self) -> Result<(u32, u32), ParseError> {
        if !matches!(self.peek_kind(), Some(TokenKind::LBrace)) {
            return Ok((0, UNBOUNDED));
        }
        self.tokens.next();

        let first = self.parse_bound()?;
        let token = self.next_token()?;

        let bounds = match &token.kind {
            TokenKind::RBrace => match first {
                Some(level) => (level, level),
                None => return Err(ParseError::InvalidBound(token.clone())),
            },
            TokenKind::Comma => {
                let last = self.parse_bound()?;
                self.expect(TokenKind::RBrace, ParseError::ExpectedClosingBrace)?;
                (first.unwrap_or(0), last.unwrap_or(UNBOUNDED))
            }
            TokenKind::Ident(word) if word == "to" => {
                let last = self.parse_bound()?;
                self.expect(TokenKind::RBrace, ParseError::ExpectedClosingBrace)?;
                (first.unwrap_or(0), last.unwrap_or(UNBOUNDED))
            }
            _ => return Err(ParseError::ExpectedClosingBrace(token.clone())),
        };

        Ok(bounds)
    }

    fn parse_bound(&mut self) -> Result<Option<u32>, ParseError> {
        let Some(token) = self.peek() else {
            return Ok(None);
        };

        match &token.kind {
            TokenKind::NumberLiteral(n) => {
                self.tokens.next();
                n.is_int()
                    .then(|| n.to_i64())
                    .flatten()
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|n| *n != UNBOUNDED)
                    .map(Some)
                    .ok_or_else(|| ParseError::InvalidBound(token.clone()))
            }
            TokenKind::Ident(word) if word == "last" => {
                self.tokens.next();
                Ok(Some(UNBOUNDED))
            }
            _ => Ok(None),
        }
    }

    /// Everything between `[` and `]`: `*` or a list of subscripts.
    fn parse_bracket_accessor(&mut self) -> Result<Node, ParseError> {
        if matches!(self.peek_kind(), Some(TokenKind::Asterisk))
            && matches!(self.peek_second(), Some(Token { kind: TokenKind::RBracket, .. }))
        {
            self.tokens.next();
            self.tokens.next();
            return Ok(Node::new(Expr::AnyArray));
        }

        let mut subscripts = Vec::new();

        loop {
            let from = self.parse_expr()?;
            let to = match self.peek() {
                Some(token) if token.is_word("to") => {
                    self.tokens.next();
                    Some(self.parse_expr()?)
                }
                _ => None,
            };
            subscripts.push(Subscript { from, to });

            match self.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.tokens.next();
                }
                _ => {
                    self.expect(TokenKind::RBracket, ParseError::ExpectedClosingBracket)?;
                    return Ok(Node::new(Expr::Index(subscripts)));
                }
            }
        }
    }
}
