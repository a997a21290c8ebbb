use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::{number::Number, range::Range};

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone)]
pub enum TokenKind {
    And,
    Argument(u32),
    Asterisk,
    At,
    BoolLiteral(bool),
    Colon,
    Comma,
    Dollar,
    Dot,
    DoubleAsterisk,
    Eof,
    EqEq,
    Gt,
    Gte,
    Ident(SmolStr),
    LBrace,
    LBracket,
    LParen,
    Lt,
    Lte,
    Minus,
    NeEq,
    Not,
    NullLiteral,
    NumberLiteral(Number),
    Or,
    Percent,
    Plus,
    Question,
    RBrace,
    RBracket,
    RParen,
    Slash,
    StringLiteral(String),
    Variable(SmolStr),
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns `true` if the token is the identifier `word`.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(ident) if ident == word)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::And => write!(f, "&&"),
            TokenKind::Argument(n) => write!(f, "@{}", n),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::At => write!(f, "@"),
            TokenKind::BoolLiteral(b) => write!(f, "{}", b),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dollar => write!(f, "$"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::DoubleAsterisk => write!(f, "**"),
            TokenKind::Eof => write!(f, ""),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Ident(ident) => write!(f, "{}", ident),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::LParen => write!(f, "("),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::NeEq => write!(f, "!="),
            TokenKind::Not => write!(f, "!"),
            TokenKind::NullLiteral => write!(f, "null"),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::Or => write!(f, "||"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::StringLiteral(s) => write!(f, "{:?}", s),
            TokenKind::Variable(name) => write!(f, "${}", name),
        }
    }
}
