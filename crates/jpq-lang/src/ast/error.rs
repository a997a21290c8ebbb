use thiserror::Error;

use crate::lexer::token::Token;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ParseError {
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(Token),
    #[error("Unexpected end of path")]
    UnexpectedEOFDetected(Token),
    #[error("Expected a closing parenthesis `)` but got `{0}`")]
    ExpectedClosingParen(Token),
    #[error("Expected a closing bracket `]` but got `{0}`")]
    ExpectedClosingBracket(Token),
    #[error("Expected a closing brace `}}` but got `{0}`")]
    ExpectedClosingBrace(Token),
    #[error("Expected `:` but got `{0}`")]
    ExpectedColon(Token),
    #[error("Unknown method `{0}`")]
    UnknownMethod(Token),
    #[error("Invalid depth bound `{0}`")]
    InvalidBound(Token),
    #[error("Path is nested too deeply")]
    NestingTooDeep(Token),
}

impl ParseError {
    #[cold]
    pub fn token(&self) -> &Token {
        match self {
            ParseError::UnexpectedToken(token)
            | ParseError::UnexpectedEOFDetected(token)
            | ParseError::ExpectedClosingParen(token)
            | ParseError::ExpectedClosingBracket(token)
            | ParseError::ExpectedClosingBrace(token)
            | ParseError::ExpectedColon(token)
            | ParseError::UnknownMethod(token)
            | ParseError::InvalidBound(token)
            | ParseError::NestingTooDeep(token) => token,
        }
    }
}
