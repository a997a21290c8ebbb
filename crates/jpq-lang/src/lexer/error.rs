use thiserror::Error;

use crate::range::Range;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum LexerError {
    #[error("Unexpected character `{0}`")]
    UnexpectedCharacter(char, Range),
    #[error("Unterminated string literal")]
    UnterminatedString(Range),
}

impl LexerError {
    #[cold]
    pub fn range(&self) -> &Range {
        match self {
            LexerError::UnexpectedCharacter(_, range) => range,
            LexerError::UnterminatedString(range) => range,
        }
    }
}
