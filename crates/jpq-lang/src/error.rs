use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{
    ast::error::ParseError,
    eval::error::EvalError,
    lexer::error::LexerError,
    program::error::{DecodeError, EncodeError},
    range::Range,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl InnerError {
    /// Source position of the failure, when the phase still has one.
    fn range(&self) -> Option<&Range> {
        match self {
            InnerError::Lexer(err) => Some(err.range()),
            InnerError::Parse(err) => Some(&err.token().range),
            InnerError::Encode(_) | InnerError::Decode(_) | InnerError::Eval(_) => None,
        }
    }

    /// Structural evaluation errors that `silent` mode swallows.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, InnerError::Eval(err) if err.is_recoverable())
    }
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The path text the error refers to.
    pub source_code: String,
    /// The location in the path text for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: impl Into<InnerError>) -> Self {
        let source_code = source_code.into();
        let cause = cause.into();

        let location = match cause.range() {
            Some(range) => {
                let start = SourceOffset::from_location(
                    &source_code,
                    range.start.line as usize,
                    range.start.column,
                )
                .offset();
                let end = SourceOffset::from_location(
                    &source_code,
                    range.end.line as usize,
                    range.end.column,
                )
                .offset();

                SourceSpan::new(start.into(), end.saturating_sub(start).max(1))
            }
            None => SourceSpan::new(0.into(), source_code.len()),
        };

        Self {
            cause,
            source_code,
            location,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.cause.is_recoverable()
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => {
                "LexerError::UnexpectedCharacter"
            }
            InnerError::Lexer(LexerError::UnterminatedString(_)) => "LexerError::UnterminatedString",
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => {
                "ParseError::UnexpectedEOFDetected"
            }
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                "ParseError::ExpectedClosingParen"
            }
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => {
                "ParseError::ExpectedClosingBracket"
            }
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => {
                "ParseError::ExpectedClosingBrace"
            }
            InnerError::Parse(ParseError::ExpectedColon(_)) => "ParseError::ExpectedColon",
            InnerError::Parse(ParseError::UnknownMethod(_)) => "ParseError::UnknownMethod",
            InnerError::Parse(ParseError::InvalidBound(_)) => "ParseError::InvalidBound",
            InnerError::Parse(ParseError::NestingTooDeep(_)) => "ParseError::NestingTooDeep",
            InnerError::Encode(err) => err.code(),
            InnerError::Decode(err) => err.code(),
            InnerError::Eval(err) => err.code(),
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Parse(ParseError::UnknownMethod(_)) => Some(
                "Available methods: type, size, abs, floor, ceiling, double, datetime, keyvalue, min, max, map, reduce, fold, foldl, foldr.",
            ),
            InnerError::Encode(EncodeError::CurrentNotAllowed) => {
                Some("Use `$` for the root item outside of filters.")
            }
            InnerError::Eval(EvalError::MemberNotFound(_)) => {
                Some("Strict mode requires every accessed key to exist. Use lax mode to skip missing members.")
            }
            InnerError::Eval(EvalError::MoreThanOneItem) => {
                Some("Wrap the results in an array to return several items.")
            }
            InnerError::Eval(EvalError::RecursionError(_)) => {
                Some("The path or the document is nested too deeply. Raise `max_depth` if this is expected.")
            }
            InnerError::Eval(EvalError::DivisionByZero) => Some("Division by zero is not allowed."),
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::{Token, TokenKind};
    use crate::range::Position;
    use rstest::rstest;

    fn range(start: usize, end: usize) -> Range {
        Range::new(Position::new(1, start), Position::new(1, end))
    }

    #[rstest]
    #[case::lexer(
        InnerError::Lexer(LexerError::UnexpectedCharacter('#', range(4, 5))),
        "LexerError::UnexpectedCharacter",
        SourceSpan::new(3.into(), 1)
    )]
    #[case::parse(
        InnerError::Parse(ParseError::UnexpectedToken(Token {
            range: range(3, 6),
            kind: TokenKind::Comma,
        })),
        "ParseError::UnexpectedToken",
        SourceSpan::new(2.into(), 3)
    )]
    #[case::encode(
        InnerError::Encode(EncodeError::CurrentNotAllowed),
        "EncodeError::CurrentNotAllowed",
        SourceSpan::new(0.into(), 7)
    )]
    #[case::eval(
        InnerError::Eval(EvalError::MemberNotFound("b".into())),
        "EvalError::MemberNotFound",
        SourceSpan::new(0.into(), 7)
    )]
    fn test_from_error(
        #[case] cause: InnerError,
        #[case] expected_code: &str,
        #[case] expected_location: SourceSpan,
    ) {
        let err = Error::from_error("$.a.b #", cause);

        assert_eq!(err.code().map(|c| c.to_string()), Some(expected_code.to_string()));
        assert_eq!(err.location, expected_location);
        assert_eq!(err.labels().map(|labels| labels.count()), Some(1));
    }

    #[rstest]
    #[case::structural(InnerError::Eval(EvalError::ArrayRequired), true)]
    #[case::fatal(InnerError::Eval(EvalError::DivisionByZero), false)]
    #[case::parse(InnerError::Parse(ParseError::UnexpectedToken(Token {
        range: Range::default(),
        kind: TokenKind::Comma,
    })), false)]
    fn test_is_recoverable(#[case] cause: InnerError, #[case] expected: bool) {
        assert_eq!(Error::from_error("$", cause).is_recoverable(), expected);
    }

    #[test]
    fn test_display() {
        let err = Error::from_error("$.a", EvalError::MemberNotFound("a".into()));
        assert_eq!(err.to_string(), "SQL/JSON member not found \"a\"");
    }
}
