pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while_m_n},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of, one_of},
    combinator::{map, map_opt, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::position;
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::number::Number;
use crate::range::{Position, Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

/// Splits path text into tokens, terminated by a single [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    match tokens(Span::new(input)) {
        Ok((span, mut tokens)) => match span.fragment().chars().next() {
            None => {
                tokens.push(Token {
                    range: span.into(),
                    kind: TokenKind::Eof,
                });
                Ok(tokens)
            }
            Some('"') => Err(LexerError::UnterminatedString(span.into())),
            Some(c) => {
                let start: Position = span.into();
                let end = Position::new(start.line, start.column + 1);
                Err(LexerError::UnexpectedCharacter(c, Range::new(start, end)))
            }
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let start: Position = e.input.into();
            let c = e.input.fragment().chars().next().unwrap_or_default();
            Err(LexerError::UnexpectedCharacter(c, Range::new(start, start)))
        }
        // complete parsers only; treat as a truncated string
        Err(nom::Err::Incomplete(_)) => Err(LexerError::UnterminatedString(Span::new(input).into())),
    }
}

fn unicode(input: Span) -> IResult<Span, char> {
    map_opt(
        map_res(
            preceded(
                char('u'),
                alt((
                    delimited(
                        char('{'),
                        take_while_m_n(1, 6, |c: char| c.is_ascii_hexdigit()),
                        char('}'),
                    ),
                    take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
                )),
            ),
            |span: Span| u32::from_str_radix(span.fragment(), 16),
        ),
        char::from_u32,
    )
    .parse(input)
}

define_token_parser!(double_asterisk, "**", TokenKind::DoubleAsterisk);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(ne_eq_sql, "<>", TokenKind::NeEq);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(and, "&&", TokenKind::And);
define_token_parser!(or, "||", TokenKind::Or);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(not, "!", TokenKind::Not);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(question, "?", TokenKind::Question);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(dollar, "$", TokenKind::Dollar);
define_token_parser!(at, "@", TokenKind::At);

fn operators(input: Span) -> IResult<Span, Token> {
    alt((
        double_asterisk,
        eq_eq,
        ne_eq,
        lte,
        ne_eq_sql,
        gte,
        and,
        or,
        asterisk,
        lt,
        gt,
        not,
        plus,
        minus,
        slash,
        percent,
    ))
    .parse(input)
}

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        l_paren, r_paren, l_bracket, r_bracket, l_brace, r_brace, comma, colon, question, dot,
    ))
    .parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize((
            digit1,
            opt(pair(char('.'), digit1)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        |span: Span| {
            span.fragment().parse::<Number>().map(|n| Token {
                range: span.into(),
                kind: TokenKind::NumberLiteral(n),
            })
        },
    )
    .parse(input)
}

fn quoted_string(input: Span) -> IResult<Span, String> {
    alt((
        value(String::new(), tag("\"\"")),
        delimited(
            char('"'),
            escaped_transform(
                none_of("\"\\"),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('\"', char('\"')),
                    value('/', char('/')),
                    value('\u{08}', char('b')),
                    value('\u{0c}', char('f')),
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                    unicode,
                )),
            ),
            char('"'),
        ),
    ))
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, s) = quoted_string(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::StringLiteral(s),
        },
    ))
}

fn literals(input: Span) -> IResult<Span, Token> {
    alt((number_literal, string_literal)).parse(input)
}

fn ident_text(input: Span) -> IResult<Span, Span> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(ident_text, |span: Span| {
        let kind = match *span.fragment() {
            "true" => TokenKind::BoolLiteral(true),
            "false" => TokenKind::BoolLiteral(false),
            "null" => TokenKind::NullLiteral,
            ident => TokenKind::Ident(SmolStr::new(ident)),
        };
        Token {
            range: span.into(),
            kind,
        }
    })
    .parse(input)
}

fn variable(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, name) = preceded(
        char('$'),
        alt((
            map(ident_text, |span: Span| SmolStr::new(span.fragment())),
            map(quoted_string, SmolStr::from),
        )),
    )
    .parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::Variable(name),
        },
    ))
}

fn argument(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, index) = preceded(
        char('@'),
        map_res(digit1, |span: Span| span.fragment().parse::<u32>()),
    )
    .parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::Argument(index),
        },
    ))
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((
        operators,
        punctuations,
        variable,
        dollar,
        argument,
        at,
        literals,
        ident,
    ))
    .parse(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    preceded(multispace0, many0(terminated(token, multispace0))).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Ident(SmolStr::new(s))
    }

    #[rstest]
    #[case::root_key("$.a", vec![TokenKind::Dollar, TokenKind::Dot, ident("a"), TokenKind::Eof])]
    #[case::quoted_key(
        "$.\"a b\"",
        vec![TokenKind::Dollar, TokenKind::Dot, TokenKind::StringLiteral("a b".to_string()), TokenKind::Eof]
    )]
    #[case::wildcards(
        "$[*].**",
        vec![
            TokenKind::Dollar,
            TokenKind::LBracket,
            TokenKind::Asterisk,
            TokenKind::RBracket,
            TokenKind::Dot,
            TokenKind::DoubleAsterisk,
            TokenKind::Eof,
        ]
    )]
    #[case::variables(
        "$x + $\"y z\"",
        vec![
            TokenKind::Variable("x".into()),
            TokenKind::Plus,
            TokenKind::Variable("y z".into()),
            TokenKind::Eof,
        ]
    )]
    #[case::arguments(
        "@1 * @",
        vec![TokenKind::Argument(1), TokenKind::Asterisk, TokenKind::At, TokenKind::Eof]
    )]
    #[case::comparisons(
        "== != <> < <= > >= && || !",
        vec![
            TokenKind::EqEq,
            TokenKind::NeEq,
            TokenKind::NeEq,
            TokenKind::Lt,
            TokenKind::Lte,
            TokenKind::Gt,
            TokenKind::Gte,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Not,
            TokenKind::Eof,
        ]
    )]
    #[case::literals(
        "1.5e2 true null \"\"",
        vec![
            TokenKind::NumberLiteral("150".parse().unwrap()),
            TokenKind::BoolLiteral(true),
            TokenKind::NullLiteral,
            TokenKind::StringLiteral(String::new()),
            TokenKind::Eof,
        ]
    )]
    #[case::method_after_number(
        "1.type()",
        vec![
            TokenKind::NumberLiteral("1".parse().unwrap()),
            TokenKind::Dot,
            ident("type"),
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    )]
    #[case::escapes(
        r#""a\"\\\nA\u{1F600}""#,
        vec![TokenKind::StringLiteral("a\"\\\nA\u{1F600}".to_string()), TokenKind::Eof]
    )]
    #[case::whitespace_only("  ", vec![TokenKind::Eof])]
    fn test_tokenize(#[case] input: &str, #[case] expected: Vec<TokenKind>) {
        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn test_token_ranges() {
        let tokens = tokenize(" $.abc").unwrap();
        assert_eq!(
            tokens[0].range,
            Range::new(Position::new(1, 2), Position::new(1, 3))
        );
        assert_eq!(
            tokens[2].range,
            Range::new(Position::new(1, 4), Position::new(1, 7))
        );
    }

    #[rstest]
    #[case::unexpected_character(
        "$.a # b",
        Err(LexerError::UnexpectedCharacter('#', Range::new(Position::new(1, 5), Position::new(1, 6))))
    )]
    #[case::unterminated_string(
        "$.\"abc",
        Err(LexerError::UnterminatedString(Range::new(Position::new(1, 3), Position::new(1, 7))))
    )]
    fn test_tokenize_error(#[case] input: &str, #[case] expected: Result<Vec<Token>, LexerError>) {
        assert_eq!(tokenize(input), expected);
    }
}
