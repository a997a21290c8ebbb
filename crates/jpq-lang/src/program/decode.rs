use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::ast::{self, BinaryOp, Expr, Fold, Method, Subscript, UnaryOp};

use super::encode::MAX_NESTING_DEPTH;
use super::error::DecodeError;
use super::kind::{NodeKind, Payload};
use super::node::Node;
use super::{HEADER_SIZE, NUMERIC_SIZE, align4, read_u32};

const MAX_DECIMAL_SCALE: u8 = 28;

/// Checks that `body` is a well-formed node region.
///
/// Every reachable node is visited once: tags are known, payloads are in
/// bounds, strings are UTF-8 and every child offset points forward.
pub(crate) fn validate(body: &[u8]) -> Result<(), DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::Truncated(HEADER_SIZE));
    }

    let mut seen = FxHashSet::default();
    let mut pending: Vec<(u32, u32)> = vec![(0, 0)];

    while let Some((offset, depth)) = pending.pop() {
        if depth > MAX_NESTING_DEPTH {
            return Err(DecodeError::NestingTooDeep);
        }

        if !seen.insert(offset) {
            return Err(DecodeError::SharedNode(offset));
        }

        validate_node(body, offset, depth, &mut pending)?;
    }

    Ok(())
}

fn validate_node(
    body: &[u8],
    offset: u32,
    depth: u32,
    pending: &mut Vec<(u32, u32)>,
) -> Result<(), DecodeError> {
    let start = offset as usize;
    let tag = *body.get(start).ok_or(DecodeError::Truncated(start))?;
    let kind = NodeKind::try_from(tag).map_err(|tag| DecodeError::UnknownTag { offset, tag })?;

    let next_pos = align4(start + 1);
    let next = read_u32(body, next_pos).ok_or(DecodeError::Truncated(next_pos))?;
    if next != 0 {
        push(body, offset, next, depth, pending)?;
    }

    let payload = next_pos + 4;
    let u32_at = |i: usize| {
        let pos = payload + i * 4;
        read_u32(body, pos).ok_or(DecodeError::Truncated(pos))
    };

    match kind.payload() {
        Payload::Empty => {}
        Payload::Bool => match body.get(payload) {
            Some(0 | 1) => {}
            Some(_) => return Err(DecodeError::InvalidPayload(offset)),
            None => return Err(DecodeError::Truncated(payload)),
        },
        Payload::Str => {
            let len = u32_at(0)? as usize;
            let start = payload + 4;
            let bytes = body
                .get(start..start + len)
                .ok_or(DecodeError::Truncated(start))?;
            std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(offset))?;
            if body.get(start + len) != Some(&0) {
                return Err(DecodeError::MissingTerminator(offset));
            }
        }
        Payload::Numeric => {
            let bytes = body
                .get(payload..payload + NUMERIC_SIZE)
                .ok_or(DecodeError::Truncated(payload))?;
            // flags word: scale in byte 2, sign in the top bit of byte 3
            if bytes[0] != 0 || bytes[1] != 0 || bytes[2] > MAX_DECIMAL_SCALE || bytes[3] & 0x7f != 0 {
                return Err(DecodeError::InvalidNumeric(offset));
            }
        }
        Payload::Arg => {
            let arg = u32_at(0)?;
            match (kind, arg) {
                (NodeKind::Datetime, 0) => {}
                (NodeKind::Datetime, template) => {
                    if body.get(template as usize) != Some(&(NodeKind::String as u8)) {
                        return Err(DecodeError::InvalidPayload(offset));
                    }
                    push(body, offset, template, depth + 1, pending)?;
                }
                (_, arg) => push(body, offset, arg, depth + 1, pending)?,
            }
        }
        Payload::Args => {
            push(body, offset, u32_at(0)?, depth + 1, pending)?;
            push(body, offset, u32_at(1)?, depth + 1, pending)?;
        }
        Payload::Subscripts => {
            let count = u32_at(0)? as usize;
            for i in 0..count {
                push(body, offset, u32_at(1 + i * 2)?, depth + 1, pending)?;
                match u32_at(2 + i * 2)? {
                    0 => {}
                    to => push(body, offset, to, depth + 1, pending)?,
                }
            }
        }
        Payload::Bounds => {
            u32_at(1)?;
        }
        Payload::Elements => {
            let count = u32_at(0)? as usize;
            for i in 0..count {
                push(body, offset, u32_at(1 + i)?, depth + 1, pending)?;
            }
        }
        Payload::Fields => {
            let count = u32_at(0)? as usize;
            for i in 0..count * 2 {
                push(body, offset, u32_at(1 + i)?, depth + 1, pending)?;
            }
        }
        Payload::Argument => {
            if !(1..=2).contains(&u32_at(0)?) {
                return Err(DecodeError::InvalidPayload(offset));
            }
        }
    }

    Ok(())
}

fn push(
    body: &[u8],
    offset: u32,
    target: u32,
    depth: u32,
    pending: &mut Vec<(u32, u32)>,
) -> Result<(), DecodeError> {
    if target <= offset || target as usize >= body.len() {
        return Err(DecodeError::InvalidOffset { offset, target });
    }

    pending.push((target, depth));
    Ok(())
}

/// Rebuilds the AST chain starting at `node`.
pub(crate) fn to_ast(node: Node<'_>) -> ast::Node {
    let steps: Vec<_> = node.steps().map(|step| ast::Node::new(to_expr(step))).collect();
    ast::Node::chain(steps).unwrap_or_else(|| ast::Node::new(Expr::Null))
}

fn boxed(node: Node<'_>) -> Box<ast::Node> {
    Box::new(to_ast(node))
}

fn binary(op: BinaryOp, node: Node<'_>) -> Expr {
    Expr::Binary(op, boxed(node.left()), boxed(node.right()))
}

fn unary(op: UnaryOp, node: Node<'_>) -> Expr {
    Expr::Unary(op, boxed(node.arg()))
}

fn fold(fold: Fold, node: Node<'_>) -> Expr {
    Expr::Fold(fold, boxed(node.left()), boxed(node.right()))
}

fn to_expr(node: Node<'_>) -> Expr {
    match node.kind() {
        NodeKind::Null => Expr::Null,
        NodeKind::Bool => Expr::Bool(node.as_bool()),
        NodeKind::Numeric => Expr::Numeric(node.as_numeric()),
        NodeKind::String => Expr::String(node.as_str().to_string()),
        NodeKind::Variable => Expr::Variable(SmolStr::new(node.as_str())),
        NodeKind::Root => Expr::Root,
        NodeKind::Current => Expr::Current,
        NodeKind::Last => Expr::Last,
        NodeKind::Argument => Expr::Argument(node.argument_index()),
        NodeKind::Key => Expr::Key(node.as_str().to_string()),
        NodeKind::AnyKey => Expr::AnyKey,
        NodeKind::AnyArray => Expr::AnyArray,
        NodeKind::Index => Expr::Index(
            node.subscripts()
                .map(|(from, to)| Subscript {
                    from: to_ast(from),
                    to: to.map(to_ast),
                })
                .collect(),
        ),
        NodeKind::Any => {
            let (first, last) = node.bounds();
            Expr::Any { first, last }
        }
        NodeKind::And => binary(BinaryOp::And, node),
        NodeKind::Or => binary(BinaryOp::Or, node),
        NodeKind::Equal => binary(BinaryOp::Equal, node),
        NodeKind::NotEqual => binary(BinaryOp::NotEqual, node),
        NodeKind::Less => binary(BinaryOp::Less, node),
        NodeKind::Greater => binary(BinaryOp::Greater, node),
        NodeKind::LessOrEqual => binary(BinaryOp::LessOrEqual, node),
        NodeKind::GreaterOrEqual => binary(BinaryOp::GreaterOrEqual, node),
        NodeKind::StartsWith => binary(BinaryOp::StartsWith, node),
        NodeKind::Add => binary(BinaryOp::Add, node),
        NodeKind::Sub => binary(BinaryOp::Sub, node),
        NodeKind::Mul => binary(BinaryOp::Mul, node),
        NodeKind::Div => binary(BinaryOp::Div, node),
        NodeKind::Mod => binary(BinaryOp::Mod, node),
        NodeKind::Not => unary(UnaryOp::Not, node),
        NodeKind::IsUnknown => unary(UnaryOp::IsUnknown, node),
        NodeKind::Exists => unary(UnaryOp::Exists, node),
        NodeKind::Plus => unary(UnaryOp::Plus, node),
        NodeKind::Minus => unary(UnaryOp::Minus, node),
        NodeKind::Filter => Expr::Filter(boxed(node.arg())),
        NodeKind::Type => Expr::Method(Method::Type),
        NodeKind::Size => Expr::Method(Method::Size),
        NodeKind::Abs => Expr::Method(Method::Abs),
        NodeKind::Floor => Expr::Method(Method::Floor),
        NodeKind::Ceiling => Expr::Method(Method::Ceiling),
        NodeKind::Double => Expr::Method(Method::Double),
        NodeKind::KeyValue => Expr::Method(Method::KeyValue),
        NodeKind::Min => Expr::Method(Method::Min),
        NodeKind::Max => Expr::Method(Method::Max),
        NodeKind::Datetime => Expr::Datetime(node.template().map(boxed)),
        NodeKind::Map => Expr::Map(boxed(node.arg())),
        NodeKind::Reduce => Expr::Reduce(boxed(node.arg())),
        NodeKind::Fold => fold(Fold::Fold, node),
        NodeKind::FoldLeft => fold(Fold::Left, node),
        NodeKind::FoldRight => fold(Fold::Right, node),
        NodeKind::Array => Expr::Array(node.elements().map(to_ast).collect()),
        NodeKind::Object => Expr::Object(
            node.fields()
                .map(|(key, value)| (to_ast(key), to_ast(value)))
                .collect(),
        ),
        NodeKind::Sequence => Expr::Sequence(node.elements().map(to_ast).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::JsonPath;
    use rstest::rstest;

    fn body(path: &JsonPath) -> Vec<u8> {
        path.as_bytes()[HEADER_SIZE..].to_vec()
    }

    fn with_header(body: &[u8]) -> Vec<u8> {
        let mut bytes = JsonPath::from_body(ast::Mode::Lax, &[]).as_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[rstest]
    #[case("$.a.b[*] ? (@.c > 1 && !(@.d == \"x\")).e")]
    #[case("strict $.**{1 to 2}.keyvalue().size()")]
    #[case("$[0, last - 1 to last].datetime(\"yyyy-mm-dd\")")]
    #[case("$.fold(@1 + @2, 0), $.map(@ * 2), [1, {a: $x}]")]
    #[case("(($.a) is unknown) || exists ($.b)")]
    #[case("-$.a.abs().floor().ceiling().double().min().max().type()")]
    fn test_to_ast_round_trip(#[case] input: &str) {
        let tokens = crate::lexer::tokenize(input).unwrap();
        let ast = crate::ast::parser::Parser::new(tokens.iter()).parse().unwrap();
        let path = JsonPath::encode(&ast).unwrap();
        assert_eq!(path.to_ast(), ast);
    }

    #[test]
    fn test_validate_unknown_tag() {
        let path: JsonPath = "$.a".parse().unwrap();
        let mut body = body(&path);
        body[8] = 200;
        assert_eq!(
            JsonPath::from_bytes(&with_header(&body)),
            Err(DecodeError::UnknownTag { offset: 8, tag: 200 })
        );
    }

    #[test]
    fn test_validate_backward_offset() {
        let path: JsonPath = "$.a".parse().unwrap();
        let mut body = body(&path);
        // point the key's next slot back at the root's next slot
        body[12..16].copy_from_slice(&4u32.to_le_bytes());
        assert_eq!(
            JsonPath::from_bytes(&with_header(&body)),
            Err(DecodeError::InvalidOffset { offset: 8, target: 4 })
        );
    }

    #[test]
    fn test_validate_truncated() {
        let path: JsonPath = "$.abc".parse().unwrap();
        let body = body(&path);
        let result = JsonPath::from_bytes(&with_header(&body[..body.len() - 2]));
        assert!(matches!(result, Err(DecodeError::Truncated(_))), "{:?}", result);
    }

    #[test]
    fn test_validate_missing_terminator() {
        let path: JsonPath = "$.a".parse().unwrap();
        let mut body = body(&path);
        let last = body.len() - 1;
        body[last] = b'x';
        assert_eq!(
            JsonPath::from_bytes(&with_header(&body)),
            Err(DecodeError::MissingTerminator(8))
        );
    }

    #[test]
    fn test_validate_invalid_utf8() {
        let path: JsonPath = "$.a".parse().unwrap();
        let mut body = body(&path);
        let last = body.len() - 2;
        body[last] = 0xff;
        assert_eq!(
            JsonPath::from_bytes(&with_header(&body)),
            Err(DecodeError::InvalidUtf8(8))
        );
    }

    #[test]
    fn test_validate_invalid_numeric() {
        let path: JsonPath = "1".parse().unwrap();
        let mut body = body(&path);
        // scale byte of the decimal flags
        body[10] = 29;
        assert_eq!(
            JsonPath::from_bytes(&with_header(&body)),
            Err(DecodeError::InvalidNumeric(0))
        );
    }

    #[test]
    fn test_validate_empty_body() {
        assert_eq!(
            JsonPath::from_bytes(&with_header(&[])),
            Err(DecodeError::Truncated(HEADER_SIZE))
        );
    }
}
