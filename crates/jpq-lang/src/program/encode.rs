use crate::ast::{self, Expr};

use super::error::EncodeError;
use super::kind::NodeKind;
use super::{JsonPath, align4};

/// Maximum nesting of child nodes. Chains linked through `next` do not count.
pub const MAX_NESTING_DEPTH: u32 = 512;

/// Growable node region with reserve-then-patch offset slots.
#[derive(Debug, Default)]
pub(crate) struct Builder {
    body: Vec<u8>,
}

/// A reserved 4-byte slot in the node region.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot(usize);

impl Builder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn offset(&self) -> Result<u32, EncodeError> {
        u32::try_from(self.body.len()).map_err(|_| EncodeError::ProgramTooLarge)
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.body.push(value);
    }

    pub(crate) fn write_u32(&mut self, value: u32) {
        self.body.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Length-prefixed, NUL-terminated string.
    pub(crate) fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        let len = u32::try_from(s.len()).map_err(|_| EncodeError::ProgramTooLarge)?;
        self.write_u32(len);
        self.write_bytes(s.as_bytes());
        self.write_u8(0);
        Ok(())
    }

    pub(crate) fn align(&mut self) {
        self.body.resize(align4(self.body.len()), 0);
    }

    pub(crate) fn reserve(&mut self) -> Slot {
        let slot = Slot(self.body.len());
        self.write_u32(0);
        slot
    }

    pub(crate) fn reserve_many(&mut self, count: usize) -> Vec<Slot> {
        (0..count).map(|_| self.reserve()).collect()
    }

    pub(crate) fn patch(&mut self, slot: Slot, value: u32) {
        self.body[slot.0..slot.0 + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn freeze(self, mode: ast::Mode) -> JsonPath {
        JsonPath::from_body(mode, &self.body)
    }
}

/// Flags threaded through encoding to reject misplaced context items.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    allow_current: bool,
    inside_subscript: bool,
    inside_fold: bool,
}

impl Scope {
    fn filter(self) -> Self {
        Scope {
            allow_current: true,
            ..self
        }
    }

    fn subscript(self) -> Self {
        Scope {
            allow_current: true,
            inside_subscript: true,
            ..self
        }
    }

    fn function(self, binds_arguments: bool) -> Self {
        Scope {
            allow_current: true,
            inside_fold: self.inside_fold || binds_arguments,
            ..self
        }
    }
}

/// Flattens an AST into the node region of a [`JsonPath`].
pub struct Encoder {
    builder: Builder,
    depth: u32,
}

impl Encoder {
    pub fn encode(ast: &ast::Ast) -> Result<JsonPath, EncodeError> {
        let mut encoder = Encoder {
            builder: Builder::new(),
            depth: 0,
        };
        encoder.encode_chain(&ast.root, Scope::default())?;
        Ok(encoder.builder.freeze(ast.mode))
    }

    /// Encodes a node and everything linked after it, returning the head offset.
    fn encode_chain(&mut self, node: &ast::Node, scope: Scope) -> Result<u32, EncodeError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(EncodeError::NestingTooDeep);
        }

        self.depth += 1;
        let result = self.encode_steps(node, scope);
        self.depth -= 1;
        result
    }

    fn encode_steps(&mut self, node: &ast::Node, scope: Scope) -> Result<u32, EncodeError> {
        let (head, mut next_slot) = self.encode_node(node, scope)?;

        for step in node.steps().skip(1) {
            let (offset, slot) = self.encode_node(step, scope)?;
            if let Some(prev) = next_slot {
                self.builder.patch(prev, offset);
            }
            next_slot = slot;
        }

        Ok(head)
    }

    /// Writes one node. Returns its offset and the slot for its `next` link, if it has one.
    fn encode_node(
        &mut self,
        node: &ast::Node,
        scope: Scope,
    ) -> Result<(u32, Option<Slot>), EncodeError> {
        let offset = self.builder.offset()?;
        let kind = kind_of(&node.expr);

        self.builder.write_u8(kind as u8);
        self.builder.align();
        let next = self.builder.reserve();

        match &node.expr {
            Expr::Null | Expr::Root | Expr::AnyKey | Expr::AnyArray | Expr::Method(_) => {}
            Expr::Current if !scope.allow_current => return Err(EncodeError::CurrentNotAllowed),
            Expr::Current => {}
            Expr::Last if !scope.inside_subscript => return Err(EncodeError::LastNotAllowed),
            Expr::Last => {}
            Expr::Argument(index) => {
                if !scope.inside_fold || !(1..=2).contains(index) {
                    return Err(EncodeError::ArgumentNotAllowed(*index));
                }
                self.builder.write_u32(*index);
            }
            Expr::Bool(b) => self.builder.write_u8(u8::from(*b)),
            Expr::Numeric(n) => self.builder.write_bytes(&n.value().serialize()),
            Expr::String(s) | Expr::Key(s) => self.builder.write_str(s)?,
            Expr::Variable(name) => self.builder.write_str(name)?,
            Expr::Any { first, last } => {
                self.builder.write_u32(*first);
                self.builder.write_u32(*last);
            }
            Expr::Index(subscripts) => {
                self.builder.write_u32(count(subscripts.len())?);
                let slots = self.builder.reserve_many(subscripts.len() * 2);

                for (subscript, slots) in subscripts.iter().zip(slots.chunks(2)) {
                    let from = self.encode_chain(&subscript.from, scope.subscript())?;
                    self.builder.patch(slots[0], from);

                    if let Some(to) = &subscript.to {
                        let to = self.encode_chain(to, scope.subscript())?;
                        self.builder.patch(slots[1], to);
                    }
                }
            }
            Expr::Binary(_, left, right) => self.encode_args(left, right, scope, scope)?,
            Expr::Fold(_, func, seed) => self.encode_args(func, seed, scope.function(true), scope)?,
            Expr::Unary(_, arg) => self.encode_arg(arg, scope)?,
            Expr::Filter(arg) => self.encode_arg(arg, scope.filter())?,
            Expr::Map(func) => self.encode_arg(func, scope.function(false))?,
            Expr::Reduce(func) => self.encode_arg(func, scope.function(true))?,
            Expr::Datetime(None) => self.builder.write_u32(0),
            Expr::Datetime(Some(template)) => {
                if !matches!(template.expr, Expr::String(_)) || template.next.is_some() {
                    return Err(EncodeError::InvalidDatetimeTemplate);
                }
                self.encode_arg(template, scope)?;
            }
            Expr::Array(elements) | Expr::Sequence(elements) => {
                self.builder.write_u32(count(elements.len())?);
                let slots = self.builder.reserve_many(elements.len());

                for (element, slot) in elements.iter().zip(slots) {
                    let element = self.encode_chain(element, scope)?;
                    self.builder.patch(slot, element);
                }
            }
            Expr::Object(fields) => {
                self.builder.write_u32(count(fields.len())?);
                let slots = self.builder.reserve_many(fields.len() * 2);

                for ((key, value), slots) in fields.iter().zip(slots.chunks(2)) {
                    let key = self.encode_chain(key, scope)?;
                    self.builder.patch(slots[0], key);
                    let value = self.encode_chain(value, scope)?;
                    self.builder.patch(slots[1], value);
                }
            }
        }

        Ok((offset, node.next.is_some().then_some(next)))
    }

    fn encode_arg(&mut self, arg: &ast::Node, scope: Scope) -> Result<(), EncodeError> {
        let slot = self.builder.reserve();
        let arg = self.encode_chain(arg, scope)?;
        self.builder.patch(slot, arg);
        Ok(())
    }

    fn encode_args(
        &mut self,
        left: &ast::Node,
        right: &ast::Node,
        left_scope: Scope,
        right_scope: Scope,
    ) -> Result<(), EncodeError> {
        let left_slot = self.builder.reserve();
        let right_slot = self.builder.reserve();
        let left = self.encode_chain(left, left_scope)?;
        self.builder.patch(left_slot, left);
        let right = self.encode_chain(right, right_scope)?;
        self.builder.patch(right_slot, right);
        Ok(())
    }
}

fn count(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::ProgramTooLarge)
}

fn kind_of(expr: &Expr) -> NodeKind {
    match expr {
        Expr::Null => NodeKind::Null,
        Expr::Bool(_) => NodeKind::Bool,
        Expr::Numeric(_) => NodeKind::Numeric,
        Expr::String(_) => NodeKind::String,
        Expr::Variable(_) => NodeKind::Variable,
        Expr::Root => NodeKind::Root,
        Expr::Current => NodeKind::Current,
        Expr::Last => NodeKind::Last,
        Expr::Argument(_) => NodeKind::Argument,
        Expr::Key(_) => NodeKind::Key,
        Expr::AnyKey => NodeKind::AnyKey,
        Expr::AnyArray => NodeKind::AnyArray,
        Expr::Index(_) => NodeKind::Index,
        Expr::Any { .. } => NodeKind::Any,
        Expr::Binary(op, _, _) => NodeKind::from(*op),
        Expr::Unary(op, _) => NodeKind::from(*op),
        Expr::Filter(_) => NodeKind::Filter,
        Expr::Method(method) => NodeKind::from(*method),
        Expr::Datetime(_) => NodeKind::Datetime,
        Expr::Map(_) => NodeKind::Map,
        Expr::Reduce(_) => NodeKind::Reduce,
        Expr::Fold(fold, _, _) => NodeKind::from(*fold),
        Expr::Array(_) => NodeKind::Array,
        Expr::Object(_) => NodeKind::Object,
        Expr::Sequence(_) => NodeKind::Sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ast, BinaryOp, Mode, Node, UnaryOp};
    use crate::number::Number;
    use rstest::rstest;

    fn compile(input: &str) -> Result<JsonPath, EncodeError> {
        let tokens = crate::lexer::tokenize(input).unwrap();
        let ast = crate::ast::parser::Parser::new(tokens.iter()).parse().unwrap();
        Encoder::encode(&ast)
    }

    #[test]
    fn test_encode_layout() {
        let path = compile("$.a").unwrap();
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            // header: version 1 | lax
            0x01, 0x00, 0x00, 0x80,
            // $ at 0: tag, pad, next = 8
            NodeKind::Root as u8, 0, 0, 0, 8, 0, 0, 0,
            // .a at 8: tag, pad, next = 0, len = 1, "a", NUL
            NodeKind::Key as u8, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, b'a', 0,
        ];
        assert_eq!(path.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_encode_strict_header() {
        let path = compile("strict $").unwrap();
        assert_eq!(&path.as_bytes()[..4], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(path.mode(), Mode::Strict);
    }

    #[test]
    fn test_encode_binary_offsets() {
        let path = compile("1 + 2").unwrap();
        let root = path.root();
        assert_eq!(root.kind(), NodeKind::Add);
        assert!(root.left().offset() > root.offset());
        assert!(root.right().offset() > root.left().offset());
        assert_eq!(root.left().as_numeric(), Number::from(1));
        assert_eq!(root.right().as_numeric(), Number::from(2));
    }

    #[rstest]
    #[case::current_at_root("@", EncodeError::CurrentNotAllowed)]
    #[case::current_in_operand("$ + @", EncodeError::CurrentNotAllowed)]
    #[case::last_outside_subscript("last", EncodeError::LastNotAllowed)]
    #[case::last_after_subscript("$[0].map(last)", EncodeError::LastNotAllowed)]
    #[case::argument_at_root("@1", EncodeError::ArgumentNotAllowed(1))]
    #[case::argument_in_map("$.map(@1)", EncodeError::ArgumentNotAllowed(1))]
    #[case::argument_out_of_range("$.reduce(@3)", EncodeError::ArgumentNotAllowed(3))]
    #[case::datetime_template("$.datetime($)", EncodeError::InvalidDatetimeTemplate)]
    fn test_encode_error(#[case] input: &str, #[case] expected: EncodeError) {
        assert_eq!(compile(input), Err(expected));
    }

    #[rstest]
    #[case::filter("$ ? (@ > 1)")]
    #[case::subscript("$[@.size() - 1]")]
    #[case::last("$[last, 0 to last - 1]")]
    #[case::last_in_nested_filter("$[$ ? (@ == last)]")]
    #[case::map("$.map(@ + 1)")]
    #[case::fold("$.fold(@1 + @2 * @, 0)")]
    #[case::reduce_in_filter("$ ? (@.reduce(@1 + @2) > 1)")]
    fn test_encode_ok(#[case] input: &str) {
        assert!(compile(input).is_ok());
    }

    #[test]
    fn test_encode_nesting_too_deep() {
        let mut node = Node::new(Expr::Null);
        for _ in 0..MAX_NESTING_DEPTH {
            node = Node::new(Expr::Unary(UnaryOp::Not, Box::new(node)));
        }
        let ast = Ast {
            mode: Mode::Lax,
            root: node,
        };
        assert_eq!(Encoder::encode(&ast), Err(EncodeError::NestingTooDeep));
    }

    #[test]
    fn test_encode_long_chain() {
        let root = Node::chain(
            std::iter::once(Node::new(Expr::Root))
                .chain((0..10_000).map(|_| Node::new(Expr::Key("a".to_string()))))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let ast = Ast {
            mode: Mode::Lax,
            root: Node::new(Expr::Binary(
                BinaryOp::Equal,
                Box::new(root),
                Box::new(Node::new(Expr::Null)),
            )),
        };
        let path = Encoder::encode(&ast).unwrap();
        assert_eq!(path.root().left().steps().count(), 10_001);
    }
}
