use crate::number::Number;

use super::kind::NodeKind;
use super::{NUMERIC_SIZE, align4, read_u32};

/// A view of one encoded node. Borrows the program; copying it is free.
///
/// Accessors assert the node kind. Calling one on the wrong kind is a bug in
/// the caller, never a property of user input, because programs are
/// validated when they are built or loaded.
#[derive(Debug, Clone, Copy)]
pub struct Node<'p> {
    body: &'p [u8],
    offset: u32,
    kind: NodeKind,
    next: u32,
    payload: usize,
}

impl<'p> Node<'p> {
    pub(crate) fn read(body: &'p [u8], offset: u32) -> Node<'p> {
        let start = offset as usize;
        let kind = body
            .get(start)
            .and_then(|tag| NodeKind::try_from(*tag).ok())
            .unwrap_or(NodeKind::Null);
        let next_pos = align4(start + 1);

        Node {
            body,
            offset,
            kind,
            next: read_u32(body, next_pos).unwrap_or(0),
            payload: next_pos + 4,
        }
    }

    #[inline(always)]
    fn u32_at(&self, index: usize) -> u32 {
        read_u32(self.body, self.payload + index * 4).unwrap_or(0)
    }

    #[inline(always)]
    fn child(&self, offset: u32) -> Node<'p> {
        Node::read(self.body, offset)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn has_next(&self) -> bool {
        self.next != 0
    }

    pub fn next(&self) -> Option<Node<'p>> {
        self.has_next().then(|| self.child(self.next))
    }

    /// This node followed by every step linked after it.
    pub fn steps(&self) -> impl Iterator<Item = Node<'p>> + use<'p> {
        std::iter::successors(Some(*self), |node| node.next())
    }

    pub fn left(&self) -> Node<'p> {
        assert!(self.kind.binary_op().is_some() || self.kind.fold().is_some());
        self.child(self.u32_at(0))
    }

    pub fn right(&self) -> Node<'p> {
        assert!(self.kind.binary_op().is_some() || self.kind.fold().is_some());
        self.child(self.u32_at(1))
    }

    /// The single argument of unary operators, filters, `map` and `reduce`.
    pub fn arg(&self) -> Node<'p> {
        assert!(matches!(
            self.kind,
            NodeKind::Not
                | NodeKind::IsUnknown
                | NodeKind::Exists
                | NodeKind::Plus
                | NodeKind::Minus
                | NodeKind::Filter
                | NodeKind::Map
                | NodeKind::Reduce
        ));
        self.child(self.u32_at(0))
    }

    /// The template string of `.datetime(...)`.
    pub fn template(&self) -> Option<Node<'p>> {
        assert_eq!(self.kind, NodeKind::Datetime);
        match self.u32_at(0) {
            0 => None,
            offset => Some(self.child(offset)),
        }
    }

    pub fn as_bool(&self) -> bool {
        assert_eq!(self.kind, NodeKind::Bool);
        self.body.get(self.payload).is_some_and(|b| *b != 0)
    }

    pub fn as_numeric(&self) -> Number {
        assert_eq!(self.kind, NodeKind::Numeric);
        let mut bytes = [0u8; NUMERIC_SIZE];
        if let Some(src) = self.body.get(self.payload..self.payload + NUMERIC_SIZE) {
            bytes.copy_from_slice(src);
        }
        Number::new(rust_decimal::Decimal::deserialize(bytes))
    }

    /// The text of a string literal, key or variable name.
    pub fn as_str(&self) -> &'p str {
        assert!(matches!(
            self.kind,
            NodeKind::String | NodeKind::Key | NodeKind::Variable
        ));
        let len = self.u32_at(0) as usize;
        let start = self.payload + 4;
        self.body
            .get(start..start + len)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .unwrap_or_default()
    }

    pub fn argument_index(&self) -> u32 {
        assert_eq!(self.kind, NodeKind::Argument);
        self.u32_at(0)
    }

    /// `(first, last)` levels of `.**{first to last}`.
    pub fn bounds(&self) -> (u32, u32) {
        assert_eq!(self.kind, NodeKind::Any);
        (self.u32_at(0), self.u32_at(1))
    }

    /// Number of subscripts, elements or fields.
    pub fn len(&self) -> usize {
        assert!(matches!(
            self.kind,
            NodeKind::Index | NodeKind::Array | NodeKind::Sequence | NodeKind::Object
        ));
        self.u32_at(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `from` expression and optional `to` expression of the `i`-th subscript.
    pub fn subscript(&self, i: usize) -> (Node<'p>, Option<Node<'p>>) {
        assert_eq!(self.kind, NodeKind::Index);
        let from = self.child(self.u32_at(1 + i * 2));
        let to = match self.u32_at(2 + i * 2) {
            0 => None,
            offset => Some(self.child(offset)),
        };
        (from, to)
    }

    pub fn element(&self, i: usize) -> Node<'p> {
        assert!(matches!(self.kind, NodeKind::Array | NodeKind::Sequence));
        self.child(self.u32_at(1 + i))
    }

    pub fn field(&self, i: usize) -> (Node<'p>, Node<'p>) {
        assert_eq!(self.kind, NodeKind::Object);
        (
            self.child(self.u32_at(1 + i * 2)),
            self.child(self.u32_at(2 + i * 2)),
        )
    }

    pub fn subscripts(&self) -> impl Iterator<Item = (Node<'p>, Option<Node<'p>>)> + use<'p> {
        let node = *self;
        (0..node.len()).map(move |i| node.subscript(i))
    }

    pub fn elements(&self) -> impl DoubleEndedIterator<Item = Node<'p>> + use<'p> {
        let node = *self;
        (0..node.len()).map(move |i| node.element(i))
    }

    pub fn fields(&self) -> impl Iterator<Item = (Node<'p>, Node<'p>)> + use<'p> {
        let node = *self;
        (0..node.len()).map(move |i| node.field(i))
    }
}

#[cfg(test)]
mod tests {
    use crate::program::{JsonPath, NodeKind};
    use crate::number::Number;
    use rstest::rstest;

    fn compile(input: &str) -> JsonPath {
        input.parse().unwrap()
    }

    #[test]
    fn test_read_chain() {
        let path = compile("$.a[*].\"b\"");
        let kinds: Vec<_> = path.root().steps().map(|node| node.kind()).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Root, NodeKind::Key, NodeKind::AnyArray, NodeKind::Key]
        );
        let keys: Vec<_> = path
            .root()
            .steps()
            .filter(|node| node.kind() == NodeKind::Key)
            .map(|node| node.as_str())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_read_subscripts() {
        let path = compile("$[1, 2 to last]");
        let index = path.root().next().unwrap();
        assert_eq!(index.len(), 2);

        let (from, to) = index.subscript(0);
        assert_eq!(from.as_numeric(), Number::from(1));
        assert!(to.is_none());

        let (from, to) = index.subscript(1);
        assert_eq!(from.as_numeric(), Number::from(2));
        assert_eq!(to.map(|node| node.kind()), Some(NodeKind::Last));
    }

    #[rstest]
    #[case("$.**", (0, u32::MAX))]
    #[case("$.**{2}", (2, 2))]
    #[case("$.**{1 to 3}", (1, 3))]
    fn test_read_bounds(#[case] input: &str, #[case] expected: (u32, u32)) {
        let path = compile(input);
        assert_eq!(path.root().next().unwrap().bounds(), expected);
    }

    #[test]
    fn test_read_constructors() {
        let path = compile("{\"a\": true, b: [null, 1.50]}");
        let object = path.root();
        let fields: Vec<_> = object
            .fields()
            .map(|(key, value)| (key.as_str(), value.kind()))
            .collect();
        assert_eq!(fields, vec![("a", NodeKind::Bool), ("b", NodeKind::Array)]);

        let (_, array) = object.field(1);
        assert_eq!(array.element(0).kind(), NodeKind::Null);
        assert_eq!(array.element(1).as_numeric().to_string(), "1.50");
        assert!(object.field(0).1.as_bool());
    }

    #[test]
    fn test_read_datetime_template() {
        let path = compile("$.datetime(\"HH24:MI\").type()");
        let datetime = path.root().next().unwrap();
        assert_eq!(datetime.template().map(|t| t.as_str()), Some("HH24:MI"));
        assert_eq!(datetime.next().map(|n| n.kind()), Some(NodeKind::Type));

        let path = compile("$.datetime()");
        assert!(path.root().next().unwrap().template().is_none());
    }

    #[test]
    #[should_panic]
    fn test_accessor_kind_mismatch() {
        let path = compile("$");
        path.root().as_str();
    }
}
