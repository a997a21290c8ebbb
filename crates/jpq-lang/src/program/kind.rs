use crate::ast::{BinaryOp, Fold, Method, UnaryOp};

/// Tag byte of an encoded node.
///
/// Discriminants are part of the wire format; new kinds go at the end.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Null = 0,
    Bool,
    Numeric,
    String,
    Variable,
    Root,
    Current,
    Last,
    Argument,
    Key,
    AnyKey,
    AnyArray,
    Index,
    Any,
    And,
    Or,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    StartsWith,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Not,
    IsUnknown,
    Exists,
    Plus,
    Minus,
    Filter,
    Type,
    Size,
    Abs,
    Floor,
    Ceiling,
    Double,
    KeyValue,
    Min,
    Max,
    Datetime,
    Map,
    Reduce,
    Fold,
    FoldLeft,
    FoldRight,
    Array,
    Object,
    Sequence,
}

/// Shape of the payload that follows a node's `next` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Bool,
    Str,
    Numeric,
    /// One child offset; `0` only for `datetime` without a template.
    Arg,
    /// Two child offsets.
    Args,
    Subscripts,
    Bounds,
    Elements,
    Fields,
    Argument,
}

impl NodeKind {
    pub const ALL: [NodeKind; 52] = [
        NodeKind::Null,
        NodeKind::Bool,
        NodeKind::Numeric,
        NodeKind::String,
        NodeKind::Variable,
        NodeKind::Root,
        NodeKind::Current,
        NodeKind::Last,
        NodeKind::Argument,
        NodeKind::Key,
        NodeKind::AnyKey,
        NodeKind::AnyArray,
        NodeKind::Index,
        NodeKind::Any,
        NodeKind::And,
        NodeKind::Or,
        NodeKind::Equal,
        NodeKind::NotEqual,
        NodeKind::Less,
        NodeKind::Greater,
        NodeKind::LessOrEqual,
        NodeKind::GreaterOrEqual,
        NodeKind::StartsWith,
        NodeKind::Add,
        NodeKind::Sub,
        NodeKind::Mul,
        NodeKind::Div,
        NodeKind::Mod,
        NodeKind::Not,
        NodeKind::IsUnknown,
        NodeKind::Exists,
        NodeKind::Plus,
        NodeKind::Minus,
        NodeKind::Filter,
        NodeKind::Type,
        NodeKind::Size,
        NodeKind::Abs,
        NodeKind::Floor,
        NodeKind::Ceiling,
        NodeKind::Double,
        NodeKind::KeyValue,
        NodeKind::Min,
        NodeKind::Max,
        NodeKind::Datetime,
        NodeKind::Map,
        NodeKind::Reduce,
        NodeKind::Fold,
        NodeKind::FoldLeft,
        NodeKind::FoldRight,
        NodeKind::Array,
        NodeKind::Object,
        NodeKind::Sequence,
    ];

    pub fn payload(&self) -> Payload {
        match self {
            NodeKind::Null
            | NodeKind::Root
            | NodeKind::Current
            | NodeKind::Last
            | NodeKind::AnyKey
            | NodeKind::AnyArray
            | NodeKind::Type
            | NodeKind::Size
            | NodeKind::Abs
            | NodeKind::Floor
            | NodeKind::Ceiling
            | NodeKind::Double
            | NodeKind::KeyValue
            | NodeKind::Min
            | NodeKind::Max => Payload::Empty,
            NodeKind::Bool => Payload::Bool,
            NodeKind::String | NodeKind::Variable | NodeKind::Key => Payload::Str,
            NodeKind::Numeric => Payload::Numeric,
            NodeKind::Not
            | NodeKind::IsUnknown
            | NodeKind::Exists
            | NodeKind::Plus
            | NodeKind::Minus
            | NodeKind::Filter
            | NodeKind::Datetime
            | NodeKind::Map
            | NodeKind::Reduce => Payload::Arg,
            NodeKind::And
            | NodeKind::Or
            | NodeKind::Equal
            | NodeKind::NotEqual
            | NodeKind::Less
            | NodeKind::Greater
            | NodeKind::LessOrEqual
            | NodeKind::GreaterOrEqual
            | NodeKind::StartsWith
            | NodeKind::Add
            | NodeKind::Sub
            | NodeKind::Mul
            | NodeKind::Div
            | NodeKind::Mod
            | NodeKind::Fold
            | NodeKind::FoldLeft
            | NodeKind::FoldRight => Payload::Args,
            NodeKind::Index => Payload::Subscripts,
            NodeKind::Any => Payload::Bounds,
            NodeKind::Array | NodeKind::Sequence => Payload::Elements,
            NodeKind::Object => Payload::Fields,
            NodeKind::Argument => Payload::Argument,
        }
    }

    /// Kinds that lax mode applies to each element of an array input.
    pub fn unwraps_in_lax(&self) -> bool {
        matches!(
            self,
            NodeKind::Key
                | NodeKind::AnyKey
                | NodeKind::Filter
                | NodeKind::Abs
                | NodeKind::Floor
                | NodeKind::Ceiling
                | NodeKind::Double
                | NodeKind::Datetime
                | NodeKind::KeyValue
        )
    }

    /// Kinds evaluated as predicates rather than value producers.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            NodeKind::And
                | NodeKind::Or
                | NodeKind::Not
                | NodeKind::IsUnknown
                | NodeKind::Exists
                | NodeKind::Equal
                | NodeKind::NotEqual
                | NodeKind::Less
                | NodeKind::Greater
                | NodeKind::LessOrEqual
                | NodeKind::GreaterOrEqual
                | NodeKind::StartsWith
        )
    }

    pub fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self {
            NodeKind::And => BinaryOp::And,
            NodeKind::Or => BinaryOp::Or,
            NodeKind::Equal => BinaryOp::Equal,
            NodeKind::NotEqual => BinaryOp::NotEqual,
            NodeKind::Less => BinaryOp::Less,
            NodeKind::Greater => BinaryOp::Greater,
            NodeKind::LessOrEqual => BinaryOp::LessOrEqual,
            NodeKind::GreaterOrEqual => BinaryOp::GreaterOrEqual,
            NodeKind::StartsWith => BinaryOp::StartsWith,
            NodeKind::Add => BinaryOp::Add,
            NodeKind::Sub => BinaryOp::Sub,
            NodeKind::Mul => BinaryOp::Mul,
            NodeKind::Div => BinaryOp::Div,
            NodeKind::Mod => BinaryOp::Mod,
            _ => return None,
        };

        Some(op)
    }

    pub fn unary_op(&self) -> Option<UnaryOp> {
        let op = match self {
            NodeKind::Not => UnaryOp::Not,
            NodeKind::IsUnknown => UnaryOp::IsUnknown,
            NodeKind::Exists => UnaryOp::Exists,
            NodeKind::Plus => UnaryOp::Plus,
            NodeKind::Minus => UnaryOp::Minus,
            _ => return None,
        };

        Some(op)
    }

    pub fn method(&self) -> Option<Method> {
        let method = match self {
            NodeKind::Type => Method::Type,
            NodeKind::Size => Method::Size,
            NodeKind::Abs => Method::Abs,
            NodeKind::Floor => Method::Floor,
            NodeKind::Ceiling => Method::Ceiling,
            NodeKind::Double => Method::Double,
            NodeKind::KeyValue => Method::KeyValue,
            NodeKind::Min => Method::Min,
            NodeKind::Max => Method::Max,
            _ => return None,
        };

        Some(method)
    }

    pub fn fold(&self) -> Option<Fold> {
        match self {
            NodeKind::Fold => Some(Fold::Fold),
            NodeKind::FoldLeft => Some(Fold::Left),
            NodeKind::FoldRight => Some(Fold::Right),
            _ => None,
        }
    }
}

impl From<BinaryOp> for NodeKind {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::And => NodeKind::And,
            BinaryOp::Or => NodeKind::Or,
            BinaryOp::Equal => NodeKind::Equal,
            BinaryOp::NotEqual => NodeKind::NotEqual,
            BinaryOp::Less => NodeKind::Less,
            BinaryOp::Greater => NodeKind::Greater,
            BinaryOp::LessOrEqual => NodeKind::LessOrEqual,
            BinaryOp::GreaterOrEqual => NodeKind::GreaterOrEqual,
            BinaryOp::StartsWith => NodeKind::StartsWith,
            BinaryOp::Add => NodeKind::Add,
            BinaryOp::Sub => NodeKind::Sub,
            BinaryOp::Mul => NodeKind::Mul,
            BinaryOp::Div => NodeKind::Div,
            BinaryOp::Mod => NodeKind::Mod,
        }
    }
}

impl From<UnaryOp> for NodeKind {
    fn from(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Not => NodeKind::Not,
            UnaryOp::IsUnknown => NodeKind::IsUnknown,
            UnaryOp::Exists => NodeKind::Exists,
            UnaryOp::Plus => NodeKind::Plus,
            UnaryOp::Minus => NodeKind::Minus,
        }
    }
}

impl From<Method> for NodeKind {
    fn from(method: Method) -> Self {
        match method {
            Method::Type => NodeKind::Type,
            Method::Size => NodeKind::Size,
            Method::Abs => NodeKind::Abs,
            Method::Floor => NodeKind::Floor,
            Method::Ceiling => NodeKind::Ceiling,
            Method::Double => NodeKind::Double,
            Method::KeyValue => NodeKind::KeyValue,
            Method::Min => NodeKind::Min,
            Method::Max => NodeKind::Max,
        }
    }
}

impl From<Fold> for NodeKind {
    fn from(fold: Fold) -> Self {
        match fold {
            Fold::Fold => NodeKind::Fold,
            Fold::Left => NodeKind::FoldLeft,
            Fold::Right => NodeKind::FoldRight,
        }
    }
}

impl TryFrom<u8> for NodeKind {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        NodeKind::ALL.get(tag as usize).copied().ok_or(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_tags_match_table() {
        for (i, kind) in NodeKind::ALL.iter().enumerate() {
            assert_eq!(*kind as u8 as usize, i);
            assert_eq!(NodeKind::try_from(i as u8), Ok(*kind));
        }
    }

    #[rstest]
    #[case(52)]
    #[case(255)]
    fn test_unknown_tag(#[case] tag: u8) {
        assert_eq!(NodeKind::try_from(tag), Err(tag));
    }

    #[test]
    fn test_ast_conversions() {
        for method in Method::ALL {
            assert_eq!(NodeKind::from(method).method(), Some(method));
        }
        for fold in [Fold::Fold, Fold::Left, Fold::Right] {
            assert_eq!(NodeKind::from(fold).fold(), Some(fold));
        }
        assert_eq!(NodeKind::from(BinaryOp::Mod).binary_op(), Some(BinaryOp::Mod));
        assert_eq!(NodeKind::from(UnaryOp::Exists).unary_op(), Some(UnaryOp::Exists));
        assert_eq!(NodeKind::Key.binary_op(), None);
    }

    #[rstest]
    #[case(NodeKind::Key, true)]
    #[case(NodeKind::KeyValue, true)]
    #[case(NodeKind::Index, false)]
    #[case(NodeKind::AnyArray, false)]
    #[case(NodeKind::Type, false)]
    fn test_unwraps_in_lax(#[case] kind: NodeKind, #[case] expected: bool) {
        assert_eq!(kind.unwraps_in_lax(), expected);
    }
}
