use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::number::Number;

/// Upper bound of `.**{m,}`: recursive descent with no depth limit.
pub const UNBOUNDED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Mode {
    #[default]
    Lax,
    Strict,
}

impl Mode {
    pub fn is_lax(&self) -> bool {
        matches!(self, Mode::Lax)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Lax => write!(f, "lax"),
            Mode::Strict => write!(f, "strict"),
        }
    }
}

/// A parsed path: the evaluation mode and the root expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub mode: Mode,
    pub root: Node,
}

/// One step of a path chain. `next` continues the chain with the values this step produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub expr: Expr,
    pub next: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Numeric(Number),
    String(String),
    Variable(SmolStr),
    Root,
    Current,
    Last,
    /// `@1`/`@2` inside a fold or reduce function.
    Argument(u32),
    Key(String),
    AnyKey,
    AnyArray,
    Index(Vec<Subscript>),
    Any { first: u32, last: u32 },
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Unary(UnaryOp, Box<Node>),
    Filter(Box<Node>),
    Method(Method),
    Datetime(Option<Box<Node>>),
    Map(Box<Node>),
    Reduce(Box<Node>),
    Fold(Fold, Box<Node>, Box<Node>),
    Array(Vec<Node>),
    Object(Vec<(Node, Node)>),
    Sequence(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscript {
    pub from: Node,
    pub to: Option<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    IsUnknown,
    Exists,
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Type,
    Size,
    Abs,
    Floor,
    Ceiling,
    Double,
    KeyValue,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fold {
    Fold,
    Left,
    Right,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::Type,
        Method::Size,
        Method::Abs,
        Method::Floor,
        Method::Ceiling,
        Method::Double,
        Method::KeyValue,
        Method::Min,
        Method::Max,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::Type => "type",
            Method::Size => "size",
            Method::Abs => "abs",
            Method::Floor => "floor",
            Method::Ceiling => "ceiling",
            Method::Double => "double",
            Method::KeyValue => "keyvalue",
            Method::Min => "min",
            Method::Max => "max",
        }
    }

    pub fn from_name(name: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl Fold {
    pub fn name(&self) -> &'static str {
        match self {
            Fold::Fold => "fold",
            Fold::Left => "foldl",
            Fold::Right => "foldr",
        }
    }
}

impl Node {
    pub fn new(expr: Expr) -> Self {
        Node { expr, next: None }
    }

    /// Links `steps` into a chain, first step at the head.
    pub fn chain(steps: impl IntoIterator<Item = Node, IntoIter: DoubleEndedIterator>) -> Option<Node> {
        let mut steps = steps.into_iter().rev();
        let mut head = steps.next()?;
        for mut step in steps {
            step.next = Some(Box::new(head));
            head = step;
        }
        Some(head)
    }

    /// Appends `next` after the last step of this chain.
    pub fn append(&mut self, next: Node) {
        let mut tail = &mut self.next;
        while let Some(node) = tail {
            tail = &mut node.next;
        }
        *tail = Some(Box::new(next));
    }

    /// Iterates over this step and every step after it.
    pub fn steps(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(Some(self), |node| node.next.as_deref())
    }
}

// Chains can be long; unlink them iteratively instead of recursing through `Box` drops.
impl Drop for Node {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}
