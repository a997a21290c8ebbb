pub mod error;
pub mod node;
pub mod parser;

pub use node::{Ast, BinaryOp, Expr, Fold, Method, Mode, Node, Subscript, UNBOUNDED, UnaryOp};
