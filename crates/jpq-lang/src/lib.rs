//! `jpq-lang` compiles SQL/JSON path expressions into a compact binary
//! program and evaluates them against JSON documents.
//!
//! ## Examples
//!
//! ```rust
//! use jpq_lang::{Engine, NoVars, Value, Wrapper};
//!
//! let engine = Engine::default();
//! let doc: Value = r#"{"a": [1, 2, 3]}"#.parse().unwrap();
//!
//! // Compile once, evaluate many times
//! let path = engine.compile("$.a[*] ? (@ > 1)").unwrap();
//! let values = engine.query_all(&path, &doc, &NoVars).unwrap();
//! assert_eq!(values, vec![Value::from(2), Value::from(3)]);
//!
//! // Lax mode unwraps arrays, strict mode does not
//! let lax = jpq_lang::compile("$.a.type()").unwrap();
//! assert_eq!(
//!     engine.query_first(&lax, &doc, &NoVars).unwrap(),
//!     Some(Value::from("array"))
//! );
//! let strict = jpq_lang::compile("strict $.b").unwrap();
//! assert!(engine.exists(&strict, &doc, &NoVars).is_err());
//!
//! // Results can be packed into a single array
//! let wrapped = jpq_lang::path_query(&path, &doc, Wrapper::Unconditional, &NoVars).unwrap();
//! assert_eq!(wrapped, Some("[2, 3]".parse().unwrap()));
//!
//! // Programs print back to path text and reload from bytes
//! assert_eq!(path.to_string(), "$.\"a\"[*]?(@ > 1)");
//! let loaded = jpq_lang::JsonPath::from_bytes(path.as_bytes()).unwrap();
//! assert_eq!(loaded, path);
//! ```
mod ast;
mod datetime;
mod engine;
mod error;
mod eval;
mod lexer;
mod number;
mod program;
mod range;
mod value;
mod variables;

pub use ast::error::ParseError;
pub use ast::parser::Parser as AstParser;
pub use ast::{
    Ast, BinaryOp, Expr as AstExpr, Fold, Method, Mode, Node as AstNode, Subscript, UNBOUNDED,
    UnaryOp,
};
pub use datetime::DateTime;
pub use engine::{Engine, Options, Wrapper};
pub use error::{Error, InnerError};
pub use eval::error::EvalError;
pub use eval::sequence::ValueSeq;
pub use eval::{Evaluator, Outcome, Truth};
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use number::Number;
pub use program::{
    DecodeError, EncodeError, Encoder, JsonPath, LAX_FLAG, Node as ProgramNode, NodeKind, VERSION,
};
pub use range::{Position, Range};
pub use value::{Object, Value, ValueError};
pub use variables::{NoVars, Variables, Vars, VarsFn};

pub type JpqResult<T> = Result<T, Error>;

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str) -> Result<Vec<Token>, Error> {
    lexer::tokenize(code).map_err(|e| Error::from_error(code, InnerError::Lexer(e)))
}

#[allow(clippy::result_large_err)]
pub fn parse(code: &str) -> Result<Ast, Error> {
    AstParser::new(tokenize(code)?.iter())
        .parse()
        .map_err(|e| Error::from_error(code, InnerError::Parse(e)))
}

/// Parses and encodes path text into a [`JsonPath`].
#[allow(clippy::result_large_err)]
pub fn compile(code: &str) -> Result<JsonPath, Error> {
    let path = JsonPath::encode(&parse(code)?)
        .map_err(|e| Error::from_error(code, InnerError::Encode(e)))?;

    tracing::debug!(mode = %path.mode(), size = path.as_bytes().len(), "compiled path");
    Ok(path)
}

/// Whether `path` yields any item from `doc`.
#[allow(clippy::result_large_err)]
pub fn path_exists(path: &JsonPath, doc: &Value, vars: &dyn Variables) -> JpqResult<bool> {
    Engine::default().exists(path, doc, vars)
}

/// The three-valued result of a predicate path.
#[allow(clippy::result_large_err)]
pub fn path_match(path: &JsonPath, doc: &Value, vars: &dyn Variables) -> JpqResult<Option<bool>> {
    Engine::default().matches(path, doc, vars)
}

#[allow(clippy::result_large_err)]
pub fn path_query(
    path: &JsonPath,
    doc: &Value,
    wrapper: Wrapper,
    vars: &dyn Variables,
) -> JpqResult<Option<Value>> {
    Engine::default().query_wrapped(path, doc, wrapper, vars)
}

#[allow(clippy::result_large_err)]
pub fn path_query_all(path: &JsonPath, doc: &Value, vars: &dyn Variables) -> JpqResult<Vec<Value>> {
    Engine::default().query_all(path, doc, vars)
}

#[allow(clippy::result_large_err)]
pub fn path_query_first(
    path: &JsonPath,
    doc: &Value,
    vars: &dyn Variables,
) -> JpqResult<Option<Value>> {
    Engine::default().query_first(path, doc, vars)
}

/// The single scalar `path` yields; JSON null is no value.
#[allow(clippy::result_large_err)]
pub fn path_value(path: &JsonPath, doc: &Value, vars: &dyn Variables) -> JpqResult<Option<Value>> {
    Engine::default().value(path, doc, vars)
}

/// Prints a program back to path text.
pub fn to_text(path: &JsonPath) -> String {
    path.to_string()
}
