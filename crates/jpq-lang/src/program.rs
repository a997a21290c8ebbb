//! The compiled form of a path: a header word followed by a flat node region.
//!
//! ```text
//! header  u32 LE   VERSION | LAX_FLAG
//! node    u8       tag (NodeKind)
//!         0..3     zero padding to a 4-byte boundary of the node region
//!         u32 LE   next step offset, 0 if none
//!         ...      kind-specific payload
//! ```
//!
//! Every offset is relative to the start of the node region. The root node
//! is always at offset 0 and every child lives after its parent.
pub mod decode;
pub mod encode;
pub mod error;
pub mod kind;
pub mod node;
pub mod printer;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::ast::{self, Mode};
use crate::error::Error;

pub use encode::Encoder;
pub use error::{DecodeError, EncodeError};
pub use kind::NodeKind;
pub use node::Node;

pub const VERSION: u32 = 1;
pub const LAX_FLAG: u32 = 0x8000_0000;

pub(crate) const HEADER_SIZE: usize = 4;
pub(crate) const NUMERIC_SIZE: usize = 16;

#[inline(always)]
pub(crate) fn align4(pos: usize) -> usize {
    (pos + 3) & !3
}

#[inline(always)]
pub(crate) fn read_u32(bytes: &[u8], pos: usize) -> Option<u32> {
    let b = bytes.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// An immutable, validated path program.
///
/// Cheap to evaluate many times and safe to share between threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    bytes: Box<[u8]>,
}

impl JsonPath {
    pub(crate) fn from_body(mode: Mode, body: &[u8]) -> Self {
        let header = match mode {
            Mode::Lax => VERSION | LAX_FLAG,
            Mode::Strict => VERSION,
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
        bytes.extend_from_slice(&header.to_le_bytes());
        bytes.extend_from_slice(body);

        JsonPath {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Compiles an AST.
    pub fn encode(ast: &ast::Ast) -> Result<Self, EncodeError> {
        Encoder::encode(ast)
    }

    /// Loads an encoded program, checking every node before accepting it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = read_u32(bytes, 0).ok_or(DecodeError::Truncated(0))?;
        if header & !LAX_FLAG != VERSION {
            return Err(DecodeError::UnsupportedVersion(header & !LAX_FLAG));
        }

        decode::validate(&bytes[HEADER_SIZE..])?;

        Ok(JsonPath {
            bytes: bytes.into(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mode(&self) -> Mode {
        match read_u32(&self.bytes, 0) {
            Some(header) if header & LAX_FLAG != 0 => Mode::Lax,
            _ => Mode::Strict,
        }
    }

    pub fn is_lax(&self) -> bool {
        self.mode().is_lax()
    }

    pub fn root(&self) -> Node<'_> {
        Node::read(self.body(), 0)
    }

    /// Rebuilds the AST this program was encoded from.
    pub fn to_ast(&self) -> ast::Ast {
        ast::Ast {
            mode: self.mode(),
            root: decode::to_ast(self.root()),
        }
    }

    pub(crate) fn body(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }
}

impl FromStr for JsonPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::compile(s)
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        printer::print(self, f)
    }
}
