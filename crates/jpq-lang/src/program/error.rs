use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EncodeError {
    #[error("@ is not allowed in root expressions")]
    CurrentNotAllowed,
    #[error("LAST is allowed only in array subscripts")]
    LastNotAllowed,
    #[error("@{0} is allowed only in reduce and fold functions")]
    ArgumentNotAllowed(u32),
    #[error("Datetime template must be a string literal")]
    InvalidDatetimeTemplate,
    #[error("Path is nested too deeply")]
    NestingTooDeep,
    #[error("Encoded path exceeds the maximum program size")]
    ProgramTooLarge,
}

impl EncodeError {
    #[cold]
    pub fn code(&self) -> &'static str {
        match self {
            EncodeError::CurrentNotAllowed => "EncodeError::CurrentNotAllowed",
            EncodeError::LastNotAllowed => "EncodeError::LastNotAllowed",
            EncodeError::ArgumentNotAllowed(_) => "EncodeError::ArgumentNotAllowed",
            EncodeError::InvalidDatetimeTemplate => "EncodeError::InvalidDatetimeTemplate",
            EncodeError::NestingTooDeep => "EncodeError::NestingTooDeep",
            EncodeError::ProgramTooLarge => "EncodeError::ProgramTooLarge",
        }
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum DecodeError {
    #[error("Program is truncated at offset {0}")]
    Truncated(usize),
    #[error("Unsupported program version {0}")]
    UnsupportedVersion(u32),
    #[error("Unknown node tag {tag} at offset {offset}")]
    UnknownTag { offset: u32, tag: u8 },
    #[error("Invalid child offset {target} in node at offset {offset}")]
    InvalidOffset { offset: u32, target: u32 },
    #[error("Node at offset {0} is referenced more than once")]
    SharedNode(u32),
    #[error("Invalid UTF-8 string in node at offset {0}")]
    InvalidUtf8(u32),
    #[error("Missing string terminator in node at offset {0}")]
    MissingTerminator(u32),
    #[error("Invalid numeric in node at offset {0}")]
    InvalidNumeric(u32),
    #[error("Invalid payload in node at offset {0}")]
    InvalidPayload(u32),
    #[error("Program is nested too deeply")]
    NestingTooDeep,
}

impl DecodeError {
    #[cold]
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::Truncated(_) => "DecodeError::Truncated",
            DecodeError::UnsupportedVersion(_) => "DecodeError::UnsupportedVersion",
            DecodeError::UnknownTag { .. } => "DecodeError::UnknownTag",
            DecodeError::InvalidOffset { .. } => "DecodeError::InvalidOffset",
            DecodeError::SharedNode(_) => "DecodeError::SharedNode",
            DecodeError::InvalidUtf8(_) => "DecodeError::InvalidUtf8",
            DecodeError::MissingTerminator(_) => "DecodeError::MissingTerminator",
            DecodeError::InvalidNumeric(_) => "DecodeError::InvalidNumeric",
            DecodeError::InvalidPayload(_) => "DecodeError::InvalidPayload",
            DecodeError::NestingTooDeep => "DecodeError::NestingTooDeep",
        }
    }
}
