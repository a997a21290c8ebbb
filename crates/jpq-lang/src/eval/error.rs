use smol_str::SmolStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EvalError {
    #[error("SQL/JSON array required")]
    ArrayRequired,
    #[error("SQL/JSON object required")]
    ObjectRequired,
    #[error("SQL/JSON member not found \"{0}\"")]
    MemberNotFound(SmolStr),
    #[error("SQL/JSON number not found")]
    NumberNotFound,
    #[error("SQL/JSON scalar required")]
    ScalarRequired,
    #[error("Singleton SQL/JSON item required")]
    SingletonRequired,
    #[error("Non-numeric SQL/JSON item")]
    NonNumericItem,
    #[error("Invalid SQL/JSON subscript")]
    InvalidSubscript,
    #[error("Invalid argument for SQL/JSON datetime function")]
    InvalidDatetimeArgument,
    #[error("Cannot compare \"{0}\" with \"{1}\"")]
    Incomparable(&'static str, &'static str),
    #[error("Object key must be a string, got \"{0}\"")]
    InvalidObjectKey(&'static str),
    #[error("Unsupported variable type \"{0}\"")]
    UnsupportedVariableType(String),
    #[error("More than one SQL/JSON item")]
    MoreThanOneItem,
    #[error("Variable \"{0}\" is not defined")]
    VariableNotFound(SmolStr),
    #[error("Maximum recursion depth exceeded \"{0}\"")]
    RecursionError(u32),
    #[error("Divided by 0")]
    DivisionByZero,
    #[error("Numeric value out of range")]
    NumericOverflow,
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl EvalError {
    /// Structural errors that predicates, filters and lax evaluation may absorb.
    ///
    /// Everything else aborts the whole evaluation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EvalError::ArrayRequired
                | EvalError::ObjectRequired
                | EvalError::MemberNotFound(_)
                | EvalError::NumberNotFound
                | EvalError::ScalarRequired
                | EvalError::SingletonRequired
                | EvalError::NonNumericItem
                | EvalError::InvalidSubscript
                | EvalError::InvalidDatetimeArgument
                | EvalError::Incomparable(_, _)
                | EvalError::InvalidObjectKey(_)
        )
    }

    /// Stable identifier used as the diagnostic code.
    #[cold]
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::ArrayRequired => "EvalError::ArrayRequired",
            EvalError::ObjectRequired => "EvalError::ObjectRequired",
            EvalError::MemberNotFound(_) => "EvalError::MemberNotFound",
            EvalError::NumberNotFound => "EvalError::NumberNotFound",
            EvalError::ScalarRequired => "EvalError::ScalarRequired",
            EvalError::SingletonRequired => "EvalError::SingletonRequired",
            EvalError::NonNumericItem => "EvalError::NonNumericItem",
            EvalError::InvalidSubscript => "EvalError::InvalidSubscript",
            EvalError::InvalidDatetimeArgument => "EvalError::InvalidDatetimeArgument",
            EvalError::Incomparable(_, _) => "EvalError::Incomparable",
            EvalError::InvalidObjectKey(_) => "EvalError::InvalidObjectKey",
            EvalError::UnsupportedVariableType(_) => "EvalError::UnsupportedVariableType",
            EvalError::MoreThanOneItem => "EvalError::MoreThanOneItem",
            EvalError::VariableNotFound(_) => "EvalError::VariableNotFound",
            EvalError::RecursionError(_) => "EvalError::RecursionError",
            EvalError::DivisionByZero => "EvalError::DivisionByZero",
            EvalError::NumericOverflow => "EvalError::NumericOverflow",
            EvalError::Internal(_) => "EvalError::Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::member_not_found(EvalError::MemberNotFound("a".into()), true)]
    #[case::incomparable(EvalError::Incomparable("number", "string"), true)]
    #[case::variable_not_found(EvalError::VariableNotFound("x".into()), false)]
    #[case::recursion(EvalError::RecursionError(64), false)]
    #[case::division_by_zero(EvalError::DivisionByZero, false)]
    #[case::more_than_one_item(EvalError::MoreThanOneItem, false)]
    fn test_is_recoverable(#[case] err: EvalError, #[case] expected: bool) {
        assert_eq!(err.is_recoverable(), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EvalError::MemberNotFound("a".into()).to_string(),
            "SQL/JSON member not found \"a\""
        );
        assert_eq!(EvalError::RecursionError(8).to_string(), "Maximum recursion depth exceeded \"8\"");
    }
}
