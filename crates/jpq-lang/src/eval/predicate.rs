use std::borrow::Cow;
use std::cmp::Ordering;

use crate::program::{Node, NodeKind};
use crate::value::Value;

use super::error::EvalError;
use super::sequence::ValueSeq;
use super::Evaluator;

/// Three-valued result of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Truth {
    True,
    False,
    /// Undecided; carries the error that got in the way.
    Unknown(EvalError),
}

impl Truth {
    pub fn is_true(&self) -> bool {
        matches!(self, Truth::True)
    }

    /// `None` when unknown.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Truth::True => Some(true),
            Truth::False => Some(false),
            Truth::Unknown(_) => None,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b { Truth::True } else { Truth::False }
    }
}

/// Unwraps an operand, turning a recoverable error into an unknown result.
macro_rules! operand {
    ($result:expr) => {
        match $result {
            Ok(values) => values,
            Err(err) if err.is_recoverable() => return Ok(Truth::Unknown(err)),
            Err(err) => return Err(err),
        }
    };
}

impl<'a> Evaluator<'a> {
    pub(crate) fn eval_bool(
        &mut self,
        node: Node<'_>,
        input: &Cow<'a, Value>,
    ) -> Result<Truth, EvalError> {
        self.enter_scope()?;

        let result = if node.kind().is_predicate() && !node.has_next() {
            self.predicate(node, input)
        } else {
            self.value_as_bool(node, input)
        };

        self.exit_scope();
        result
    }

    /// Decides a predicate node, ignoring any step chained after it.
    pub(crate) fn predicate(
        &mut self,
        node: Node<'_>,
        input: &Cow<'a, Value>,
    ) -> Result<Truth, EvalError> {
        match node.kind() {
            NodeKind::And => {
                let left = self.eval_bool(node.left(), input)?;
                if left == Truth::False {
                    return Ok(Truth::False);
                }

                Ok(match (left, self.eval_bool(node.right(), input)?) {
                    (_, Truth::False) | (Truth::False, _) => Truth::False,
                    (Truth::Unknown(err), _) | (_, Truth::Unknown(err)) => Truth::Unknown(err),
                    (Truth::True, Truth::True) => Truth::True,
                })
            }
            NodeKind::Or => {
                let left = self.eval_bool(node.left(), input)?;
                if left == Truth::True {
                    return Ok(Truth::True);
                }

                Ok(match (left, self.eval_bool(node.right(), input)?) {
                    (_, Truth::True) | (Truth::True, _) => Truth::True,
                    (Truth::Unknown(err), _) | (_, Truth::Unknown(err)) => Truth::Unknown(err),
                    (Truth::False, Truth::False) => Truth::False,
                })
            }
            NodeKind::Not => Ok(match self.eval_bool(node.arg(), input)? {
                Truth::True => Truth::False,
                Truth::False => Truth::True,
                unknown => unknown,
            }),
            NodeKind::IsUnknown => Ok(Truth::from(matches!(
                self.eval_bool(node.arg(), input)?,
                Truth::Unknown(_)
            ))),
            NodeKind::Exists => self.exists(node.arg(), input),
            kind @ (NodeKind::Equal
            | NodeKind::NotEqual
            | NodeKind::Less
            | NodeKind::Greater
            | NodeKind::LessOrEqual
            | NodeKind::GreaterOrEqual) => {
                let mut left = operand!(self.collect(node.left(), input));
                let mut right = operand!(self.collect(node.right(), input));
                if self.lax {
                    left = left.unwrap_arrays();
                    right = right.unwrap_arrays();
                }

                Ok(self.cross_product(&left, &right, |l, r| compare(kind, l, r)))
            }
            NodeKind::StartsWith => self.starts_with(node, input),
            _ => Err(EvalError::Internal("not a predicate")),
        }
    }

    fn exists(&mut self, arg: Node<'_>, input: &Cow<'a, Value>) -> Result<Truth, EvalError> {
        let result = if self.lax {
            self.eval(arg, input.clone(), None)
        } else {
            // strict: every item is evaluated, errors after a match included
            let mut scratch = ValueSeq::new();
            self.eval(arg, input.clone(), Some(&mut scratch))
        };

        Ok(Truth::from(operand!(result).is_found()))
    }

    /// Tests every pair of left and right values.
    ///
    /// Lax mode holds on the first true pair and reports an error only when
    /// no pair holds. Strict mode needs every pair free of errors.
    fn cross_product(
        &self,
        left: &ValueSeq<'_>,
        right: &ValueSeq<'_>,
        pair: impl Fn(&Value, &Value) -> Result<bool, EvalError>,
    ) -> Truth {
        let mut found = false;
        let mut error = None;

        for l in left.iter() {
            for r in right.iter() {
                match pair(l, r) {
                    Ok(true) if self.lax => return Truth::True,
                    Ok(true) => found = true,
                    Ok(false) => {}
                    Err(err) if !self.lax => return Truth::Unknown(err),
                    Err(err) => {
                        error.get_or_insert(err);
                    }
                }
            }
        }

        match (found, error) {
            (true, _) => Truth::True,
            (false, Some(err)) => Truth::Unknown(err),
            (false, None) => Truth::False,
        }
    }

    /// The prefix must be a single string; every (lax-unwrapped) left value is tested against it.
    fn starts_with(&mut self, node: Node<'_>, input: &Cow<'a, Value>) -> Result<Truth, EvalError> {
        let Some(prefix) = operand!(self.collect(node.right(), input)).into_single() else {
            return Ok(Truth::Unknown(EvalError::SingletonRequired));
        };
        if !matches!(prefix.as_ref(), Value::String(_)) {
            return Ok(Truth::Unknown(EvalError::Incomparable(
                "string",
                prefix.type_name(),
            )));
        }

        let mut whole = operand!(self.collect(node.left(), input));
        if self.lax {
            whole = whole.unwrap_arrays();
        }

        let mut prefix_seq = ValueSeq::new();
        prefix_seq.push(prefix);
        Ok(self.cross_product(&whole, &prefix_seq, starts_with))
    }

    /// A value expression in a predicate position holds when it yields exactly `true`.
    fn value_as_bool(
        &mut self,
        node: Node<'_>,
        input: &Cow<'a, Value>,
    ) -> Result<Truth, EvalError> {
        let values = operand!(self.collect(node, input));

        Ok(match values.into_single().as_deref() {
            Some(Value::Bool(b)) => Truth::from(*b),
            Some(other) => Truth::Unknown(EvalError::Incomparable(other.type_name(), "boolean")),
            None => Truth::Unknown(EvalError::SingletonRequired),
        })
    }
}

fn compare(kind: NodeKind, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let incomparable = || EvalError::Incomparable(left.type_name(), right.type_name());
    let equality = matches!(kind, NodeKind::Equal | NodeKind::NotEqual);

    let ordering = match (left, right) {
        (Value::Null, Value::Null) | (Value::Bool(_), Value::Bool(_)) if !equality => {
            return Err(incomparable());
        }
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
        (Value::DateTime(a), Value::DateTime(b)) => a.compare(b).ok_or_else(incomparable)?,
        (Value::Null, _) | (_, Value::Null) => return Ok(false),
        _ => return Err(incomparable()),
    };

    Ok(match kind {
        NodeKind::Equal => ordering.is_eq(),
        NodeKind::NotEqual => ordering.is_ne(),
        NodeKind::Less => ordering.is_lt(),
        NodeKind::Greater => ordering.is_gt(),
        NodeKind::LessOrEqual => ordering.is_le(),
        NodeKind::GreaterOrEqual => ordering.is_ge(),
        _ => false,
    })
}

fn starts_with(whole: &Value, prefix: &Value) -> Result<bool, EvalError> {
    match (whole, prefix) {
        (Value::String(whole), Value::String(prefix)) => Ok(whole.starts_with(prefix.as_str())),
        _ => Err(EvalError::Incomparable(whole.type_name(), prefix.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::JsonPath;
    use crate::variables::NoVars;
    use rstest::rstest;

    fn test(path: &str, json: &str) -> Result<Truth, EvalError> {
        let path: JsonPath = path.parse().unwrap();
        let root: Value = json.parse().unwrap();
        Evaluator::new(path.mode(), &root, &NoVars, 64).test(&path)
    }

    #[rstest]
    #[case::equal("$ == 1", "1", Truth::True)]
    #[case::scale_insensitive("$ == 1.00", "1", Truth::True)]
    #[case::not_equal("$ != 1", "2", Truth::True)]
    #[case::less("$ < 2", "1", Truth::True)]
    #[case::greater_or_equal("$ >= 2", "1", Truth::False)]
    #[case::strings("$ < \"b\"", "\"a\"", Truth::True)]
    #[case::bytewise_strings("$ < \"a\"", "\"B\"", Truth::True)]
    #[case::null_equal("$ == null", "null", Truth::True)]
    #[case::null_vs_number("$ == null", "1", Truth::False)]
    #[case::null_not_equal("$ != null", "1", Truth::False)]
    #[case::bool_equal("$ == true", "true", Truth::True)]
    #[case::bool_order("$ < true", "false", Truth::Unknown(EvalError::Incomparable("boolean", "boolean")))]
    #[case::type_mismatch("$ == \"1\"", "1", Truth::Unknown(EvalError::Incomparable("number", "string")))]
    #[case::arrays("$ == $", "{}", Truth::Unknown(EvalError::Incomparable("object", "object")))]
    #[case::lax_unwraps("$ == 1", "[1, 2]", Truth::True)]
    #[case::lax_unwraps_no_match("$ == 3", "[1, 2]", Truth::False)]
    #[case::lax_error_after_match("$[*] == 1", "[1, \"a\"]", Truth::True)]
    #[case::lax_error_without_match("$[*] == 2", "[1, \"a\"]", Truth::Unknown(EvalError::Incomparable("string", "number")))]
    #[case::strict_error_after_match("strict $[*] == 1", "[1, \"a\"]", Truth::Unknown(EvalError::Incomparable("string", "number")))]
    #[case::strict_no_unwrap("strict $ == 1", "[1]", Truth::Unknown(EvalError::Incomparable("array", "number")))]
    #[case::empty_operand("$.a == 1", "{}", Truth::False)]
    #[case::strict_missing_operand("strict $.a == 1", "{}", Truth::Unknown(EvalError::MemberNotFound("a".into())))]
    #[case::and("$ > 0 && $ < 2", "1", Truth::True)]
    #[case::and_unknown("$ == \"a\" && $ > 0", "1", Truth::Unknown(EvalError::Incomparable("number", "string")))]
    #[case::and_short_circuit("$ > 5 && $ == \"a\"", "1", Truth::False)]
    #[case::and_false_after_unknown("$ == \"a\" && $ > 5", "1", Truth::False)]
    #[case::or("$ > 5 || $ == 1", "1", Truth::True)]
    #[case::or_unknown("$ > 5 || $ == \"a\"", "1", Truth::Unknown(EvalError::Incomparable("number", "string")))]
    #[case::or_true_after_unknown("$ == \"a\" || $ == 1", "1", Truth::True)]
    #[case::not("!($ > 5)", "1", Truth::True)]
    #[case::not_unknown("!($ == \"a\")", "1", Truth::Unknown(EvalError::Incomparable("number", "string")))]
    #[case::is_unknown("($ == \"a\") is unknown", "1", Truth::True)]
    #[case::is_not_unknown("($ == 1) is unknown", "1", Truth::False)]
    #[case::exists("exists ($.a)", "{\"a\": null}", Truth::True)]
    #[case::not_exists("exists ($.b)", "{\"a\": null}", Truth::False)]
    #[case::strict_exists_error("strict exists ($.b)", "{\"a\": null}", Truth::Unknown(EvalError::MemberNotFound("b".into())))]
    #[case::starts_with("$ starts with \"ab\"", "\"abc\"", Truth::True)]
    #[case::starts_with_no("$ starts with \"b\"", "\"abc\"", Truth::False)]
    #[case::starts_with_lax_unwrap("$ starts with \"b\"", "[\"a\", \"bc\"]", Truth::True)]
    #[case::starts_with_non_string("$ starts with \"a\"", "1", Truth::Unknown(EvalError::Incomparable("number", "string")))]
    #[case::starts_with_prefix_not_string("$ starts with $.p", "{\"p\": 1}", Truth::Unknown(EvalError::Incomparable("string", "number")))]
    #[case::starts_with_many_prefixes("$.s starts with $.p[*]", "{\"s\": \"abc\", \"p\": [\"x\", \"a\"]}", Truth::Unknown(EvalError::SingletonRequired))]
    #[case::starts_with_no_prefix("$.s starts with $.q", "{\"s\": \"abc\"}", Truth::Unknown(EvalError::SingletonRequired))]
    #[case::starts_with_empty_whole("$.q starts with \"a\"", "{\"s\": \"abc\"}", Truth::False)]
    #[case::value_true("$.flag", "{\"flag\": true}", Truth::True)]
    #[case::value_false("$.flag", "{\"flag\": false}", Truth::False)]
    #[case::value_not_boolean("$.flag", "{\"flag\": 1}", Truth::Unknown(EvalError::Incomparable("number", "boolean")))]
    #[case::value_empty("$.flag", "{}", Truth::Unknown(EvalError::SingletonRequired))]
    #[case::predicate_with_next("($ > 0).type() == \"boolean\"", "1", Truth::True)]
    fn test_predicate(#[case] path: &str, #[case] json: &str, #[case] expected: Truth) {
        assert_eq!(test(path, json), Ok(expected));
    }

    #[test]
    fn test_fatal_error_escapes() {
        assert_eq!(test("$x == 1", "1"), Err(EvalError::VariableNotFound("x".into())));
        assert_eq!(test("$ / 0 == 1", "1"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_truth() {
        assert!(Truth::True.is_true());
        assert_eq!(Truth::False.to_bool(), Some(false));
        assert_eq!(Truth::Unknown(EvalError::ArrayRequired).to_bool(), None);
    }
}
