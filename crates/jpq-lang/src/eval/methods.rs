use std::borrow::Cow;
use std::cmp::Ordering;

use smol_str::SmolStr;

use crate::datetime::DateTime;
use crate::number::Number;
use crate::program::{Node, NodeKind};
use crate::value::{Object, Value};

use super::error::EvalError;
use super::sequence::ValueSeq;
use super::{Evaluator, Outcome, elements};

impl<'a> Evaluator<'a> {
    /// Item methods: `.type()`, `.size()`, `.abs()` and friends, `.datetime()`.
    pub(crate) fn eval_method(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let value = match node.kind() {
            NodeKind::Type => Value::from(input.type_name()),
            NodeKind::Size => match &*input {
                Value::Array(items) => Value::Number(Number::from(items.len())),
                _ if self.lax => Value::Number(Number::ONE),
                _ => return self.structural(EvalError::ArrayRequired),
            },
            kind @ (NodeKind::Abs | NodeKind::Floor | NodeKind::Ceiling) => {
                let n = input.as_number().ok_or(EvalError::NonNumericItem)?;
                Value::Number(match kind {
                    NodeKind::Abs => n.abs(),
                    NodeKind::Floor => n.floor(),
                    _ => n.ceil(),
                })
            }
            NodeKind::Double => Value::Number(to_double(&input)?),
            NodeKind::Datetime => {
                let template = node.template().map(|template| template.as_str());
                Value::DateTime(to_datetime(&input, template)?)
            }
            NodeKind::KeyValue => return self.eval_keyvalue(node, &input, found),
            NodeKind::Min | NodeKind::Max => return self.eval_extreme(node, input, found),
            _ => return Err(EvalError::Internal("not an item method")),
        };

        self.emit_next(node, Cow::Owned(value), found)
    }

    /// One `{"key": k, "value": v}` object per member, in key order.
    fn eval_keyvalue(
        &mut self,
        node: Node<'_>,
        input: &Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let object = input.as_object().ok_or(EvalError::ObjectRequired)?;
        let pairs = object.iter().map(|(key, value)| {
            Cow::Owned(Value::Object(Object::from([
                (SmolStr::new_static("key"), Value::from(key.as_str())),
                (SmolStr::new_static("value"), value.clone()),
            ])))
        });

        self.emit_all(node, pairs, found)
    }

    /// `.min()` and `.max()`; the first of equal extremes wins.
    fn eval_extreme(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        if !input.is_array() {
            return if self.lax {
                self.emit_next(node, input, found)
            } else {
                self.structural(EvalError::ArrayRequired)
            };
        }

        let wanted = if node.kind() == NodeKind::Max {
            Ordering::Greater
        } else {
            Ordering::Less
        };
        let extreme =
            elements(&input).reduce(|best, item| if item.total_cmp(&best) == wanted { item } else { best });

        match extreme {
            Some(value) => self.emit_next(node, value, found),
            None => Ok(Outcome::NotFound),
        }
    }
}

/// Numbers must fit a binary float but keep their exact value; strings are parsed as one.
fn to_double(value: &Value) -> Result<Number, EvalError> {
    let double = match value {
        Value::Number(n) => n.to_f64().filter(|f| f.is_finite()).map(|_| *n),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(Number::from_f64),
        _ => None,
    };

    double.ok_or(EvalError::NonNumericItem)
}

fn to_datetime(value: &Value, template: Option<&str>) -> Result<DateTime, EvalError> {
    match value {
        Value::String(s) => DateTime::parse(s, template),
        Value::Number(n) if template.is_none() => DateTime::from_epoch(n),
        Value::DateTime(dt) if template.is_none() => Some(dt.clone()),
        _ => None,
    }
    .ok_or(EvalError::InvalidDatetimeArgument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::JsonPath;
    use crate::variables::NoVars;
    use rstest::rstest;

    fn query(path: &str, json: &str) -> Result<Vec<Value>, EvalError> {
        let path: JsonPath = path.parse().unwrap();
        let root: Value = json.parse().unwrap();
        let mut found = ValueSeq::new();
        Evaluator::new(path.mode(), &root, &NoVars, 64).run(&path, Some(&mut found))?;
        Ok(found.into_values())
    }

    fn values(json: &str) -> Vec<Value> {
        match json.parse::<Value>().unwrap() {
            Value::Array(items) => items,
            _ => unreachable!(),
        }
    }

    #[rstest]
    #[case::type_null("$.type()", "null", "[\"null\"]")]
    #[case::type_array_lax("$.a.type()", "{\"a\": [1, 2, 3]}", "[\"array\"]")]
    #[case::type_element("$.a[0].type()", "{\"a\": [1, 2, 3]}", "[\"number\"]")]
    #[case::type_each("$[*].type()", "[true, \"s\", {}]", "[\"boolean\", \"string\", \"object\"]")]
    #[case::size("$.size()", "[1, 2, 3]", "[3]")]
    #[case::size_lax_scalar("$.size()", "\"abc\"", "[1]")]
    #[case::abs("$.abs()", "-1.5", "[1.5]")]
    #[case::abs_lax_unwraps("$.abs()", "[-1, 2]", "[1, 2]")]
    #[case::floor("$.floor()", "-1.5", "[-2]")]
    #[case::ceiling("$.ceiling()", "1.2", "[2]")]
    #[case::double_string("$.double()", "\" 1.5 \"", "[1.5]")]
    #[case::double_exponent("$.double()", "\"1e3\"", "[1000]")]
    #[case::double_number("$.double()", "2", "[2]")]
    #[case::double_exact_number("$.double()", "1234567890.1234567890123", "[1234567890.1234567890123]")]
    #[case::keyvalue("$.keyvalue()", "{\"b\": 2, \"a\": [1]}", "[{\"key\": \"a\", \"value\": [1]}, {\"key\": \"b\", \"value\": 2}]")]
    #[case::keyvalue_empty("$.keyvalue()", "{}", "[]")]
    #[case::keyvalue_lax_unwraps("$.keyvalue().value", "[{\"a\": 1}, {\"b\": 2}]", "[1, 2]")]
    #[case::min("$.min()", "[3, 1, 2]", "[1]")]
    #[case::max("$.max()", "[\"b\", \"c\", \"a\"]", "[\"c\"]")]
    #[case::max_empty("$.max()", "[]", "[]")]
    #[case::min_lax_scalar("$.min()", "5", "[5]")]
    #[case::datetime_type("$.datetime().type()", "\"2024-01-02\"", "[\"date\"]")]
    #[case::datetime_template("$.datetime(\"dd.mm.yyyy\").type()", "\"02.01.2024\"", "[\"date\"]")]
    #[case::datetime_epoch("$.datetime().type()", "0", "[\"timestamp with time zone\"]")]
    #[case::datetime_time_tz("$.datetime().type()", "\"12:30:00 +02:00\"", "[\"time with time zone\"]")]
    fn test_method(#[case] path: &str, #[case] json: &str, #[case] expected: &str) {
        assert_eq!(query(path, json), Ok(values(expected)));
    }

    #[rstest]
    #[case::size_strict("strict $.size()", "{}", EvalError::ArrayRequired)]
    #[case::abs_string("$.abs()", "\"1\"", EvalError::NonNumericItem)]
    #[case::abs_strict_array("strict $.abs()", "[1]", EvalError::NonNumericItem)]
    #[case::double_garbage("$.double()", "\"abc\"", EvalError::NonNumericItem)]
    #[case::double_infinite("$.double()", "\"inf\"", EvalError::NonNumericItem)]
    #[case::double_bool("$.double()", "true", EvalError::NonNumericItem)]
    #[case::keyvalue_scalar("$.keyvalue()", "1", EvalError::ObjectRequired)]
    #[case::max_strict("strict $.max()", "1", EvalError::ArrayRequired)]
    #[case::datetime_garbage("$.datetime()", "\"yesterday\"", EvalError::InvalidDatetimeArgument)]
    #[case::datetime_bool("$.datetime()", "true", EvalError::InvalidDatetimeArgument)]
    #[case::datetime_template_mismatch("$.datetime(\"HH24:MI\")", "\"2024-01-02\"", EvalError::InvalidDatetimeArgument)]
    fn test_method_error(#[case] path: &str, #[case] json: &str, #[case] expected: EvalError) {
        assert_eq!(query(path, json), Err(expected));
    }

    #[test]
    fn test_datetime_comparison() {
        let result = query(
            "$[*] ? (@.datetime() > \"2024-01-01\".datetime())",
            "[\"2023-12-31\", \"2024-06-01\"]",
        );
        assert_eq!(result, Ok(vec![Value::from("2024-06-01")]));
    }
}
