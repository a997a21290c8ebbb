use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter, Write};
use std::str::FromStr;

use itertools::Itertools;
use serde::ser::{Serialize, Serializer};
use smol_str::SmolStr;

use crate::datetime::DateTime;
use crate::number::Number;

pub type Object = BTreeMap<SmolStr, Value>;

/// A tree-document value: the input of every path evaluation and the type of its results.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    DateTime(DateTime),
    Array(Vec<Value>),
    Object(Object),
}

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Number out of range `{0}`")]
    NumberOutOfRange(String),
}

impl Value {
    pub const NULL: Value = Self::Null;
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    /// Name reported by `.type()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::DateTime(dt) => dt.type_name(),
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Anything that is neither an array nor an object.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(key))
    }

    /// General ordering used by `.min()` and `.max()`.
    ///
    /// Values of different types order as
    /// null < string < number < boolean < datetime < array < object.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a
                .compare(b)
                .unwrap_or_else(|| a.type_name().cmp(b.type_name())),
            (Value::Array(a), Value::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(a, b)| a.total_cmp(b))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b.iter())
                    .map(|((ak, av), (bk, bv))| ak.cmp(bk).then_with(|| av.total_cmp(bv)))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            }),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::String(_) => 1,
            Value::Number(_) => 2,
            Value::Bool(_) => 3,
            Value::DateTime(_) => 4,
            Value::Array(_) => 5,
            Value::Object(_) => 6,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<DateTime> for Value {
    fn from(dt: DateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Vec<Value>> for Value {
    fn from(elems: Vec<Value>) -> Self {
        Value::Array(elems)
    }
}

impl From<Object> for Value {
    fn from(fields: Object) -> Self {
        Value::Object(fields)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(
                n.as_str()
                    .parse()
                    .map_err(|_| ValueError::NumberOutOfRange(n.to_string()))?,
            ),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(elems) => Value::Array(
                elems
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| Ok((SmolStr::from(k), Value::try_from(v)?)))
                    .collect::<Result<_, ValueError>>()?,
            ),
        })
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => n
                .to_string()
                .parse::<serde_json::Number>()
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_string()),
            Value::Array(elems) => {
                serde_json::Value::Array(elems.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl FromStr for Value {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Value::try_from(serde_json::from_str::<serde_json::Value>(s)?)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n
                .to_string()
                .parse::<serde_json::Number>()
                .map_err(<S::Error as serde::ser::Error>::custom)?
                .serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => serializer.collect_str(dt),
            Value::Array(elems) => serializer.collect_seq(elems),
            Value::Object(fields) => {
                serializer.collect_map(fields.iter().map(|(k, v)| (k.as_str(), v)))
            }
        }
    }
}

/// Writes `s` as a double-quoted JSON string.
pub(crate) fn escape_json(f: &mut impl Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{08}' => f.write_str("\\b")?,
            '\u{0c}' => f.write_str("\\f")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Renders the value as JSON text. Numbers keep their decimal scale.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => escape_json(f, s),
            Value::DateTime(dt) => write!(f, "\"{}\"", dt),
            Value::Array(elems) => write!(f, "[{}]", elems.iter().join(", ")),
            Value::Object(fields) => {
                f.write_char('{')?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    escape_json(f, k)?;
                    write!(f, ": {}", v)?;
                }
                f.write_char('}')
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::null("null", "null")]
    #[case::number("1.50", "number")]
    #[case::string("\"a\"", "string")]
    #[case::boolean("true", "boolean")]
    #[case::array("[1, 2]", "array")]
    #[case::object("{\"a\": 1}", "object")]
    fn test_type_name(#[case] json: &str, #[case] expected: &str) {
        assert_eq!(json.parse::<Value>().unwrap().type_name(), expected);
    }

    #[rstest]
    #[case::scalar_number("1", true)]
    #[case::scalar_null("null", true)]
    #[case::array("[]", false)]
    #[case::object("{}", false)]
    fn test_is_scalar(#[case] json: &str, #[case] expected: bool) {
        assert_eq!(json.parse::<Value>().unwrap().is_scalar(), expected);
    }

    #[rstest]
    #[case::nested("{\"b\": [1, 2.5, \"x\"], \"a\": null}", "{\"a\": null, \"b\": [1, 2.5, \"x\"]}")]
    #[case::escapes("\"line\\nbreak \\\"q\\\"\"", "\"line\\nbreak \\\"q\\\"\"")]
    #[case::decimal_scale("1.50", "1.50")]
    #[case::wide_decimal("12345678901234567890.5", "12345678901234567890.5")]
    fn test_display(#[case] json: &str, #[case] expected: &str) {
        assert_eq!(json.parse::<Value>().unwrap().to_string(), expected);
    }

    #[test]
    fn test_number_out_of_range() {
        assert!(matches!(
            "1e300".parse::<Value>(),
            Err(ValueError::NumberOutOfRange(_))
        ));
    }

    #[test]
    fn test_json_conversion() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, 2.5, true, null], "b": "s"}"#).unwrap();
        let value = Value::try_from(json.clone()).unwrap();
        assert_eq!(serde_json::Value::from(&value), json);
        assert_eq!(serde_json::to_value(&value).unwrap(), json);
    }

    #[rstest]
    #[case::numbers("1", "2", Ordering::Less)]
    #[case::strings("\"b\"", "\"a\"", Ordering::Greater)]
    #[case::null_before_string("null", "\"a\"", Ordering::Less)]
    #[case::string_before_number("\"z\"", "0", Ordering::Less)]
    #[case::number_before_bool("100", "false", Ordering::Less)]
    #[case::bool_before_array("true", "[]", Ordering::Less)]
    #[case::array_before_object("[1]", "{}", Ordering::Less)]
    #[case::arrays("[1, 2]", "[1, 3]", Ordering::Less)]
    #[case::array_prefix("[1]", "[1, 0]", Ordering::Less)]
    fn test_total_cmp(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        let a: Value = a.parse().unwrap();
        let b: Value = b.parse().unwrap();
        assert_eq!(a.total_cmp(&b), expected);
    }
}
