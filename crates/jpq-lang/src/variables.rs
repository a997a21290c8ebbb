use std::borrow::Cow;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::eval::error::EvalError;
use crate::value::Value;

/// Resolves `$name` references during evaluation.
pub trait Variables {
    fn resolve(&self, name: &str) -> Option<Cow<'_, Value>>;
}

/// A fixed set of named bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vars(FxHashMap<SmolStr, Value>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds bindings from the members of a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self, EvalError> {
        match json {
            serde_json::Value::Object(fields) => fields
                .into_iter()
                .map(|(name, value)| {
                    Value::try_from(value)
                        .map(|value| (SmolStr::from(name), value))
                        .map_err(|e| EvalError::UnsupportedVariableType(e.to_string()))
                })
                .collect::<Result<FxHashMap<_, _>, _>>()
                .map(Vars),
            other => Err(EvalError::UnsupportedVariableType(
                match other {
                    serde_json::Value::Null => "null",
                    serde_json::Value::Bool(_) => "boolean",
                    serde_json::Value::Number(_) => "number",
                    serde_json::Value::String(_) => "string",
                    serde_json::Value::Array(_) => "array",
                    serde_json::Value::Object(_) => "object",
                }
                .to_string(),
            )),
        }
    }
}

impl<K: Into<SmolStr>, V: Into<Value>> FromIterator<(K, V)> for Vars {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Vars(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Variables for Vars {
    fn resolve(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.0.get(name).map(Cow::Borrowed)
    }
}

/// Binds nothing; every `$name` is undefined.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVars;

impl Variables for NoVars {
    fn resolve(&self, _name: &str) -> Option<Cow<'_, Value>> {
        None
    }
}

/// Resolves variables lazily through a callback.
pub struct VarsFn<F>(pub F);

impl<F> Variables for VarsFn<F>
where
    F: Fn(&str) -> Option<Value>,
{
    fn resolve(&self, name: &str) -> Option<Cow<'_, Value>> {
        (self.0)(name).map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_from_json() {
        let vars = Vars::from_json(serde_json::json!({"x": 1, "y": "s"})).unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.resolve("x").as_deref(), Some(&Value::from(1)));
        assert_eq!(vars.resolve("z"), None);
    }

    #[rstest]
    #[case::array(serde_json::json!([1]), "array")]
    #[case::number(serde_json::json!(1), "number")]
    #[case::null(serde_json::json!(null), "null")]
    fn test_from_json_requires_object(#[case] json: serde_json::Value, #[case] type_name: &str) {
        assert_eq!(
            Vars::from_json(json),
            Err(EvalError::UnsupportedVariableType(type_name.to_string()))
        );
    }

    #[test]
    fn test_vars_fn() {
        let vars = VarsFn(|name: &str| (name == "n").then(|| Value::from(42)));
        assert_eq!(vars.resolve("n").as_deref(), Some(&Value::from(42)));
        assert_eq!(vars.resolve("m"), None);
    }

    #[test]
    fn test_from_iter() {
        let vars: Vars = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(vars.get("b"), Some(&Value::from(2)));
        assert!(NoVars.resolve("a").is_none());
    }
}
