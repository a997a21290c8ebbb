use std::borrow::Cow;
use std::iter;

use itertools::Either;
use smol_str::SmolStr;

use crate::program::{Node, NodeKind};
use crate::value::{Object, Value};

use super::error::EvalError;
use super::sequence::ValueSeq;
use super::{Evaluator, Outcome, elements};

impl<'a> Evaluator<'a> {
    /// Evaluates a function argument for one item; it must yield exactly one value.
    fn apply(&mut self, func: Node<'_>, item: Cow<'a, Value>) -> Result<Cow<'a, Value>, EvalError> {
        let mut values = ValueSeq::new();
        self.eval(func, item, Some(&mut values))?;
        values.into_single().ok_or(EvalError::SingletonRequired)
    }

    /// Like [`Self::apply`], with `@1` bound to the accumulator and `@2` to the item.
    fn apply_fold(
        &mut self,
        func: Node<'_>,
        accumulator: Cow<'a, Value>,
        item: Cow<'a, Value>,
    ) -> Result<Cow<'a, Value>, EvalError> {
        self.arguments.push([accumulator, item.clone()]);
        let result = self.apply(func, item);
        self.arguments.pop();
        result
    }

    pub(crate) fn eval_map(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let func = node.arg();

        if !input.is_array() {
            if !self.lax {
                return self.structural(EvalError::ArrayRequired);
            }
            let value = self.apply(func, input)?;
            return self.emit_next(node, value, found);
        }

        let items = elements(&input)
            .map(|item| self.apply(func, item).map(Cow::into_owned))
            .collect::<Result<Vec<_>, _>>()?;

        self.emit_next(node, Cow::Owned(Value::Array(items)), found)
    }

    /// Combines the items pairwise from the left, starting with the first one.
    pub(crate) fn eval_reduce(
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

        let func = node.arg();
        let mut items = elements(&input);
        let Some(first) = items.next() else {
            return Ok(Outcome::NotFound);
        };
        let result = items.try_fold(first, |acc, item| self.apply_fold(func, acc, item))?;

        self.emit_next(node, result, found)
    }

    /// `fold` and `foldl` walk the items forwards, `foldr` backwards.
    pub(crate) fn eval_fold(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        if !input.is_array() && !self.lax {
            return self.structural(EvalError::ArrayRequired);
        }

        let func = node.left();
        let seed = self
            .collect(node.right(), &input)?
            .into_single()
            .ok_or(EvalError::SingletonRequired)?;

        let mut items = if input.is_array() {
            Either::Left(elements(&input))
        } else {
            Either::Right(iter::once(input.clone()))
        };
        let result = if node.kind() == NodeKind::FoldRight {
            items
                .rev()
                .try_fold(seed, |acc, item| self.apply_fold(func, acc, item))?
        } else {
            items.try_fold(seed, |acc, item| self.apply_fold(func, acc, item))?
        };

        self.emit_next(node, result, found)
    }

    /// `[a, b, ...]`: every value of every element, in order.
    pub(crate) fn eval_array(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let mut items = Vec::with_capacity(node.len());
        for element in node.elements() {
            items.extend(self.collect(element, &input)?.into_values());
        }

        self.emit_next(node, Cow::Owned(Value::Array(items)), found)
    }

    pub(crate) fn eval_object(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let mut object = Object::new();

        for (key, value) in node.fields() {
            let key = match self.collect(key, &input)?.into_single().as_deref() {
                Some(Value::String(key)) => SmolStr::new(key),
                Some(other) => return Err(EvalError::InvalidObjectKey(other.type_name())),
                None => return Err(EvalError::SingletonRequired),
            };
            let value = self
                .collect(value, &input)?
                .into_single()
                .ok_or(EvalError::SingletonRequired)?;

            object.insert(key, value.into_owned());
        }

        self.emit_next(node, Cow::Owned(Value::Object(object)), found)
    }

    /// `a, b, ...`: the values of each element in turn, all through the same next step.
    pub(crate) fn eval_sequence(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        mut found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let mut outcome = Outcome::NotFound;

        for element in node.elements() {
            let values = self.collect(element, &input)?;
            if self.emit_all(node, values, found.as_deref_mut())?.is_found() {
                if found.is_none() {
                    return Ok(Outcome::Found);
                }
                outcome = Outcome::Found;
            }
        }

        Ok(outcome)
    }
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
    #[case::map("$.map(@ * 2)", "[1, 2, 3]", "[[2, 4, 6]]")]
    #[case::map_keys("$.map(@.a)", "[{\"a\": 1}, {\"a\": [2]}]", "[[1, [2]]]")]
    #[case::map_empty("$.map(@ + 1)", "[]", "[[]]")]
    #[case::map_lax_scalar("$.map(@ + 1)", "1", "[2]")]
    #[case::map_then_index("$.map(@ * 10)[last]", "[1, 2]", "[20]")]
    #[case::reduce("$.reduce(@1 + @2)", "[1, 2, 3]", "[6]")]
    #[case::reduce_order("$.reduce(@1 - @2)", "[10, 2, 3]", "[5]")]
    #[case::reduce_single("$.reduce(@1 / 0)", "[5]", "[5]")]
    #[case::reduce_empty("$.reduce(@1 + @2)", "[]", "[]")]
    #[case::reduce_lax_scalar("$.reduce(@1 + @2)", "4", "[4]")]
    #[case::reduce_current_is_item("$.reduce(@)", "[1, 2, 3]", "[3]")]
    #[case::fold("$.fold(@1 + @2, 10)", "[1, 2]", "[13]")]
    #[case::foldl("$.foldl([@1, @2], [])", "[1, 2]", "[[[[], 1], 2]]")]
    #[case::foldr("$.foldr([@1, @2], [])", "[1, 2]", "[[[[], 2], 1]]")]
    #[case::fold_empty("$.fold(@1 + @2, 0)", "[]", "[0]")]
    #[case::fold_seed_from_input("$.a.fold(@1 + @2, $.b)", "{\"a\": [1], \"b\": 2}", "[3]")]
    #[case::nested_folds("$.fold(@1 + @2.reduce(@1 * @2), 0)", "[[2, 3], [4]]", "[10]")]
    #[case::array("[$.a, $.b[*]]", "{\"a\": 1, \"b\": [2, 3]}", "[[1, 2, 3]]")]
    #[case::array_empty("[]", "null", "[[]]")]
    #[case::array_skips_missing("[$.a, $.z]", "{\"a\": 1}", "[[1]]")]
    #[case::object("{a: $.a, \"b\": [$.b]}", "{\"a\": 1, \"b\": 2}", "[{\"a\": 1, \"b\": [2]}]")]
    #[case::object_computed_key("{$.k: 1}", "{\"k\": \"x\"}", "[{\"x\": 1}]")]
    #[case::object_duplicate_key("{a: 1, a: 2}", "null", "[{\"a\": 2}]")]
    #[case::sequence("1, $.a, $.b[*]", "{\"a\": 2, \"b\": [3, 4]}", "[1, 2, 3, 4]")]
    #[case::sequence_filter("($.a, $.b) ? (@ > 2)", "{\"a\": 2, \"b\": 3}", "[3]")]
    fn test_combinator(#[case] path: &str, #[case] json: &str, #[case] expected: &str) {
        assert_eq!(query(path, json), Ok(values(expected)));
    }

    #[rstest]
    #[case::map_many("$.map(@[*])", "[[1, 2]]", EvalError::SingletonRequired)]
    #[case::map_none("$.map(@.a)", "[{}]", EvalError::SingletonRequired)]
    #[case::map_strict_scalar("strict $.map(@)", "1", EvalError::ArrayRequired)]
    #[case::reduce_strict_scalar("strict $.reduce(@1)", "1", EvalError::ArrayRequired)]
    #[case::fold_seed_many("$.fold(@1, $[*])", "[1, 2]", EvalError::SingletonRequired)]
    #[case::fold_error("$.fold(@1 / @2, 1)", "[0]", EvalError::DivisionByZero)]
    #[case::object_key_number("{1: 2}", "null", EvalError::InvalidObjectKey("number"))]
    #[case::object_key_missing("{$.k: 2}", "{}", EvalError::SingletonRequired)]
    #[case::object_value_many("{a: $[*]}", "[1, 2]", EvalError::SingletonRequired)]
    fn test_combinator_error(#[case] path: &str, #[case] json: &str, #[case] expected: EvalError) {
        assert_eq!(query(path, json), Err(expected));
    }

    #[test]
    fn test_arguments_are_released() {
        let path: JsonPath = "$.fold(@1 + @2, 0)".parse().unwrap();
        let root: Value = "[1, 2, 3]".parse().unwrap();
        let mut evaluator = Evaluator::new(path.mode(), &root, &NoVars, 64);

        let mut found = ValueSeq::new();
        evaluator.run(&path, Some(&mut found)).unwrap();
        assert_eq!(found.into_values(), vec![Value::from(6)]);
        assert!(evaluator.arguments.is_empty());
    }
}
