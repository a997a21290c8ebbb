use std::borrow::Cow;

use smallvec::SmallVec;

use crate::value::Value;

/// Ordered results of evaluating a path.
///
/// Values borrow from the document or the variables where they can and are
/// owned when the evaluator had to build them. Up to one value is stored
/// inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSeq<'a>(SmallVec<[Cow<'a, Value>; 1]>);

impl<'a> ValueSeq<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Cow<'a, Value>) {
        self.0.push(value);
    }

    pub fn concat(&mut self, other: ValueSeq<'a>) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn head(&self) -> Option<&Value> {
        self.0.first().map(|v| &**v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|v| &**v)
    }

    /// The only value, if there is exactly one.
    pub fn into_single(mut self) -> Option<Cow<'a, Value>> {
        if self.0.len() == 1 { self.0.pop() } else { None }
    }

    /// Replaces every array with its elements, one level deep.
    pub(crate) fn unwrap_arrays(self) -> Self {
        if !self.iter().any(Value::is_array) {
            return self;
        }

        self.0
            .into_iter()
            .flat_map(|value| match value {
                Cow::Borrowed(Value::Array(elements)) => {
                    elements.iter().map(Cow::Borrowed).collect::<Vec<_>>()
                }
                Cow::Owned(Value::Array(elements)) => {
                    elements.into_iter().map(Cow::Owned).collect::<Vec<_>>()
                }
                value => vec![value],
            })
            .collect()
    }

    /// Detaches the values from the document.
    pub fn into_values(self) -> Vec<Value> {
        self.0.into_iter().map(Cow::into_owned).collect()
    }
}

impl<'a> FromIterator<Cow<'a, Value>> for ValueSeq<'a> {
    fn from_iter<T: IntoIterator<Item = Cow<'a, Value>>>(iter: T) -> Self {
        ValueSeq(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for ValueSeq<'a> {
    type Item = Cow<'a, Value>;
    type IntoIter = smallvec::IntoIter<[Cow<'a, Value>; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn seq(values: Vec<Value>) -> ValueSeq<'static> {
        values.into_iter().map(Cow::Owned).collect()
    }

    #[test]
    fn test_push_and_head() {
        let doc = Value::from(1);
        let mut values = ValueSeq::new();
        assert!(values.is_empty());
        assert_eq!(values.head(), None);

        values.push(Cow::Borrowed(&doc));
        values.push(Cow::Owned(Value::from("a")));
        assert_eq!(values.len(), 2);
        assert_eq!(values.head(), Some(&doc));
        assert_eq!(values.into_values(), vec![Value::from(1), Value::from("a")]);
    }

    #[test]
    fn test_concat_keeps_order() {
        let mut left = seq(vec![Value::from(1)]);
        left.concat(seq(vec![Value::from(2), Value::from(3)]));
        assert_eq!(
            left.iter().cloned().collect::<Vec<_>>(),
            vec![Value::from(1), Value::from(2), Value::from(3)]
        );
    }

    #[rstest]
    #[case::empty(vec![], None)]
    #[case::one(vec![Value::from(1)], Some(Value::from(1)))]
    #[case::two(vec![Value::from(1), Value::from(2)], None)]
    fn test_into_single(#[case] values: Vec<Value>, #[case] expected: Option<Value>) {
        assert_eq!(seq(values).into_single().map(Cow::into_owned), expected);
    }

    #[test]
    fn test_unwrap_arrays_one_level() {
        let doc = Value::Array(vec![Value::from(1), Value::Array(vec![Value::from(2)])]);
        let mut values = ValueSeq::new();
        values.push(Cow::Borrowed(&doc));
        values.push(Cow::Owned(Value::from(3)));

        assert_eq!(
            values.unwrap_arrays().into_values(),
            vec![
                Value::from(1),
                Value::Array(vec![Value::from(2)]),
                Value::from(3)
            ]
        );
    }
}
