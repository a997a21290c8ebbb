use std::borrow::Cow;

use crate::{
    JpqResult, compile,
    error::Error,
    eval::{Evaluator, Truth, error::EvalError, sequence::ValueSeq},
    program::JsonPath,
    value::Value,
    variables::Variables,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Maximum recursion depth of a single evaluation.
    pub max_depth: u32,
    /// Swallow recoverable errors: `exists` is false, queries are empty.
    pub silent: bool,
}

#[cfg(debug_assertions)]
// Debug builds have much larger stack frames.
impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: 64,
            silent: false,
        }
    }
}

#[cfg(not(debug_assertions))]
impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: 512,
            silent: false,
        }
    }
}

/// How [`Engine::query_wrapped`] packs its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wrapper {
    /// Return the single result as is; more than one is an error.
    #[default]
    None,
    /// Always return an array of all results.
    Unconditional,
    /// Wrap several results, or a single scalar, in an array.
    Conditional,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: Options,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_max_depth(&mut self, max_depth: u32) {
        self.options.max_depth = max_depth;
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.options.silent = silent;
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    #[allow(clippy::result_large_err)]
    pub fn compile(&self, text: &str) -> Result<JsonPath, Error> {
        compile(text)
    }

    fn evaluator<'a>(
        &self,
        path: &JsonPath,
        doc: &'a Value,
        vars: &'a dyn Variables,
    ) -> Evaluator<'a> {
        tracing::debug!(path = %path, mode = %path.mode(), "evaluating path");
        Evaluator::new(path.mode(), doc, vars, self.options.max_depth)
    }

    /// Turns an evaluation error into a diagnostic, or into `fallback` in silent mode.
    #[allow(clippy::result_large_err)]
    fn recover<T>(&self, path: &JsonPath, err: EvalError, fallback: T) -> JpqResult<T> {
        if self.options.silent && err.is_recoverable() {
            tracing::trace!(error = %err, "suppressed recoverable error");
            Ok(fallback)
        } else {
            Err(Error::from_error(path.to_string(), err))
        }
    }

    fn collect<'a>(
        &self,
        path: &JsonPath,
        doc: &'a Value,
        vars: &'a dyn Variables,
    ) -> Result<ValueSeq<'a>, EvalError> {
        let mut found = ValueSeq::new();
        self.evaluator(path, doc, vars).run(path, Some(&mut found))?;
        tracing::trace!(count = found.len(), "path evaluated");
        Ok(found)
    }

    /// Whether the path yields at least one item.
    #[allow(clippy::result_large_err)]
    pub fn exists(&self, path: &JsonPath, doc: &Value, vars: &dyn Variables) -> JpqResult<bool> {
        match self.evaluator(path, doc, vars).run(path, None) {
            Ok(outcome) => Ok(outcome.is_found()),
            Err(err) => self.recover(path, err, false),
        }
    }

    /// The result of a predicate path: `None` when it is unknown.
    ///
    /// A non-predicate path must yield a single boolean or null.
    #[allow(clippy::result_large_err)]
    pub fn matches(
        &self,
        path: &JsonPath,
        doc: &Value,
        vars: &dyn Variables,
    ) -> JpqResult<Option<bool>> {
        let root = path.root();
        let result = if root.kind().is_predicate() && !root.has_next() {
            self.evaluator(path, doc, vars)
                .test(path)
                .map(|truth| match truth {
                    Truth::True => Some(true),
                    Truth::False => Some(false),
                    Truth::Unknown(_) => None,
                })
        } else {
            self.collect(path, doc, vars).and_then(|found| {
                if found.len() != 1 {
                    return Err(EvalError::SingletonRequired);
                }
                match found.head() {
                    Some(Value::Bool(b)) => Ok(Some(*b)),
                    Some(Value::Null) => Ok(None),
                    _ => Err(EvalError::SingletonRequired),
                }
            })
        };

        result.or_else(|err| self.recover(path, err, None))
    }

    /// Every item the path yields, in order.
    #[allow(clippy::result_large_err)]
    pub fn query_all(
        &self,
        path: &JsonPath,
        doc: &Value,
        vars: &dyn Variables,
    ) -> JpqResult<Vec<Value>> {
        match self.collect(path, doc, vars) {
            Ok(found) => Ok(found.into_values()),
            Err(err) => self.recover(path, err, Vec::new()),
        }
    }

    /// The first item the path yields.
    #[allow(clippy::result_large_err)]
    pub fn query_first(
        &self,
        path: &JsonPath,
        doc: &Value,
        vars: &dyn Variables,
    ) -> JpqResult<Option<Value>> {
        match self.collect(path, doc, vars) {
            Ok(found) => Ok(found.into_iter().next().map(Cow::into_owned)),
            Err(err) => self.recover(path, err, None),
        }
    }

    /// The results packed into one item according to `wrapper`.
    #[allow(clippy::result_large_err)]
    pub fn query_wrapped(
        &self,
        path: &JsonPath,
        doc: &Value,
        wrapper: Wrapper,
        vars: &dyn Variables,
    ) -> JpqResult<Option<Value>> {
        let found = match self.collect(path, doc, vars) {
            Ok(found) => found,
            Err(err) => return self.recover(path, err, None),
        };

        let wrap = match wrapper {
            Wrapper::None if found.len() > 1 => {
                return Err(Error::from_error(path.to_string(), EvalError::MoreThanOneItem));
            }
            Wrapper::None => false,
            Wrapper::Unconditional => true,
            Wrapper::Conditional => match found.head() {
                Some(head) => found.len() > 1 || head.is_scalar(),
                None => false,
            },
        };

        if wrap {
            Ok(Some(Value::Array(found.into_values())))
        } else {
            Ok(found.into_iter().next().map(Cow::into_owned))
        }
    }

    /// The single scalar the path yields; a JSON null is no value.
    #[allow(clippy::result_large_err)]
    pub fn value(
        &self,
        path: &JsonPath,
        doc: &Value,
        vars: &dyn Variables,
    ) -> JpqResult<Option<Value>> {
        let found = match self.collect(path, doc, vars) {
            Ok(found) => found,
            Err(err) => return self.recover(path, err, None),
        };

        if found.len() > 1 {
            return Err(Error::from_error(path.to_string(), EvalError::MoreThanOneItem));
        }

        match found.into_single() {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(value) if value.is_scalar() => Ok(Some(value.into_owned())),
            Some(_) => self.recover(path, EvalError::ScalarRequired, None),
        }
    }
}
