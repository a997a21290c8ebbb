// Evaluation of compiled programs.
//
// Two entry points call each other: `eval` produces values into an optional
// sink and `eval_bool` decides predicates. Without a sink the caller only
// wants to know whether anything matched, so producers stop at the first hit.
use std::borrow::Cow;

use itertools::Either;

use crate::ast::Mode;
use crate::number::Number;
use crate::program::{JsonPath, Node, NodeKind};
use crate::value::Value;
use crate::variables::Variables;

pub mod arith;
pub mod combinator;
pub mod error;
pub mod methods;
pub mod predicate;
pub mod sequence;

use error::EvalError;
pub use predicate::Truth;
use sequence::ValueSeq;

/// Whether an evaluation matched anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    NotFound,
}

impl Outcome {
    pub fn is_found(self) -> bool {
        self == Outcome::Found
    }
}

/// Walks one program over one document.
///
/// Holds the state of a single evaluation; create a new one per call.
pub struct Evaluator<'a> {
    root: &'a Value,
    vars: &'a dyn Variables,
    lax: bool,
    /// Set while `.**` feeds its next steps, which never raise structural errors.
    ignore_structural_errors: bool,
    max_depth: u32,
    depth: u32,
    /// Size of the array whose subscripts are being evaluated, for `last`.
    innermost_array_size: Option<usize>,
    /// `@1` and `@2` of the enclosing fold functions, innermost last.
    arguments: Vec<[Cow<'a, Value>; 2]>,
}

impl<'a> Evaluator<'a> {
    pub fn new(mode: Mode, root: &'a Value, vars: &'a dyn Variables, max_depth: u32) -> Self {
        Self {
            root,
            vars,
            lax: mode.is_lax(),
            ignore_structural_errors: false,
            max_depth,
            depth: 0,
            innermost_array_size: None,
            arguments: Vec::new(),
        }
    }

    /// Evaluates `path` against the root document.
    ///
    /// Matches are appended to `found` when given; otherwise evaluation stops
    /// at the first match.
    pub fn run(
        &mut self,
        path: &JsonPath,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let root = self.root;
        self.eval(path.root(), Cow::Borrowed(root), found)
    }

    /// Decides `path` as a predicate against the root document.
    pub fn test(&mut self, path: &JsonPath) -> Result<Truth, EvalError> {
        let root = Cow::Borrowed(self.root);
        self.eval_bool(path.root(), &root)
    }

    #[inline(always)]
    fn enter_scope(&mut self) -> Result<(), EvalError> {
        if self.depth >= self.max_depth {
            return Err(EvalError::RecursionError(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    #[inline(always)]
    fn exit_scope(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn eval(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        self.enter_scope()?;

        let result = if self.lax && node.kind().unwraps_in_lax() && input.is_array() {
            self.eval_each(node, &input, found)
        } else {
            self.dispatch(node, input, found)
        };

        self.exit_scope();
        result
    }

    /// Applies `node` to every element of an array input.
    fn eval_each(
        &mut self,
        node: Node<'_>,
        input: &Cow<'a, Value>,
        mut found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let mut outcome = Outcome::NotFound;

        for item in elements(input) {
            if self.dispatch(node, item, found.as_deref_mut())?.is_found() {
                if found.is_none() {
                    return Ok(Outcome::Found);
                }
                outcome = Outcome::Found;
            }
        }

        Ok(outcome)
    }

    /// Evaluates `node` and gathers everything it produces.
    pub(crate) fn collect(
        &mut self,
        node: Node<'_>,
        input: &Cow<'a, Value>,
    ) -> Result<ValueSeq<'a>, EvalError> {
        let mut values = ValueSeq::new();
        self.eval(node, input.clone(), Some(&mut values))?;
        Ok(values)
    }

    /// Passes `value` on to the next step of `node`, or into `found` at the end of the chain.
    pub(crate) fn emit_next(
        &mut self,
        node: Node<'_>,
        value: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        match node.next() {
            Some(next) => self.eval(next, value, found),
            None => {
                if let Some(found) = found {
                    found.push(value);
                }
                Ok(Outcome::Found)
            }
        }
    }

    pub(crate) fn emit_all(
        &mut self,
        node: Node<'_>,
        values: impl IntoIterator<Item = Cow<'a, Value>>,
        mut found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let mut outcome = Outcome::NotFound;

        for value in values {
            if self.emit_next(node, value, found.as_deref_mut())?.is_found() {
                if found.is_none() {
                    return Ok(Outcome::Found);
                }
                outcome = Outcome::Found;
            }
        }

        Ok(outcome)
    }

    /// A structural mismatch fails only in strict mode.
    pub(crate) fn structural(&self, err: EvalError) -> Result<Outcome, EvalError> {
        if self.lax || self.ignore_structural_errors {
            Ok(Outcome::NotFound)
        } else {
            Err(err)
        }
    }

    fn dispatch(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        match node.kind() {
            NodeKind::Null => self.emit_next(node, Cow::Owned(Value::Null), found),
            NodeKind::Bool => self.emit_next(node, Cow::Owned(Value::Bool(node.as_bool())), found),
            NodeKind::Numeric => {
                self.emit_next(node, Cow::Owned(Value::Number(node.as_numeric())), found)
            }
            NodeKind::String => {
                self.emit_next(node, Cow::Owned(Value::from(node.as_str())), found)
            }
            NodeKind::Variable => self.eval_variable(node, found),
            NodeKind::Root => {
                let root = self.root;
                self.emit_next(node, Cow::Borrowed(root), found)
            }
            NodeKind::Current => self.emit_next(node, input, found),
            NodeKind::Last => self.eval_last(node, found),
            NodeKind::Argument => self.eval_argument(node, found),
            NodeKind::Key => self.eval_key(node, input, found),
            NodeKind::AnyKey => self.eval_any_key(node, input, found),
            NodeKind::AnyArray => self.eval_any_array(node, input, found),
            NodeKind::Index => self.eval_index(node, input, found),
            NodeKind::Any => self.eval_any(node, input, found),
            NodeKind::Filter => match self.eval_bool(node.arg(), &input)? {
                Truth::True => self.emit_next(node, input, found),
                Truth::False | Truth::Unknown(_) => Ok(Outcome::NotFound),
            },
            NodeKind::And
            | NodeKind::Or
            | NodeKind::Not
            | NodeKind::IsUnknown
            | NodeKind::Exists
            | NodeKind::Equal
            | NodeKind::NotEqual
            | NodeKind::Less
            | NodeKind::Greater
            | NodeKind::LessOrEqual
            | NodeKind::GreaterOrEqual
            | NodeKind::StartsWith => match self.predicate(node, &input)? {
                Truth::True => self.emit_next(node, Cow::Owned(Value::Bool(true)), found),
                Truth::False => Ok(Outcome::NotFound),
                Truth::Unknown(err) => Err(err),
            },
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Div | NodeKind::Mod => {
                self.eval_binary_arith(node, input, found)
            }
            NodeKind::Plus | NodeKind::Minus => self.eval_unary_arith(node, input, found),
            NodeKind::Type
            | NodeKind::Size
            | NodeKind::Abs
            | NodeKind::Floor
            | NodeKind::Ceiling
            | NodeKind::Double
            | NodeKind::KeyValue
            | NodeKind::Min
            | NodeKind::Max
            | NodeKind::Datetime => self.eval_method(node, input, found),
            NodeKind::Map => self.eval_map(node, input, found),
            NodeKind::Reduce => self.eval_reduce(node, input, found),
            NodeKind::Fold | NodeKind::FoldLeft | NodeKind::FoldRight => {
                self.eval_fold(node, input, found)
            }
            NodeKind::Array => self.eval_array(node, input, found),
            NodeKind::Object => self.eval_object(node, input, found),
            NodeKind::Sequence => self.eval_sequence(node, input, found),
        }
    }

    fn eval_variable(
        &mut self,
        node: Node<'_>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let vars = self.vars;
        let name = node.as_str();

        match vars.resolve(name) {
            Some(value) => self.emit_next(node, value, found),
            None => Err(EvalError::VariableNotFound(name.into())),
        }
    }

    fn eval_last(
        &mut self,
        node: Node<'_>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let size = self
            .innermost_array_size
            .ok_or(EvalError::Internal("`last` evaluated outside an array subscript"))?;
        let last = Number::from(size as i64 - 1);

        self.emit_next(node, Cow::Owned(Value::Number(last)), found)
    }

    fn eval_argument(
        &mut self,
        node: Node<'_>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let index = node.argument_index() as usize;
        let value = self
            .arguments
            .last()
            .and_then(|args| args.get(index.wrapping_sub(1)))
            .cloned()
            .ok_or(EvalError::Internal("`@N` evaluated outside a fold function"))?;

        self.emit_next(node, value, found)
    }

    fn eval_key(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let key = node.as_str();
        if input.as_object().is_none() {
            return self.structural(EvalError::ObjectRequired);
        }

        match child(&input, |v| v.get(key)) {
            Some(value) => self.emit_next(node, value, found),
            None => self.structural(EvalError::MemberNotFound(key.into())),
        }
    }

    fn eval_any_key(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        if input.as_object().is_none() {
            return self.structural(EvalError::ObjectRequired);
        }

        self.emit_all(node, members(&input), found)
    }

    fn eval_any_array(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        if input.is_array() {
            self.emit_all(node, elements(&input), found)
        } else if self.lax {
            self.emit_next(node, input, found)
        } else {
            self.structural(EvalError::ArrayRequired)
        }
    }

    fn eval_index(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let size = match &*input {
            Value::Array(items) => items.len(),
            _ if self.lax => 1,
            _ => return self.structural(EvalError::ArrayRequired),
        };

        let saved = self.innermost_array_size.replace(size);
        let result = self.eval_subscripts(node, &input, size, found);
        self.innermost_array_size = saved;
        result
    }

    fn eval_subscripts(
        &mut self,
        node: Node<'_>,
        input: &Cow<'a, Value>,
        size: usize,
        mut found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let mut outcome = Outcome::NotFound;

        for (from, to) in node.subscripts() {
            let from = self.collect(from, input)?;

            let member = self.lax && to.is_none() && from.len() == 1 && input.as_object().is_some();

            // lax mode reads `{"a": 1}["a"]` as a member access
            let result = if let (true, Some(Value::String(key))) = (member, from.head()) {
                self.emit_all(node, child(input, |v| v.get(key)), found.as_deref_mut())?
            } else {
                match self.subscript_range(from, to, input, size)? {
                    Some((start, end)) => self.emit_all(
                        node,
                        (start..=end).filter_map(|i| element(input, i)),
                        found.as_deref_mut(),
                    )?,
                    None => Outcome::NotFound,
                }
            };

            if result.is_found() {
                if found.is_none() {
                    return Ok(Outcome::Found);
                }
                outcome = Outcome::Found;
            }
        }

        Ok(outcome)
    }

    /// Resolves one subscript to an inclusive element range, clamped outside strict mode.
    fn subscript_range(
        &mut self,
        from: ValueSeq<'a>,
        to: Option<Node<'_>>,
        input: &Cow<'a, Value>,
        size: usize,
    ) -> Result<Option<(usize, usize)>, EvalError> {
        let from = array_index(from)?;
        let to = match to {
            Some(to) => array_index(self.collect(to, input)?)?,
            None => from,
        };
        let size = size as i64;

        if (from < 0 || from > to || to >= size) && !(self.lax || self.ignore_structural_errors) {
            return Err(EvalError::InvalidSubscript);
        }

        let from = from.max(0);
        let to = to.min(size - 1);
        Ok((from <= to).then_some((from as usize, to as usize)))
    }

    fn eval_any(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        mut found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let (first, last) = node.bounds();
        let mut outcome = Outcome::NotFound;

        if first == 0 {
            outcome = self.emit_tolerant(node, input.clone(), found.as_deref_mut())?;
            if outcome.is_found() && found.is_none() {
                return Ok(outcome);
            }
        }

        if last > 0 && self.descend(node, &input, found, 1, (first, last))?.is_found() {
            outcome = Outcome::Found;
        }

        Ok(outcome)
    }

    /// Visits the children of `container` at `level`, then their descendants, depth first.
    fn descend(
        &mut self,
        node: Node<'_>,
        container: &Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
        level: u32,
        bounds: (u32, u32),
    ) -> Result<Outcome, EvalError> {
        self.enter_scope()?;
        let result = self.descend_children(node, container, found, level, bounds);
        self.exit_scope();
        result
    }

    fn descend_children(
        &mut self,
        node: Node<'_>,
        container: &Cow<'a, Value>,
        mut found: Option<&mut ValueSeq<'a>>,
        level: u32,
        (first, last): (u32, u32),
    ) -> Result<Outcome, EvalError> {
        let children = match &**container {
            Value::Array(_) => Either::Left(elements(container)),
            Value::Object(_) => Either::Right(members(container)),
            _ => return Ok(Outcome::NotFound),
        };
        let mut outcome = Outcome::NotFound;

        for child in children {
            let mut matched = false;

            if level >= first {
                matched = self
                    .emit_tolerant(node, child.clone(), found.as_deref_mut())?
                    .is_found();
            }

            if level < last && !child.is_scalar() {
                matched |= self
                    .descend(node, &child, found.as_deref_mut(), level + 1, (first, last))?
                    .is_found();
            }

            if matched {
                outcome = Outcome::Found;
                if found.is_none() {
                    break;
                }
            }
        }

        Ok(outcome)
    }

    fn emit_tolerant(
        &mut self,
        node: Node<'_>,
        value: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let saved = std::mem::replace(&mut self.ignore_structural_errors, true);
        let result = self.emit_next(node, value, found);
        self.ignore_structural_errors = saved;
        result
    }
}

/// Reads a subscript value: a single number, truncated to an integer.
fn array_index(values: ValueSeq<'_>) -> Result<i64, EvalError> {
    match values.into_single().as_deref() {
        Some(Value::Number(n)) => n
            .to_index()
            .map(i64::from)
            .ok_or(EvalError::InvalidSubscript),
        _ => Err(EvalError::InvalidSubscript),
    }
}

/// A child of `parent`, borrowed from the document when the parent is.
pub(crate) fn child<'a>(
    parent: &Cow<'a, Value>,
    get: impl FnOnce(&Value) -> Option<&Value>,
) -> Option<Cow<'a, Value>> {
    match parent {
        Cow::Borrowed(value) => {
            let value: &'a Value = *value;
            get(value).map(Cow::Borrowed)
        }
        Cow::Owned(value) => get(value).cloned().map(Cow::Owned),
    }
}

/// Element `index` of an array; a non-array behaves as an array holding only itself.
fn element<'a>(value: &Cow<'a, Value>, index: usize) -> Option<Cow<'a, Value>> {
    if value.is_array() {
        child(value, |v| v.as_array().and_then(|items| items.get(index)))
    } else {
        (index == 0).then(|| value.clone())
    }
}

pub(crate) fn elements<'v, 'a>(
    value: &'v Cow<'a, Value>,
) -> impl DoubleEndedIterator<Item = Cow<'a, Value>> + 'v {
    match value {
        Cow::Borrowed(value) => {
            let value: &'a Value = *value;
            Either::Left(value.as_array().unwrap_or_default().iter().map(Cow::Borrowed))
        }
        Cow::Owned(value) => Either::Right(
            value
                .as_array()
                .unwrap_or_default()
                .iter()
                .map(|item| Cow::Owned(item.clone())),
        ),
    }
}

pub(crate) fn members<'v, 'a>(
    value: &'v Cow<'a, Value>,
) -> impl Iterator<Item = Cow<'a, Value>> + 'v {
    match value {
        Cow::Borrowed(value) => {
            let value: &'a Value = *value;
            Either::Left(value.as_object().into_iter().flat_map(|o| o.values()).map(Cow::Borrowed))
        }
        Cow::Owned(value) => Either::Right(
            value
                .as_object()
                .into_iter()
                .flat_map(|o| o.values())
                .map(|item| Cow::Owned(item.clone())),
        ),
    }
}
