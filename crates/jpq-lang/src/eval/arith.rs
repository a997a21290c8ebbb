use std::borrow::Cow;

use crate::number::Number;
use crate::program::{Node, NodeKind};
use crate::value::Value;

use super::error::EvalError;
use super::sequence::ValueSeq;
use super::{Evaluator, Outcome};

impl<'a> Evaluator<'a> {
    /// `+ - * / %`: each operand must yield exactly one number.
    ///
    /// Lax mode unwraps array operands of `*`, `/` and `%` only.
    pub(crate) fn eval_binary_arith(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let kind = node.kind();
        let unwrap = self.lax && matches!(kind, NodeKind::Mul | NodeKind::Div | NodeKind::Mod);

        let mut left = self.collect(node.left(), &input)?;
        let mut right = self.collect(node.right(), &input)?;
        if unwrap {
            left = left.unwrap_arrays();
            right = right.unwrap_arrays();
        }

        let left = single_number(left)?;
        let right = single_number(right)?;

        let result = match kind {
            NodeKind::Add => left.checked_add(right),
            NodeKind::Sub => left.checked_sub(right),
            NodeKind::Mul => left.checked_mul(right),
            NodeKind::Div | NodeKind::Mod if right.is_zero() => {
                return Err(EvalError::DivisionByZero);
            }
            NodeKind::Div => left.checked_div(right),
            NodeKind::Mod => left.checked_rem(right),
            _ => return Err(EvalError::Internal("not an arithmetic operator")),
        }
        .ok_or(EvalError::NumericOverflow)?;

        self.emit_next(node, Cow::Owned(Value::Number(result)), found)
    }

    /// Unary `+` and `-`, applied to every item of the operand.
    pub(crate) fn eval_unary_arith(
        &mut self,
        node: Node<'_>,
        input: Cow<'a, Value>,
        mut found: Option<&mut ValueSeq<'a>>,
    ) -> Result<Outcome, EvalError> {
        let mut values = self.collect(node.arg(), &input)?;
        if self.lax {
            values = values.unwrap_arrays();
        }

        let mut outcome = Outcome::NotFound;

        for value in values {
            let number = match &*value {
                Value::Number(n) => *n,
                // only an existence check, so non-numbers are skipped
                _ if found.is_none() && !node.has_next() => continue,
                _ => return Err(EvalError::NumberNotFound),
            };
            let number = if node.kind() == NodeKind::Minus {
                number.neg()
            } else {
                number
            };

            if self
                .emit_next(node, Cow::Owned(Value::Number(number)), found.as_deref_mut())?
                .is_found()
            {
                if found.is_none() {
                    return Ok(Outcome::Found);
                }
                outcome = Outcome::Found;
            }
        }

        Ok(outcome)
    }
}

fn single_number(values: ValueSeq<'_>) -> Result<Number, EvalError> {
    if values.len() != 1 {
        return Err(EvalError::SingletonRequired);
    }

    match values.head() {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(EvalError::NonNumericItem),
    }
}
