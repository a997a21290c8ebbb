use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

/// Arbitrary-precision decimal used for every numeric item and literal.
///
/// Arithmetic is checked: every operation returns `None` instead of
/// silently overflowing, so callers can report a numeric error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Number(Decimal);

impl Number {
    pub const ZERO: Number = Number(Decimal::ZERO);
    pub const ONE: Number = Number(Decimal::ONE);

    /// Creates a new `Number` from a `Decimal`.
    pub fn new(value: Decimal) -> Self {
        Number(value)
    }

    /// Returns the underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Converts an `f64`, rejecting NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() {
            Decimal::from_f64(value).map(Number)
        } else {
            None
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.0.to_f64()
    }

    /// Truncates toward zero and narrows to an `i32` subscript.
    pub fn to_index(&self) -> Option<i32> {
        self.0.trunc().to_i32()
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    /// Returns `true` if the number has no fractional part.
    pub fn is_int(&self) -> bool {
        self.0.fract().is_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Number(self.0.abs())
    }

    pub fn floor(&self) -> Self {
        Number(self.0.floor())
    }

    pub fn ceil(&self) -> Self {
        Number(self.0.ceil())
    }

    pub fn neg(&self) -> Self {
        Number(-self.0)
    }

    pub fn checked_add(&self, other: Number) -> Option<Self> {
        self.0.checked_add(other.0).map(Number)
    }

    pub fn checked_sub(&self, other: Number) -> Option<Self> {
        self.0.checked_sub(other.0).map(Number)
    }

    pub fn checked_mul(&self, other: Number) -> Option<Self> {
        self.0.checked_mul(other.0).map(Number)
    }

    /// Division; `None` on overflow. Division by zero must be checked by the caller.
    pub fn checked_div(&self, other: Number) -> Option<Self> {
        self.0.checked_div(other.0).map(Number)
    }

    /// Remainder with the sign of the dividend.
    pub fn checked_rem(&self, other: Number) -> Option<Self> {
        self.0.checked_rem(other.0).map(Number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid number `{0}`")]
pub struct ParseNumberError(pub String);

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = if s.contains(['e', 'E']) {
            Decimal::from_scientific(&s.to_ascii_lowercase())
        } else {
            Decimal::from_str(s)
        };

        decimal
            .map(Number)
            .map_err(|_| ParseNumberError(s.to_string()))
    }
}

impl From<Decimal> for Number {
    fn from(value: Decimal) -> Self {
        Number(value)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(Decimal::from(value))
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number(Decimal::from(value))
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number(Decimal::from(value))
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number(Decimal::from(value))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn num(s: &str) -> Number {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("42", "42")]
    #[case("42.123", "42.123")]
    #[case("1.50", "1.50")]
    #[case("-42", "-42")]
    #[case("0", "0")]
    #[case("1e3", "1000")]
    #[case("2.5E-1", "0.25")]
    fn test_parse_and_display(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(num(input).to_string(), expected);
    }

    #[rstest]
    #[case("abc")]
    #[case("1.2.3")]
    #[case("")]
    fn test_parse_invalid(#[case] input: &str) {
        assert_eq!(
            input.parse::<Number>(),
            Err(ParseNumberError(input.to_string()))
        );
    }

    #[rstest]
    #[case("5", "2", "7", "3", "10", "2.5", "1")]
    #[case("-5", "2", "-3", "-7", "-10", "-2.5", "-1")]
    #[case("0", "1", "1", "-1", "0", "0", "0")]
    #[case("0.1", "0.2", "0.3", "-0.1", "0.02", "0.5", "0.1")]
    fn test_operations(
        #[case] a: &str,
        #[case] b: &str,
        #[case] add_result: &str,
        #[case] sub_result: &str,
        #[case] mul_result: &str,
        #[case] div_result: &str,
        #[case] rem_result: &str,
    ) {
        let (a, b) = (num(a), num(b));

        assert_eq!(a.checked_add(b).unwrap(), num(add_result));
        assert_eq!(a.checked_sub(b).unwrap(), num(sub_result));
        assert_eq!(a.checked_mul(b).unwrap(), num(mul_result));
        assert_eq!(a.checked_div(b).unwrap(), num(div_result));
        assert_eq!(a.checked_rem(b).unwrap(), num(rem_result));
    }

    #[test]
    fn test_overflow_is_none() {
        let max = Number::new(Decimal::MAX);
        assert_eq!(max.checked_add(Number::ONE), None);
        assert_eq!(max.checked_mul(num("2")), None);
    }

    #[rstest]
    #[case("1.7", "1", "2", "1.7", 1)]
    #[case("-1.7", "-2", "-1", "1.7", -1)]
    #[case("3", "3", "3", "3", 3)]
    fn test_rounding(
        #[case] input: &str,
        #[case] floor: &str,
        #[case] ceil: &str,
        #[case] abs: &str,
        #[case] index: i32,
    ) {
        let n = num(input);
        assert_eq!(n.floor(), num(floor));
        assert_eq!(n.ceil(), num(ceil));
        assert_eq!(n.abs(), num(abs));
        assert_eq!(n.to_index(), Some(index));
    }

    #[rstest]
    #[case("1.0", "1.00", true)]
    #[case("2", "10", false)]
    fn test_numeric_equality(#[case] a: &str, #[case] b: &str, #[case] equal: bool) {
        assert_eq!(num(a) == num(b), equal);
        assert_eq!(num(a) < num(b), !equal);
    }

    #[rstest]
    #[case(1.5, Some("1.5"))]
    #[case(f64::NAN, None)]
    #[case(f64::INFINITY, None)]
    fn test_from_f64(#[case] input: f64, #[case] expected: Option<&str>) {
        assert_eq!(Number::from_f64(input), expected.map(num));
    }

    #[rstest]
    #[case("2", true)]
    #[case("2.0", true)]
    #[case("2.5", false)]
    fn test_is_int(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(num(input).is_int(), expected);
    }
}
