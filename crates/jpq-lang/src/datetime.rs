use std::cmp::Ordering;
use std::fmt;

use chrono::format::{Parsed, StrftimeItems};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::number::Number;

/// Templates tried in order when `.datetime()` has no explicit template.
pub const DEFAULT_TEMPLATES: &[&str] = &[
    "yyyy-mm-dd HH24:MI:SS TZH:TZM",
    "yyyy-mm-dd\"T\"HH24:MI:SSTZH:TZM",
    "yyyy-mm-dd HH24:MI:SS TZH",
    "yyyy-mm-dd\"T\"HH24:MI:SSTZH",
    "yyyy-mm-dd HH24:MI:SS",
    "yyyy-mm-dd\"T\"HH24:MI:SS",
    "yyyy-mm-dd",
    "HH24:MI:SS TZH:TZM",
    "HH24:MI:SSTZH:TZM",
    "HH24:MI:SS TZH",
    "HH24:MI:SS",
];

/// Template fields and their strftime equivalents, longest match first.
const TEMPLATE_FIELDS: &[(&str, &str)] = &[
    ("TZH:TZM", "%#z"),
    ("HH24", "%H"),
    ("HH12", "%I"),
    ("YYYY", "%Y"),
    ("TZH", "%#z"),
    ("HH", "%I"),
    ("MM", "%m"),
    ("MI", "%M"),
    ("MS", "%3f"),
    ("US", "%6f"),
    ("DD", "%d"),
    ("SS", "%S"),
    ("AM", "%p"),
    ("PM", "%p"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DateTime {
    Date(NaiveDate),
    Time(NaiveTime),
    TimeTz(NaiveTime, FixedOffset),
    Timestamp(NaiveDateTime),
    TimestampTz(chrono::DateTime<FixedOffset>),
}

impl DateTime {
    pub fn type_name(&self) -> &'static str {
        match self {
            DateTime::Date(_) => "date",
            DateTime::Time(_) => "time without time zone",
            DateTime::TimeTz(_, _) => "time with time zone",
            DateTime::Timestamp(_) => "timestamp without time zone",
            DateTime::TimestampTz(_) => "timestamp with time zone",
        }
    }

    /// Orders two values of the same kind; values of different kinds are incomparable.
    pub fn compare(&self, other: &DateTime) -> Option<Ordering> {
        match (self, other) {
            (DateTime::Date(a), DateTime::Date(b)) => Some(a.cmp(b)),
            (DateTime::Time(a), DateTime::Time(b)) => Some(a.cmp(b)),
            (DateTime::TimeTz(a, a_offset), DateTime::TimeTz(b, b_offset)) => Some(
                to_utc_time(a, a_offset)
                    .cmp(&to_utc_time(b, b_offset))
                    .then_with(|| a_offset.local_minus_utc().cmp(&b_offset.local_minus_utc())),
            ),
            (DateTime::Timestamp(a), DateTime::Timestamp(b)) => Some(a.cmp(b)),
            (DateTime::TimestampTz(a), DateTime::TimestampTz(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Interprets a number as seconds since the Unix epoch, in UTC.
    pub fn from_epoch(seconds: &Number) -> Option<DateTime> {
        let value = seconds.value();
        let whole = value.floor();
        let nanos = ((value - whole) * Decimal::from(1_000_000_000))
            .trunc()
            .to_u32()?;
        let utc = chrono::DateTime::from_timestamp(whole.to_i64()?, nanos)?;
        Some(DateTime::TimestampTz(utc.fixed_offset()))
    }

    /// Parses `input` with `template`, or with each of [`DEFAULT_TEMPLATES`] in turn.
    pub fn parse(input: &str, template: Option<&str>) -> Option<DateTime> {
        match template {
            Some(template) => parse_with_template(input, template),
            None => DEFAULT_TEMPLATES
                .iter()
                .find_map(|template| parse_with_template(input, template)),
        }
    }
}

fn to_utc_time(time: &NaiveTime, offset: &FixedOffset) -> NaiveTime {
    time.overflowing_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
        .0
}

fn parse_with_template(input: &str, template: &str) -> Option<DateTime> {
    let format = compile_template(template)?;
    let mut parsed = Parsed::new();
    chrono::format::parse(&mut parsed, input, StrftimeItems::new(&format)).ok()?;

    let date = parsed.to_naive_date().ok();
    let time = parsed.to_naive_time().ok();
    let offset = parsed.to_fixed_offset().ok();

    match (date, time, offset) {
        (Some(date), None, None) => Some(DateTime::Date(date)),
        (None, Some(time), None) => Some(DateTime::Time(time)),
        (None, Some(time), Some(offset)) => Some(DateTime::TimeTz(time, offset)),
        (Some(date), Some(time), None) => Some(DateTime::Timestamp(date.and_time(time))),
        (Some(date), Some(time), Some(offset)) => offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(DateTime::TimestampTz),
        _ => None,
    }
}

/// Translates a template such as `yyyy-mm-dd HH24:MI:SS` into a strftime format.
fn compile_template(template: &str) -> Option<String> {
    let mut format = String::with_capacity(template.len() * 2);
    let mut rest = template;

    'outer: while let Some(c) = rest.chars().next() {
        if c == '"' {
            let end = rest[1..].find('"')?;
            push_literal(&mut format, &rest[1..end + 1]);
            rest = &rest[end + 2..];
            continue;
        }

        for (field, spec) in TEMPLATE_FIELDS {
            if rest.len() >= field.len()
                && rest.is_char_boundary(field.len())
                && rest[..field.len()].eq_ignore_ascii_case(field)
            {
                format.push_str(spec);
                rest = &rest[field.len()..];
                continue 'outer;
            }
        }

        if c.is_ascii_alphabetic() && !matches!(c, 'T' | 't') {
            return None;
        }

        push_literal(&mut format, &rest[..c.len_utf8()]);
        rest = &rest[c.len_utf8()..];
    }

    Some(format)
}

fn push_literal(format: &mut String, text: &str) {
    for c in text.chars() {
        if c == '%' {
            format.push_str("%%");
        } else {
            format.push(c);
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTime::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DateTime::Time(time) => write!(f, "{}", time.format("%H:%M:%S%.f")),
            DateTime::TimeTz(time, offset) => {
                write!(f, "{}{}", time.format("%H:%M:%S%.f"), offset)
            }
            DateTime::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
            DateTime::TimestampTz(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f%:z")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::date("2017-03-10", None, "date", "2017-03-10")]
    #[case::timestamp("2017-03-10 12:34:56", None, "timestamp without time zone", "2017-03-10T12:34:56")]
    #[case::timestamp_iso("2017-03-10T12:34:56", None, "timestamp without time zone", "2017-03-10T12:34:56")]
    #[case::timestamptz(
        "2017-03-10 12:34:56 +03:00",
        None,
        "timestamp with time zone",
        "2017-03-10T12:34:56+03:00"
    )]
    #[case::timestamptz_iso(
        "2017-03-10T12:34:56+03:00",
        None,
        "timestamp with time zone",
        "2017-03-10T12:34:56+03:00"
    )]
    #[case::timestamptz_hours_only(
        "2017-03-10 12:34:56 +03",
        None,
        "timestamp with time zone",
        "2017-03-10T12:34:56+03:00"
    )]
    #[case::time("12:34:56", None, "time without time zone", "12:34:56")]
    #[case::timetz("12:34:56 +05:30", None, "time with time zone", "12:34:56+05:30")]
    #[case::template("10.03.2017", Some("dd.mm.yyyy"), "date", "2017-03-10")]
    #[case::template_literal(
        "2017 at 09:05",
        Some("yyyy \"at\" HH24:MI"),
        "time without time zone",
        "09:05:00"
    )]
    fn test_parse(
        #[case] input: &str,
        #[case] template: Option<&str>,
        #[case] type_name: &str,
        #[case] display: &str,
    ) {
        let value = DateTime::parse(input, template).unwrap();
        assert_eq!(value.type_name(), type_name);
        assert_eq!(value.to_string(), display);
    }

    #[rstest]
    #[case::garbage("not a date", None)]
    #[case::wrong_template("2017-03-10", Some("HH24:MI"))]
    #[case::unknown_field("2017", Some("YYYY Q"))]
    #[case::bad_day("2017-02-30", None)]
    fn test_parse_failure(#[case] input: &str, #[case] template: Option<&str>) {
        assert_eq!(DateTime::parse(input, template), None);
    }

    #[rstest]
    #[case::zero("0", "1970-01-01T00:00:00+00:00")]
    #[case::fraction("1.5", "1970-01-01T00:00:01.500+00:00")]
    #[case::negative("-1", "1969-12-31T23:59:59+00:00")]
    fn test_from_epoch(#[case] seconds: &str, #[case] expected: &str) {
        let value = DateTime::from_epoch(&seconds.parse().unwrap()).unwrap();
        assert_eq!(value.to_string(), expected);
    }

    #[rstest]
    #[case::dates("2017-03-10", "2017-03-11", Some(Ordering::Less))]
    #[case::same_instant(
        "2017-03-10 12:00:00 +03:00",
        "2017-03-10 09:00:00 +00:00",
        Some(Ordering::Equal)
    )]
    #[case::time_zones("12:00:00 +03:00", "10:00:00 +00:00", Some(Ordering::Less))]
    #[case::mixed_kinds("2017-03-10", "12:00:00", None)]
    fn test_compare(#[case] a: &str, #[case] b: &str, #[case] expected: Option<Ordering>) {
        let a = DateTime::parse(a, None).unwrap();
        let b = DateTime::parse(b, None).unwrap();
        assert_eq!(a.compare(&b), expected);
    }
}
