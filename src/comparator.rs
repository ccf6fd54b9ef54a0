//! Scalar value comparators.
//!
//! Each comparator decides whether an expected and an actual value match
//! under one semantic type. Amount and date comparators normalise both
//! sides first and fall back to plain string equality when a side cannot
//! be parsed, so a comparison never fails.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::borrow::Cow;
use tracing::debug;

/// Two amounts closer than this are considered equal.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// Characters removed from amount strings before parsing.
const AMOUNT_NOISE: &[char] = &[',', '¥', '￥', '$', '€', '£'];

/// Date-only formats, tried in order. The first one that parses wins, so
/// `05/04/2024` is always read as May 4th.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y年%m月%d日",
    "%m/%d/%Y",
    "%d/%m/%Y",
];

/// Date-time formats tried after the date-only ones; the time is discarded.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Comparison strategy for a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    /// Trimmed, case-insensitive string equality.
    Text,
    /// Numeric equality within [`AMOUNT_TOLERANCE`].
    Amount,
    /// Calendar-date equality.
    Date,
}

/// Outcome of a single comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub matched: bool,
    /// Parsed values or fallback diagnostics, if the comparator produced any.
    pub details: Option<Map<String, Value>>,
}

impl Comparison {
    fn plain(matched: bool) -> Self {
        Self {
            matched,
            details: None,
        }
    }
}

impl Comparator {
    /// Whether the two values match under this comparator.
    pub fn matches(&self, expected: &Value, actual: &Value) -> bool {
        self.compare(expected, actual).matched
    }

    /// Compare two values, keeping any diagnostics for the result details.
    ///
    /// Two nulls always match; a single null never does.
    pub fn compare(&self, expected: &Value, actual: &Value) -> Comparison {
        match (expected.is_null(), actual.is_null()) {
            (true, true) => return Comparison::plain(true),
            (true, false) | (false, true) => return Comparison::plain(false),
            (false, false) => {}
        }

        match self {
            Comparator::Text => {
                Comparison::plain(normalize_text(expected) == normalize_text(actual))
            }
            Comparator::Amount => compare_amounts(expected, actual),
            Comparator::Date => compare_dates(expected, actual),
        }
    }

    /// Lowercase name, as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Comparator::Text => "text",
            Comparator::Amount => "amount",
            Comparator::Date => "date",
        }
    }
}

/// Render a value the way it would be printed, without JSON quoting for strings.
pub fn render(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn normalize_text(value: &Value) -> String {
    render(value).trim().to_lowercase()
}

fn raw_equal(expected: &Value, actual: &Value) -> bool {
    render(expected).trim() == render(actual).trim()
}

/// Parse an amount, accepting JSON numbers and strings such as `"¥1,000"`.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| !AMOUNT_NOISE.contains(c)).collect();
            cleaned.trim().parse::<f64>().ok()
        }
        _ => None,
    }?;

    amount.is_finite().then_some(amount)
}

/// Parse a date with the fixed format list, dropping any time of day.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

fn compare_amounts(expected: &Value, actual: &Value) -> Comparison {
    match (parse_amount(expected), parse_amount(actual)) {
        (Some(e), Some(a)) => Comparison {
            matched: (e - a).abs() < AMOUNT_TOLERANCE,
            details: into_object(json!({
                "comparator": "amount",
                "expected_parsed": e,
                "actual_parsed": a,
            })),
        },
        (e, a) => fallback(Comparator::Amount, expected, actual, e.is_none(), a.is_none()),
    }
}

fn compare_dates(expected: &Value, actual: &Value) -> Comparison {
    match (parse_date(expected), parse_date(actual)) {
        (Some(e), Some(a)) => Comparison {
            matched: e == a,
            details: into_object(json!({
                "comparator": "date",
                "expected_parsed": e.format("%Y-%m-%d").to_string(),
                "actual_parsed": a.format("%Y-%m-%d").to_string(),
            })),
        },
        (e, a) => fallback(Comparator::Date, expected, actual, e.is_none(), a.is_none()),
    }
}

fn fallback(
    comparator: Comparator,
    expected: &Value,
    actual: &Value,
    expected_failed: bool,
    actual_failed: bool,
) -> Comparison {
    let unparsed: Vec<&str> = [("expected", expected_failed), ("actual", actual_failed)]
        .into_iter()
        .filter_map(|(side, failed)| failed.then_some(side))
        .collect();

    debug!(
        comparator = comparator.name(),
        ?unparsed,
        "parse failed, falling back to string comparison"
    );

    Comparison {
        matched: raw_equal(expected, actual),
        details: into_object(json!({
            "comparator": comparator.name(),
            "fallback": "string",
            "unparsed": unparsed,
        })),
    }
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
