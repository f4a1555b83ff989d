//! Timestamp parsing, store-native encoding and delta arithmetic.
//!
//! Producers write timestamps in several human-readable shapes. Parsing tries a
//! fixed, ordered list of candidates and the first one that matches wins; a
//! value no candidate accepts is simply `None`.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;

/// Display format the store renders timestamps in.
pub const RENDER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text patterns accepted on read, in priority order.
pub const TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%b %d, %Y, %I:%M:%S %p",
    "%b %d, %Y, %I:%M %p",
];

type Candidate = fn(&str) -> Option<NaiveDateTime>;

/// Every candidate parser, tried in order.
const CANDIDATES: &[Candidate] = &[parse_native, parse_text];

fn native_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^=DATE\((\d{1,4}),(\d{1,2}),(\d{1,2})\)\+TIME\((\d{1,2}),(\d{1,2}),(\d{1,2})\)$")
            .expect("static regex")
    })
}

/// Parse a `=DATE(y,m,d)+TIME(h,m,s)` expression.
fn parse_native(raw: &str) -> Option<NaiveDateTime> {
    let caps = native_pattern().captures(raw)?;
    let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    let date = NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?)?;
    date.and_hms_opt(num(4)?, num(5)?, num(6)?)
}

fn parse_text(raw: &str) -> Option<NaiveDateTime> {
    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse a cell value as a timestamp.
#[must_use]
pub fn parse(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    CANDIDATES.iter().find_map(|candidate| candidate(trimmed))
}

/// Encode a timestamp as a live date/time expression the store evaluates.
///
/// Sub-second precision is dropped.
#[must_use]
pub fn encode_native(dt: NaiveDateTime) -> String {
    format!(
        "=DATE({},{},{})+TIME({},{},{})",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

/// Render a timestamp the way the store displays it.
#[must_use]
pub fn render(dt: NaiveDateTime) -> String {
    dt.format(RENDER_FORMAT).to_string()
}

/// `start + hours`, truncated to whole seconds.
#[must_use]
pub fn add_hours(start: NaiveDateTime, hours: f64) -> NaiveDateTime {
    let micros = (hours * 3_600_000_000.0).round() as i64;
    let shifted = start + Duration::microseconds(micros);
    shifted.with_nanosecond(0).unwrap_or(shifted)
}

/// Round half away from zero to `digits` decimal places.
#[must_use]
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

/// Elapsed hours from `earlier` to `later`, rounded to two decimals.
///
/// This is the value the delta formula evaluates to.
#[must_use]
pub fn hours_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    let millis = (later - earlier).num_milliseconds() as f64;
    round_to(millis / 3_600_000.0, 2)
}

/// Display text for an evaluated delta.
#[must_use]
pub fn format_hours(hours: f64) -> String {
    format!("{hours}")
}

/// Parse a numeric cell value. Blank, text and error cells yield `None`.
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}
