//! Pure string/number normalization applied while assembling feed rows:
//! unit suffix stripping, timestamp token substitution, offset splitting,
//! range splitting, and sentinel coercion.

use crate::feeds::error::FeedError;
use chrono::NaiveDateTime;

/// Rain reported as measurable but below instrument resolution. Coerced to
/// a small positive value so it stays distinct from "no rain" downstream.
const TRACE_SENTINEL: &str = "Tce";
const TRACE_VALUE: f64 = 0.01;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Splits a local timestamp off its trailing UTC-offset suffix
/// (`2024-01-05T17:00:00+10:30` → `("2024-01-05T17:00:00", "+10:30")`).
pub fn split_utc_offset(value: &str) -> Option<(&str, &str)> {
    if value.len() < 6 || !value.is_char_boundary(value.len() - 6) {
        return None;
    }
    let (head, tail) = value.split_at(value.len() - 6);
    let bytes = tail.as_bytes();
    let looks_like_offset = (bytes[0] == b'+' || bytes[0] == b'-')
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b':'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit();
    looks_like_offset.then_some((head, tail))
}

/// Replaces the `T` date/time separator with a space and drops a trailing
/// UTC `Z` marker, yielding `YYYY-MM-DD HH:MM:SS`.
pub fn normalize_timestamp(value: &str) -> String {
    value.trim_end_matches('Z').replacen('T', " ", 1)
}

/// Parses an already-normalized timestamp. Local columns carry no zone
/// suffix; UTC columns are naive-but-known-UTC.
pub fn parse_timestamp(column: &'static str, value: &str) -> Result<NaiveDateTime, FeedError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| {
        FeedError::TimestampParse {
            column,
            value: value.to_string(),
            source,
        }
    })
}

/// Substitutes tokens and parses in one step, for raw feed timestamps.
pub fn parse_feed_timestamp(column: &'static str, raw: &str) -> Result<NaiveDateTime, FeedError> {
    parse_timestamp(column, &normalize_timestamp(raw))
}

/// Strips a `%` suffix and coerces to a number in [0, 100].
pub fn parse_percentage(column: &'static str, value: &str) -> Result<f64, FeedError> {
    let stripped = value.trim().trim_end_matches('%').trim();
    let number: f64 = stripped.parse().map_err(|_| FeedError::MalformedValue {
        column,
        value: value.to_string(),
        reason: "expected a percentage".to_string(),
    })?;
    if !(0.0..=100.0).contains(&number) {
        return Err(FeedError::MalformedValue {
            column,
            value: value.to_string(),
            reason: "percentage outside [0, 100]".to_string(),
        });
    }
    Ok(number)
}

fn parse_millimetres(column: &'static str, value: &str) -> Result<f64, FeedError> {
    let stripped = value.trim().trim_end_matches("mm").trim();
    let number: f64 = stripped.parse().map_err(|_| FeedError::MalformedValue {
        column,
        value: value.to_string(),
        reason: "expected a millimetre amount".to_string(),
    })?;
    if number < 0.0 {
        return Err(FeedError::MalformedValue {
            column,
            value: value.to_string(),
            reason: "negative amount".to_string(),
        });
    }
    Ok(number)
}

/// Splits a precipitation range (`"1 mm to 5 mm"`) into lower/upper bounds.
///
/// A single bound with no range means "zero, exactly" and is rewritten to
/// an explicit `0 to 0` range first, so the split never yields a null
/// lower bound for the all-zero case.
pub fn split_precipitation_range(
    column: &'static str,
    value: &str,
) -> Result<(f64, f64), FeedError> {
    let rewritten = if value.contains(" to ") {
        value.to_string()
    } else {
        format!("{value} to {value}")
    };
    let mut bounds = rewritten.splitn(2, " to ");
    // splitn(2, ..) always yields at least one piece; the rewrite guarantees two.
    let lower = bounds.next().unwrap_or_default();
    let upper = bounds.next().unwrap_or_default();
    Ok((
        parse_millimetres(column, lower)?,
        parse_millimetres(column, upper)?,
    ))
}

/// Coerces a plain numeric field to f64.
pub fn parse_number(column: &'static str, value: &str) -> Result<f64, FeedError> {
    value
        .trim()
        .parse()
        .map_err(|_| FeedError::MalformedValue {
            column,
            value: value.to_string(),
            reason: "expected a number".to_string(),
        })
}

/// Coerces a bulletin measurement to f64. Trace rainfall maps to
/// [`TRACE_VALUE`] rather than 0.
pub fn parse_measurement(column: &'static str, value: &str) -> Result<f64, FeedError> {
    if value.trim() == TRACE_SENTINEL {
        return Ok(TRACE_VALUE);
    }
    parse_number(column, value)
}

/// Leading token of an area code up to its first underscore
/// (`NSW_PT131` → `NSW`).
pub fn state_from_area_id(area_id: &str) -> &str {
    area_id.split('_').next().unwrap_or(area_id)
}

/// Product id from the feed's published filename, extension stripped.
pub fn product_id_from_filename(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}
