//! Best-effort parsing of scale records into structured readings.
//!
//! Records are instrument-specific free text such as `ST,GS,+  0.178 kg`
//! or `US    12 g`. Parsing never fails: missing tokens fall back to
//! defaults and the original line is preserved verbatim.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Reading, Unit};

/// Signed decimal-point number, e.g. `+  0.178` or `12.5`.
fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+-]?\s*(\d+\.\d+)").expect("valid pattern"))
}

/// Signed bare run of digits, e.g. `12`.
fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+-]?\s*(\d+)").expect("valid pattern"))
}

/// First unit token anywhere in the line, case-insensitive.
fn unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(kg|g|lb|oz)").expect("valid pattern"))
}

/// Parses one record into a [`Reading`].
///
/// - Stability: a line is stable if it contains `ST`, or if it does not
///   contain `US`. A line with neither marker is stable by default; a
///   line with both is stable, since `ST` takes precedence.
/// - Value: the first decimal-point number wins; if there is none, the
///   line is retried with commas normalised to periods so locale-style
///   decimals like `3,5` are kept whole; a bare run of digits is the
///   last resort. The matched token is parsed as written, sign excluded,
///   and defaults to `0.0` when nothing matches.
/// - Unit: first of `kg`/`g`/`lb`/`oz`, case-insensitive, default `kg`.
#[must_use]
pub fn parse_reading(line: &str) -> Reading {
    let stable = line.contains("ST") || !line.contains("US");

    let value = extract_value(line).unwrap_or_else(|| {
        tracing::warn!(line, "no numeric token in record, defaulting to 0.0");
        0.0
    });

    let unit = unit_re()
        .find(line)
        .and_then(|m| Unit::from_token(m.as_str()))
        .unwrap_or_default();

    Reading {
        value,
        unit,
        stable,
        raw: line.to_owned(),
    }
}

fn extract_value(line: &str) -> Option<f64> {
    if let Some(caps) = decimal_re().captures(line) {
        return caps[1].parse().ok();
    }

    // Permissive pass for comma decimals ("3,5 kg"), checked before the
    // bare-integer pass so the fraction is not silently truncated.
    let normalized = line.replace(',', ".");
    if let Some(caps) = decimal_re().captures(&normalized) {
        tracing::debug!(line, "numeric token matched via comma fallback");
        return caps[1].parse().ok();
    }

    let caps = integer_re().captures(line)?;
    caps[1].parse().ok()
}
