use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("Invalid duration '{0}'")]
    Invalid(String),
    #[error("Missing unit in duration '{0}' (expected one of ns, us, ms, s, m, h)")]
    MissingUnit(String),
    #[error("Unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },
    #[error("Duration '{0}' must be greater than zero")]
    NotPositive(String),
    #[error("Duration '{0}' is too large")]
    Overflow(String),
}

const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
];

/// Parse an interval such as `30s`, `1m`, `1.5h` or `1h30m`.
///
/// Every number needs a unit (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`); decimals and
/// compound values are accepted. Zero and negative intervals are rejected since
/// a ticker cannot fire at them.
pub fn parse_interval(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }
    if s.starts_with('-') {
        return Err(DurationError::NotPositive(input.to_string()));
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let (whole, frac) = split_number(number).ok_or_else(|| DurationError::Invalid(input.to_string()))?;

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| DurationError::UnknownUnit {
                unit: unit.to_string(),
                input: input.to_string(),
            })?;

        let overflow = || DurationError::Overflow(input.to_string());
        let whole_nanos = whole.checked_mul(scale).ok_or_else(overflow)?;
        let frac_nanos = fraction_nanos(frac, scale);
        total_nanos = total_nanos
            .checked_add(whole_nanos)
            .and_then(|t| t.checked_add(frac_nanos))
            .ok_or_else(overflow)?;
    }

    if total_nanos == 0 {
        return Err(DurationError::NotPositive(input.to_string()));
    }
    let secs = u64::try_from(total_nanos / 1_000_000_000)
        .map_err(|_| DurationError::Overflow(input.to_string()))?;
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Split `"1.25"` into `(1, "25")`. At least one digit must be present.
fn split_number(number: &str) -> Option<(u128, &str)> {
    let (whole, frac) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.contains('.') {
        return None;
    }
    let whole = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().ok()?
    };
    Some((whole, frac))
}

/// Nanoseconds contributed by the digits after the decimal point.
fn fraction_nanos(frac: &str, scale: u128) -> u128 {
    let mut nanos: u128 = 0;
    let mut divisor: u128 = 1;
    for digit in frac.bytes().take(18) {
        divisor *= 10;
        nanos += u128::from(digit - b'0') * scale / divisor;
    }
    nanos
}
