//! Parsing user-supplied unlock times

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Largest timestamp a JavaScript `Date` can hold, in either direction.
pub const MAX_TIMESTAMP_MS: i64 = 8_640_000_000_000_000;

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an absolute unlock time into epoch milliseconds.
///
/// Accepts RFC 3339 (`2026-12-24T18:00:00+01:00`) or a local wall-clock time
/// without offset (`2026-12-24T18:00`), the shape a datetime picker produces.
pub fn parse_at(input: &str) -> Result<i64> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return in_range(dt.timestamp_millis());
    }

    for fmt in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            let local = Local
                .from_local_datetime(&naive)
                .earliest()
                .with_context(|| format!("{input} does not exist in the local time zone"))?;
            return in_range(local.timestamp_millis());
        }
    }

    bail!("unrecognised time {input:?}: use RFC 3339 or YYYY-MM-DDTHH:MM")
}

/// The unlock time `duration_ms` after `now`.
pub fn unlock_after(now: i64, duration_ms: i64) -> Result<i64> {
    now.checked_add(duration_ms)
        .context("unlock time out of range")
        .and_then(in_range)
}

fn in_range(ms: i64) -> Result<i64> {
    if !(-MAX_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&ms) {
        bail!("unlock time out of range");
    }
    Ok(ms)
}

/// Parse a relative duration such as `90s`, `45m`, `2h30m` or `3d` into milliseconds.
pub fn parse_duration_ms(input: &str) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty duration");
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit_ms = match c {
            's' => 1_000,
            'm' => 60_000,
            'h' => 3_600_000,
            'd' => 86_400_000,
            _ => bail!("unknown duration unit {c:?} in {input:?}"),
        };
        if digits.is_empty() {
            bail!("missing number before {c:?} in {input:?}");
        }
        let n: i64 = digits
            .parse()
            .with_context(|| format!("duration number too large in {input:?}"))?;
        total = n
            .checked_mul(unit_ms)
            .and_then(|ms| total.checked_add(ms))
            .with_context(|| format!("duration {input:?} overflows"))?;
        digits.clear();
    }

    if !digits.is_empty() {
        bail!("missing unit after {digits} in {input:?} (use s, m, h or d)");
    }
    Ok(total)
}

/// Epoch milliseconds as a local timestamp for display.
pub fn display_local(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{ms} ms"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(parse_at("1970-01-01T00:00:01Z").unwrap(), 1_000);
        assert_eq!(
            parse_at("2023-11-14T22:13:20+00:00").unwrap(),
            1_700_000_000_000
        );
    }

    #[test]
    fn test_parse_local_forms_agree() {
        let a = parse_at("2030-06-01T12:30").unwrap();
        let b = parse_at("2030-06-01 12:30:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_at_rejects_garbage() {
        assert!(parse_at("tomorrow").is_err());
        assert!(parse_at("").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_ms("90s").unwrap(), 90_000);
        assert_eq!(parse_duration_ms("2h30m").unwrap(), 9_000_000);
        assert_eq!(parse_duration_ms("1d").unwrap(), 86_400_000);
        assert_eq!(parse_duration_ms(" 5m ").unwrap(), 300_000);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration_ms("").is_err());
        assert!(parse_duration_ms("10").is_err());
        assert!(parse_duration_ms("h").is_err());
        assert!(parse_duration_ms("3w").is_err());
        assert!(parse_duration_ms("99999999999999999999d").is_err());
    }

    #[test]
    fn test_unlock_after_rejects_out_of_range() {
        let now = 1_700_000_000_000;
        let huge = parse_duration_ms("106751991167d").unwrap();
        assert!(unlock_after(now, huge).is_err());
        assert!(unlock_after(now, i64::MAX).is_err());
        assert!(unlock_after(0, MAX_TIMESTAMP_MS + 1).is_err());

        assert_eq!(unlock_after(now, 90_000).unwrap(), now + 90_000);
        assert_eq!(unlock_after(0, MAX_TIMESTAMP_MS).unwrap(), MAX_TIMESTAMP_MS);
    }

    #[test]
    fn test_parse_at_rejects_out_of_range() {
        assert!(parse_at("+275760-09-13T00:00:00.001Z").is_err());
    }
}
