//! Duration, timezone, and timestamp parsing for config values.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::error::{ConfigError, ConfigResult};

/// Parse a duration string like "30s", "5m", "1h", or a bare number of
/// seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let (digits, scale) = if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else {
        (s, 1)
    };

    let value = digits.trim().parse::<u64>().map_err(|_| invalid())?;
    value
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Parse `UTC`, `Z`, or a fixed offset like `+07:00` / `-0530`.
pub fn parse_timezone(s: &str) -> ConfigResult<FixedOffset> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidTimezone(s.to_string());

    if s.eq_ignore_ascii_case("utc") || s == "Z" {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    if !rest.is_ascii() {
        return Err(invalid());
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => return Err(invalid()),
    };
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> ConfigResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ConfigError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(matches!(
            parse_duration("invalid"),
            Err(ConfigError::InvalidDuration(_))
        ));
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_timezone_offsets() {
        assert_eq!(parse_timezone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("+07:00").unwrap().local_minus_utc(), 7 * 3600);
        assert_eq!(
            parse_timezone("-0530").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn parse_timezone_rejects_names_and_bad_offsets() {
        assert!(parse_timezone("Asia/Bangkok").is_err());
        assert!(parse_timezone("+25:00").is_err());
        assert!(parse_timezone("+7").is_err());
    }

    #[test]
    fn parse_timestamp_normalizes_to_utc() {
        let t = parse_timestamp("2026-11-11T07:00:00+07:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-11-11T00:00:00+00:00");
        assert!(parse_timestamp("tomorrow").is_err());
    }
}
