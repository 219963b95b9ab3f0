//! Five-field cron expressions.
//!
//! `minute hour day-of-month month day-of-week`, each field accepting
//! `*`, `N`, `A-B`, `*/S`, `A-B/S`, `N/S`, and comma-separated lists.
//! Day-of-week runs 0-7 with both 0 and 7 meaning Sunday. When both day
//! fields are restricted a time matches if either one does.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("cron expression {0:?} must have 5 fields")]
    FieldCount(String),

    #[error("cron field {field} has invalid value {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("cron field {field} value {value} outside {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// A parsed cron expression, stored as one bitset per field.
#[derive(Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
    dom_restricted: bool,
    dow_restricted: bool,
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

impl FieldSpec {
    const fn new(name: &'static str, min: u32, max: u32) -> Self {
        Self { name, min, max }
    }
}

const MINUTE: FieldSpec = FieldSpec::new("minute", 0, 59);
const HOUR: FieldSpec = FieldSpec::new("hour", 0, 23);
const DAY_OF_MONTH: FieldSpec = FieldSpec::new("day-of-month", 1, 31);
const MONTH: FieldSpec = FieldSpec::new("month", 1, 12);
const DAY_OF_WEEK: FieldSpec = FieldSpec::new("day-of-week", 0, 7);

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(expr.to_string()));
        }

        let minutes = parse_field(fields[0], &MINUTE)?;
        let hours = parse_field(fields[1], &HOUR)? as u32;
        let days_of_month = parse_field(fields[2], &DAY_OF_MONTH)? as u32;
        let months = parse_field(fields[3], &MONTH)? as u16;
        let mut dow = parse_field(fields[4], &DAY_OF_WEEK)?;
        // Fold 7 onto Sunday.
        if dow & (1 << 7) != 0 {
            dow = (dow | 1) & !(1 << 7);
        }

        Ok(Self {
            source: fields.join(" "),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week: dow as u8,
            // Any field starting with `*` (`*`, `*/1`, ...) leaves the day
            // unrestricted, as in Vixie cron.
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// Whether the minute containing `t` is a fire minute, evaluated in
    /// `t`'s own timezone.
    pub fn matches<Tz: TimeZone>(&self, t: &DateTime<Tz>) -> bool {
        if self.minutes & (1u64 << t.minute()) == 0
            || self.hours & (1u32 << t.hour()) == 0
            || self.months & (1u16 << t.month()) == 0
        {
            return false;
        }

        let dom = self.days_of_month & (1u32 << t.day()) != 0;
        let dow = self.days_of_week & (1u8 << t.weekday().num_days_from_sunday()) != 0;
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for CronExpr {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpr").field(&self.source).finish()
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_field(field: &str, spec: &FieldSpec) -> Result<u64, CronError> {
    let mut bits = 0u64;
    for part in field.split(',') {
        bits |= parse_part(part, spec)?;
    }
    Ok(bits)
}

fn parse_part(part: &str, spec: &FieldSpec) -> Result<u64, CronError> {
    let invalid = || CronError::InvalidValue {
        field: spec.name,
        value: part.to_string(),
    };

    let (range, step) = match part.split_once('/') {
        Some((range, step)) => {
            let step: u32 = step.parse().map_err(|_| invalid())?;
            if step == 0 {
                return Err(invalid());
            }
            (range, Some(step))
        }
        None => (part, None),
    };

    let (start, end) = if range == "*" {
        (spec.min, spec.max)
    } else if let Some((a, b)) = range.split_once('-') {
        (parse_value(a, spec, part)?, parse_value(b, spec, part)?)
    } else {
        let v = parse_value(range, spec, part)?;
        // `N/S` runs from N to the end of the field.
        (v, if step.is_some() { spec.max } else { v })
    };
    if start > end {
        return Err(invalid());
    }

    let step = step.unwrap_or(1);
    let mut bits = 0u64;
    let mut v = start;
    while v <= end {
        bits |= 1u64 << v;
        v += step;
    }
    Ok(bits)
}

fn parse_value(s: &str, spec: &FieldSpec, part: &str) -> Result<u32, CronError> {
    let value: u32 = s.parse().map_err(|_| CronError::InvalidValue {
        field: spec.name,
        value: part.to_string(),
    })?;
    if value < spec.min || value > spec.max {
        return Err(CronError::OutOfRange {
            field: spec.name,
            value,
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn every_minute_matches_anything() {
        let cron = CronExpr::parse("* * * * *").unwrap();
        assert!(cron.matches(&at("2026-10-18T03:17:00Z")));
    }

    #[test]
    fn business_hours_on_weekdays() {
        let cron = CronExpr::parse("* 8-17 * * 1-5").unwrap();
        // 2026-10-19 is a Monday.
        assert!(cron.matches(&at("2026-10-19T08:00:00Z")));
        assert!(cron.matches(&at("2026-10-19T17:59:00Z")));
        assert!(!cron.matches(&at("2026-10-19T18:00:00Z")));
        // Sunday.
        assert!(!cron.matches(&at("2026-10-18T09:00:00Z")));
    }

    #[test]
    fn steps_and_lists() {
        let cron = CronExpr::parse("*/15 0,12 * * *").unwrap();
        assert!(cron.matches(&at("2026-10-18T12:45:00Z")));
        assert!(!cron.matches(&at("2026-10-18T12:50:00Z")));
        assert!(!cron.matches(&at("2026-10-18T06:00:00Z")));

        let cron = CronExpr::parse("5/20 * * * *").unwrap();
        assert!(cron.matches(&at("2026-10-18T06:25:00Z")));
        assert!(!cron.matches(&at("2026-10-18T06:20:00Z")));
    }

    #[test]
    fn sunday_is_zero_or_seven() {
        let a = CronExpr::parse("0 0 * * 0").unwrap();
        let b = CronExpr::parse("0 0 * * 7").unwrap();
        let sunday = at("2026-10-18T00:00:00Z");
        assert!(a.matches(&sunday));
        assert!(b.matches(&sunday));
    }

    #[test]
    fn restricted_day_fields_are_ored() {
        // The 1st of the month or any Friday.
        let cron = CronExpr::parse("0 9 1 * 5").unwrap();
        assert!(cron.matches(&at("2026-10-01T09:00:00Z")));
        assert!(cron.matches(&at("2026-10-23T09:00:00Z")));
        assert!(!cron.matches(&at("2026-10-22T09:00:00Z")));
    }

    #[test]
    fn starred_step_day_field_stays_unrestricted() {
        // Every day of month, so only Mondays fire.
        let cron = CronExpr::parse("0 9 */1 * 1").unwrap();
        assert!(cron.matches(&at("2026-10-19T09:00:00Z")));
        assert!(!cron.matches(&at("2026-10-20T09:00:00Z")));

        let cron = CronExpr::parse("0 9 1 * */1").unwrap();
        assert!(cron.matches(&at("2026-10-01T09:00:00Z")));
        assert!(!cron.matches(&at("2026-10-02T09:00:00Z")));
    }

    #[test]
    fn matches_in_the_given_timezone() {
        let cron = CronExpr::parse("0 8 * * *").unwrap();
        let bangkok = FixedOffset::east_opt(7 * 3600).unwrap();
        let t = at("2026-10-18T01:00:00Z");
        assert!(!cron.matches(&t));
        assert!(cron.matches(&t.with_timezone(&bangkok)));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(matches!(
            CronExpr::parse("* * * *"),
            Err(CronError::FieldCount(_))
        ));
        assert!(matches!(
            CronExpr::parse("60 * * * *"),
            Err(CronError::OutOfRange { field: "minute", .. })
        ));
        assert!(CronExpr::parse("*/0 * * * *").is_err());
        assert!(CronExpr::parse("10-5 * * * *").is_err());
        assert!(CronExpr::parse("a * * * *").is_err());
        assert!(CronExpr::parse("* * 0 * *").is_err());
    }
}
