//! Five-field cron expressions (`minute hour day-of-month month day-of-week`),
//! evaluated in UTC.

use crate::error::{McpError, Result};
use chrono::{DateTime, Datelike, Days, Duration, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Give up searching for a fire time this many years past the start point.
/// Only reachable for expressions such as `0 0 30 2 *` that never fire.
const SEARCH_YEARS: i32 = 5;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    fn bounds(self) -> (u32, u32) {
        match self {
            FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            // 7 is accepted as an alias for Sunday and folded to 0.
            FieldKind::DayOfWeek => (0, 7),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day of month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day of week",
        }
    }

    fn value(self, token: &str) -> Option<u32> {
        if let Ok(n) = token.parse::<u32>() {
            return Some(n);
        }
        let lower = token.to_ascii_lowercase();
        let names: &[&str] = match self {
            FieldKind::Month => &MONTH_NAMES,
            FieldKind::DayOfWeek => &DAY_NAMES,
            _ => return None,
        };
        let offset = if self == FieldKind::Month { 1 } else { 0 };
        names
            .iter()
            .position(|n| *n == lower)
            .map(|i| i as u32 + offset)
    }
}

/// The set of values one field matches, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// The field text started with `*`. Decides how the two day fields combine.
    star: bool,
}

impl Field {
    fn parse(text: &str, kind: FieldKind) -> std::result::Result<Self, String> {
        let (min, max) = kind.bounds();
        let mut bits = 0u64;

        for part in text.split(',') {
            if part.is_empty() {
                return Err(format!("empty list entry in {} field", kind.name()));
            }
            let (range, step) = match part.split_once('/') {
                Some((r, s)) => {
                    let step: u32 = s
                        .parse()
                        .map_err(|_| format!("invalid step '{s}' in {} field", kind.name()))?;
                    if step == 0 {
                        return Err(format!("step of zero in {} field", kind.name()));
                    }
                    (r, step)
                }
                None => (part, 1),
            };

            let (lo, hi) = if range == "*" {
                (min, max)
            } else if let Some((a, b)) = range.split_once('-') {
                (Self::bound(a, kind)?, Self::bound(b, kind)?)
            } else {
                let v = Self::bound(range, kind)?;
                // `5/15` means "from 5 to the end in steps of 15".
                if part.contains('/') {
                    (v, max)
                } else {
                    (v, v)
                }
            };

            if lo > hi {
                return Err(format!("range {lo}-{hi} is reversed in {} field", kind.name()));
            }

            let mut v = lo;
            while v <= hi {
                let folded = if kind == FieldKind::DayOfWeek && v == 7 { 0 } else { v };
                bits |= 1 << folded;
                v += step;
            }
        }

        Ok(Self {
            bits,
            star: text.starts_with('*'),
        })
    }

    fn bound(token: &str, kind: FieldKind) -> std::result::Result<u32, String> {
        let (min, max) = kind.bounds();
        let v = kind
            .value(token)
            .ok_or_else(|| format!("invalid value '{token}' in {} field", kind.name()))?;
        if v < min || v > max {
            return Err(format!(
                "value {v} out of range {min}-{max} in {} field",
                kind.name()
            ));
        }
        Ok(v)
    }

    fn contains(&self, v: u32) -> bool {
        self.bits & (1 << v) != 0
    }
}

// ---------------------------------------------------------------------------
// CronSchedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    /// Parse with Vixie cron rules: weekday 0 and 7 are Sunday, and a
    /// restricted day-of-month ORs with a restricted day-of-week. APScheduler
    /// numbers Monday as 0 and ANDs the day fields, so weekday schedules
    /// carried over from it need rewriting.
    pub fn parse(expr: &str) -> Result<Self> {
        let invalid = |reason: String| McpError::InvalidCron {
            expr: expr.to_string(),
            reason,
        };

        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(invalid(format!(
                "expected 5 fields (minute hour day month day_of_week), got {}",
                parts.len()
            )));
        }

        Ok(Self {
            expr: parts.join(" "),
            minute: Field::parse(parts[0], FieldKind::Minute).map_err(invalid)?,
            hour: Field::parse(parts[1], FieldKind::Hour).map_err(invalid)?,
            day_of_month: Field::parse(parts[2], FieldKind::DayOfMonth).map_err(invalid)?,
            month: Field::parse(parts[3], FieldKind::Month).map_err(invalid)?,
            day_of_week: Field::parse(parts[4], FieldKind::DayOfWeek).map_err(invalid)?,
        })
    }

    /// The normalised expression text.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// When both day fields are restricted a day matches if either does
    /// (classic cron behaviour); otherwise both must match.
    fn day_matches(&self, t: &DateTime<Utc>) -> bool {
        let dom = self.day_of_month.contains(t.day());
        let dow = self
            .day_of_week
            .contains(t.weekday().num_days_from_sunday());
        if self.day_of_month.star || self.day_of_week.star {
            dom && dow
        } else {
            dom || dow
        }
    }

    pub fn matches(&self, t: &DateTime<Utc>) -> bool {
        self.minute.contains(t.minute())
            && self.hour.contains(t.hour())
            && self.month.contains(t.month())
            && self.day_matches(t)
    }

    /// The first fire time strictly after `after`, at minute resolution.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))?
            + Duration::minutes(1);
        let give_up = after.year() + SEARCH_YEARS;

        while t.year() <= give_up {
            if !self.month.contains(t.month()) {
                let (y, m) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).single()?;
                continue;
            }
            if !self.day_matches(&t) {
                t = t
                    .date_naive()
                    .checked_add_days(Days::new(1))?
                    .and_hms_opt(0, 0, 0)?
                    .and_utc();
                continue;
            }
            if !self.hour.contains(t.hour()) {
                t = t - Duration::minutes(i64::from(t.minute())) + Duration::hours(1);
                continue;
            }
            if !self.minute.contains(t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }
}

impl FromStr for CronSchedule {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn every_five_minutes() {
        let cron = CronSchedule::parse("*/5 * * * *").unwrap();
        assert_eq!(cron.next_after(at(2024, 1, 1, 10, 2)), Some(at(2024, 1, 1, 10, 5)));
        assert_eq!(cron.next_after(at(2024, 1, 1, 10, 5)), Some(at(2024, 1, 1, 10, 10)));
        assert_eq!(cron.next_after(at(2024, 1, 1, 23, 57)), Some(at(2024, 1, 2, 0, 0)));
    }

    #[test]
    fn seconds_are_ignored() {
        let cron = CronSchedule::parse("*/5 * * * *").unwrap();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 4, 59).unwrap();
        assert_eq!(cron.next_after(t), Some(at(2024, 1, 1, 10, 5)));
    }

    #[test]
    fn invalid_field_count_rejected() {
        let err = CronSchedule::parse("invalid").unwrap_err();
        assert!(matches!(err, McpError::InvalidCron { .. }));
        assert!(CronSchedule::parse("* * * *").is_err());
        assert!(CronSchedule::parse("* * * * * *").is_err());
    }

    #[test]
    fn out_of_range_and_garbage_rejected() {
        assert!(CronSchedule::parse("60 * * * *").is_err());
        assert!(CronSchedule::parse("* 24 * * *").is_err());
        assert!(CronSchedule::parse("* * 0 * *").is_err());
        assert!(CronSchedule::parse("*/0 * * * *").is_err());
        assert!(CronSchedule::parse("5-1 * * * *").is_err());
        assert!(CronSchedule::parse("a * * * *").is_err());
    }

    #[test]
    fn expression_is_normalised() {
        let cron: CronSchedule = "  */5   *  * * * ".parse().unwrap();
        assert_eq!(cron.expression(), "*/5 * * * *");
        assert_eq!(cron.to_string(), "*/5 * * * *");
    }

    #[test]
    fn weekday_names_and_sunday_alias() {
        // 2024-01-01 is a Monday.
        let weekdays = CronSchedule::parse("0 9 * * mon-fri").unwrap();
        assert_eq!(weekdays.next_after(at(2024, 1, 5, 9, 0)), Some(at(2024, 1, 8, 9, 0)));

        let sunday = CronSchedule::parse("30 8 * * 7").unwrap();
        assert_eq!(sunday.next_after(at(2024, 1, 1, 0, 0)), Some(at(2024, 1, 7, 8, 30)));
    }

    #[test]
    fn weekday_zero_is_sunday_not_monday() {
        let zero = CronSchedule::parse("0 6 * * 0").unwrap();
        let seven = CronSchedule::parse("0 6 * * 7").unwrap();
        let next = zero.next_after(at(2024, 1, 1, 0, 0));
        assert_eq!(next, Some(at(2024, 1, 7, 6, 0)));
        assert_eq!(next, seven.next_after(at(2024, 1, 1, 0, 0)));
    }

    #[test]
    fn restricted_day_fields_combine_with_or() {
        // Fires on the 15th and on every Monday.
        let cron = CronSchedule::parse("0 0 15 * 1").unwrap();
        assert_eq!(cron.next_after(at(2024, 1, 1, 0, 0)), Some(at(2024, 1, 8, 0, 0)));
        assert_eq!(cron.next_after(at(2024, 1, 8, 0, 0)), Some(at(2024, 1, 15, 0, 0)));
    }

    #[test]
    fn month_rollover_and_lists() {
        let cron = CronSchedule::parse("0 12 1 jan,jul *").unwrap();
        assert_eq!(cron.next_after(at(2024, 2, 10, 0, 0)), Some(at(2024, 7, 1, 12, 0)));
        assert_eq!(cron.next_after(at(2024, 7, 1, 12, 0)), Some(at(2025, 1, 1, 12, 0)));
    }

    #[test]
    fn stepped_start_value() {
        let cron = CronSchedule::parse("10/20 * * * *").unwrap();
        assert!(cron.matches(&at(2024, 1, 1, 0, 10)));
        assert!(cron.matches(&at(2024, 1, 1, 0, 30)));
        assert!(cron.matches(&at(2024, 1, 1, 0, 50)));
        assert!(!cron.matches(&at(2024, 1, 1, 0, 0)));
    }

    #[test]
    fn impossible_date_never_fires() {
        let cron = CronSchedule::parse("0 0 30 2 *").unwrap();
        assert_eq!(cron.next_after(at(2024, 1, 1, 0, 0)), None);
    }
}
