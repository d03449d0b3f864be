//! Cron expression parser.
//!
//! Standard 5-field expressions: `minute hour day-of-month month day-of-week`.
//! Supports `*`, `*/N` (step), `N` (literal), `N-M` (range), `N-M/S`, and
//! `N,M` (list). Day-of-week `7` is accepted as Sunday.
//!
//! When both day fields are restricted a date matches if *either* does,
//! as in classic cron: `0 9 1 * 1` fires on the 1st and on every Monday.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use cinder_core::error::ValidationError;

/// How far ahead `next_after` searches before giving up (covers Feb 29).
const SEARCH_HORIZON_DAYS: i64 = 366 * 5;

/// A parsed 5-field cron expression: minute hour dom month dow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>, // 0=Sun, 6=Sat
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpr {
    /// Parse a standard 5-field cron expression.
    pub fn parse(expr: &str) -> Result<Self, ValidationError> {
        Self::parse_fields(expr).map_err(|reason| ValidationError::InvalidCron {
            expr: expr.to_string(),
            reason,
        })
    }

    fn parse_fields(expr: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "Expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            ));
        }

        let mut days_of_week = Self::parse_field(fields[4], 0, 7)?;
        if days_of_week.contains(&7) {
            days_of_week.retain(|&d| d != 7);
            if !days_of_week.contains(&0) {
                days_of_week.insert(0, 0);
            }
        }

        Ok(CronExpr {
            minutes: Self::parse_field(fields[0], 0, 59)?,
            hours: Self::parse_field(fields[1], 0, 23)?,
            days_of_month: Self::parse_field(fields[2], 1, 31)?,
            months: Self::parse_field(fields[3], 1, 12)?,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
        let mut values = Vec::new();

        for part in field.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(format!("Empty list item in '{field}'"));
            }

            if let Some((base, step)) = part.split_once('/') {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("Invalid step: {step}"))?;
                if step == 0 {
                    return Err("Step cannot be zero".into());
                }
                let (start, end) = if base == "*" {
                    (min, max)
                } else if base.contains('-') {
                    Self::parse_range(base, min, max)?
                } else {
                    (Self::parse_value(base, min, max)?, max)
                };
                values.extend((start..=end).step_by(step as usize));
            } else if part == "*" {
                values.extend(min..=max);
            } else if part.contains('-') {
                let (start, end) = Self::parse_range(part, min, max)?;
                values.extend(start..=end);
            } else {
                values.push(Self::parse_value(part, min, max)?);
            }
        }

        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    fn parse_value(s: &str, min: u32, max: u32) -> Result<u32, String> {
        let v: u32 = s.parse().map_err(|_| format!("Invalid number: {s}"))?;
        if v < min || v > max {
            return Err(format!("{v} out of range {min}-{max}"));
        }
        Ok(v)
    }

    fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), String> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid range: {s}"))?;
        let start = Self::parse_value(start, min, max)?;
        let end = Self::parse_value(end, min, max)?;
        if start > end {
            return Err(format!("Range {start}-{end} is reversed"));
        }
        Ok((start, end))
    }

    fn day_matches(&self, dom: u32, dow: u32) -> bool {
        let dom_ok = self.days_of_month.contains(&dom);
        let dow_ok = self.days_of_week.contains(&dow);
        if self.dom_restricted && self.dow_restricted {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        }
    }

    /// Check if the given wall-clock time matches this expression.
    pub fn matches<T: Datelike + Timelike>(&self, dt: &T) -> bool {
        self.minutes.contains(&dt.minute())
            && self.hours.contains(&dt.hour())
            && self.months.contains(&dt.month())
            && self.day_matches(dt.day(), dt.weekday().num_days_from_sunday())
    }

    /// The first matching minute strictly after `after`, evaluated on the
    /// wall clock of `tz`. Local times skipped by a DST jump never fire;
    /// repeated local times fire once, on their first occurrence.
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&tz).naive_local();
        let mut t = truncate_to_minute(local) + Duration::minutes(1);
        let limit = t + Duration::days(SEARCH_HORIZON_DAYS);

        while t <= limit {
            if !self.months.contains(&t.month()) {
                t = start_of_next_month(t)?;
                continue;
            }
            if !self.day_matches(t.day(), t.weekday().num_days_from_sunday()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hours.contains(&t.hour()) {
                t = truncate_to_hour(t) + Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(&t.minute()) {
                t += Duration::minutes(1);
                continue;
            }

            let candidate = tz
                .from_local_datetime(&t)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
            if let Some(candidate) = candidate.filter(|c| *c > after) {
                return Some(candidate);
            }
            t += Duration::minutes(1);
        }
        None
    }
}

/// Resolve an IANA zone name, defaulting to UTC when absent or blank.
pub fn parse_timezone(name: Option<&str>) -> Result<Tz, ValidationError> {
    match name.map(str::trim) {
        None | Some("") => Ok(Tz::UTC),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ValidationError::InvalidTimezone(name.to_string())),
    }
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

fn truncate_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    truncate_to_minute(t).with_minute(0).unwrap_or(t)
}

fn start_of_next_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    chrono::NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}
