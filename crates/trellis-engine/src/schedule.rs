//! Local wall-clock ↔ UTC cron translation.
//!
//! Workflow authors describe schedules in their own timezone; the scheduler
//! only ever sees 5-field UTC cron expressions. Translation uses the
//! timezone's offset at the current date, so daylight saving is respected
//! at the moment the schedule is saved or displayed.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use trellis_protocols::error::ScheduleParseError;

/// Schedule shape as edited in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

/// A schedule in the author's local terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSchedule {
    pub kind: ScheduleKind,
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    /// ISO weekdays (Monday=1 .. Sunday=7), for weekly schedules.
    pub days: Vec<u8>,
    /// Day of month (1-31), for monthly schedules.
    pub day_of_month: u8,
    /// Verbatim cron string, for custom schedules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
}

impl Default for LocalSchedule {
    /// The safe default shown when a stored cron cannot be interpreted:
    /// daily at 09:00 local, Monday selected, day-of-month 1.
    fn default() -> Self {
        Self {
            kind: ScheduleKind::Daily,
            time: "09:00".to_string(),
            days: vec![1],
            day_of_month: 1,
            cron: None,
        }
    }
}

impl LocalSchedule {
    /// A daily schedule at a local time.
    pub fn daily(time: impl Into<String>) -> Self {
        Self {
            kind: ScheduleKind::Daily,
            time: time.into(),
            ..Self::default()
        }
    }

    /// A weekly schedule on ISO weekdays at a local time.
    pub fn weekly(time: impl Into<String>, days: Vec<u8>) -> Self {
        Self {
            kind: ScheduleKind::Weekly,
            time: time.into(),
            days,
            ..Self::default()
        }
    }

    /// A monthly schedule on a day of month at a local time.
    pub fn monthly(time: impl Into<String>, day_of_month: u8) -> Self {
        Self {
            kind: ScheduleKind::Monthly,
            time: time.into(),
            day_of_month,
            ..Self::default()
        }
    }

    /// A custom schedule from a verbatim UTC cron string.
    pub fn custom(cron: impl Into<String>) -> Self {
        Self {
            kind: ScheduleKind::Custom,
            cron: Some(cron.into()),
            ..Self::default()
        }
    }
}

/// Translate a local schedule into a 5-field UTC cron expression.
pub fn to_cron(schedule: &LocalSchedule, timezone: &str) -> Result<String, ScheduleParseError> {
    if schedule.kind == ScheduleKind::Custom {
        let cron = schedule.cron.as_deref().unwrap_or_default();
        validate_cron(cron)?;
        return Ok(cron.to_string());
    }

    let tz = parse_timezone(timezone)?;
    let (hour, minute) = parse_hhmm(&schedule.time)?;
    let (utc_hour, utc_minute) = local_to_utc(hour, minute, tz);

    match schedule.kind {
        ScheduleKind::Daily => Ok(format!("{utc_minute} {utc_hour} * * *")),
        ScheduleKind::Weekly => {
            if schedule.days.is_empty() {
                return Err(ScheduleParseError::InvalidDay(0));
            }
            let mut days = schedule
                .days
                .iter()
                .map(|d| iso_to_cron_day(*d))
                .collect::<Result<Vec<_>, _>>()?;
            days.sort_unstable();
            days.dedup();
            let days = days
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(",");
            Ok(format!("{utc_minute} {utc_hour} * * {days}"))
        }
        ScheduleKind::Monthly => {
            if !(1..=31).contains(&schedule.day_of_month) {
                return Err(ScheduleParseError::InvalidDay(schedule.day_of_month));
            }
            Ok(format!(
                "{utc_minute} {utc_hour} {} * *",
                schedule.day_of_month
            ))
        }
        ScheduleKind::Custom => unreachable!("handled above"),
    }
}

/// Interpret a UTC cron expression back into the caller's local terms.
///
/// Fails soft: anything that does not look like a plain daily/weekly/
/// monthly expression comes back as Custom with the verbatim string, and
/// malformed input comes back as the safe default: this feeds editable UI
/// state, so raising would only break the editor.
pub fn from_cron(expression: &str, timezone: &str) -> LocalSchedule {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        warn!(
            "cron expression `{}` does not have 5 fields, using default schedule",
            expression
        );
        return LocalSchedule::default();
    }

    let (Ok(utc_minute), Ok(utc_hour)) = (fields[0].parse::<u32>(), fields[1].parse::<u32>())
    else {
        // Stepped/ranged minute or hour fields are beyond the simple
        // shapes; present them verbatim.
        return LocalSchedule::custom(expression);
    };
    if utc_minute > 59 || utc_hour > 23 {
        return LocalSchedule::default();
    }

    let tz = match parse_timezone(timezone) {
        Ok(tz) => tz,
        Err(_) => {
            warn!("unknown timezone `{}`, displaying schedule in UTC", timezone);
            Tz::UTC
        }
    };
    let (hour, minute) = utc_to_local(utc_hour, utc_minute, tz);
    let time = format!("{hour:02}:{minute:02}");

    let (day_of_month, _month, day_of_week) = (fields[2], fields[3], fields[4]);

    if day_of_week != "*" {
        let days = day_of_week
            .split(',')
            .map(|d| d.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>();
        match days {
            // 0 and 7 are both Sunday in classic cron.
            Ok(days) if !days.is_empty() && days.iter().all(|d| *d <= 7) => {
                let mut days: Vec<u8> = days.iter().map(|d| cron_to_iso_day(*d)).collect();
                days.sort_unstable();
                days.dedup();
                LocalSchedule {
                    kind: ScheduleKind::Weekly,
                    time,
                    days,
                    ..LocalSchedule::default()
                }
            }
            _ => LocalSchedule::custom(expression),
        }
    } else if day_of_month != "*" {
        match day_of_month.parse::<u8>() {
            Ok(dom) if (1..=31).contains(&dom) => LocalSchedule {
                kind: ScheduleKind::Monthly,
                time,
                day_of_month: dom,
                ..LocalSchedule::default()
            },
            _ => LocalSchedule::custom(expression),
        }
    } else {
        LocalSchedule {
            kind: ScheduleKind::Daily,
            time,
            ..LocalSchedule::default()
        }
    }
}

/// Validate a 5-field UTC cron expression at save/activate time.
pub fn validate_cron(expression: &str) -> Result<(), ScheduleParseError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ScheduleParseError::InvalidCron {
            expression: expression.to_string(),
            reason: format!("expected 5 fields, found {}", fields.len()),
        });
    }
    parse_utc_cron(expression).map(|_| ())
}

/// Promote a 5-field expression to the `cron` crate's 6-field form (a fixed
/// `0` seconds column) and parse it.
///
/// Numeric weekday values follow classic cron (Sunday=0); the `cron` crate
/// numbers weekdays differently, so they are normalized to names before
/// parsing.
pub fn parse_utc_cron(expression: &str) -> Result<cron::Schedule, ScheduleParseError> {
    let invalid = |reason: String| ScheduleParseError::InvalidCron {
        expression: expression.to_string(),
        reason,
    };

    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
    }

    let dow = normalize_weekday_field(fields[4]).ok_or_else(|| {
        invalid(format!("invalid day-of-week field `{}`", fields[4]))
    })?;
    let promoted = format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], dow
    );
    cron::Schedule::from_str(&promoted).map_err(|e| invalid(e.to_string()))
}

/// Rewrite numeric weekdays (Sunday=0..Saturday=6, 7 also Sunday) as names.
fn normalize_weekday_field(field: &str) -> Option<String> {
    const NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

    let name_of = |part: &str| -> Option<String> {
        match part.parse::<u8>() {
            Ok(n) if n <= 7 => Some(NAMES[(n % 7) as usize].to_string()),
            Ok(_) => None,
            // Already a name, a wildcard or a step pattern.
            Err(_) => Some(part.to_string()),
        }
    };

    let mut parts = Vec::new();
    for part in field.split(',') {
        match part.split_once('-') {
            Some((a, b)) if a.parse::<u8>().is_ok() || b.parse::<u8>().is_ok() => {
                parts.push(format!("{}-{}", name_of(a)?, name_of(b)?));
            }
            _ => parts.push(name_of(part)?),
        }
    }
    Some(parts.join(","))
}

fn parse_timezone(timezone: &str) -> Result<Tz, ScheduleParseError> {
    timezone
        .parse::<Tz>()
        .map_err(|_| ScheduleParseError::UnknownTimezone(timezone.to_string()))
}

fn parse_hhmm(time: &str) -> Result<(u32, u32), ScheduleParseError> {
    let invalid = || ScheduleParseError::InvalidTime(time.to_string());
    let (h, m) = time.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Today's local wall-clock time converted to UTC hour/minute.
fn local_to_utc(hour: u32, minute: u32, tz: Tz) -> (u32, u32) {
    use chrono::Timelike;
    let today = Utc::now().with_timezone(&tz).date_naive();
    let utc = resolve_local(today, hour, minute, tz).with_timezone(&Utc);
    (utc.time().hour(), utc.time().minute())
}

/// Today's UTC hour/minute converted to the local wall clock.
fn utc_to_local(hour: u32, minute: u32, tz: Tz) -> (u32, u32) {
    use chrono::Timelike;
    let today = Utc::now().date_naive();
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    let utc = Utc.from_utc_datetime(&today.and_time(time));
    let local = utc.with_timezone(&tz);
    (local.time().hour(), local.time().minute())
}

/// Resolve a local date+time in a timezone, picking the earlier instant for
/// times made ambiguous by a DST fall-back and skipping forward over spring
/// gaps.
fn resolve_local(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> chrono::DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    match tz.from_local_datetime(&date.and_time(time)) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => {
            // Inside a spring-forward gap; an hour later always exists.
            let shifted = NaiveTime::from_hms_opt((hour + 1) % 24, minute, 0).unwrap_or_default();
            match tz.from_local_datetime(&date.and_time(shifted)) {
                chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
                chrono::LocalResult::None => tz.from_utc_datetime(&date.and_time(time)),
            }
        }
    }
}

/// ISO weekday (Monday=1..Sunday=7) to cron weekday (Sunday=0..Saturday=6).
fn iso_to_cron_day(day: u8) -> Result<u8, ScheduleParseError> {
    match day {
        7 => Ok(0),
        1..=6 => Ok(day),
        other => Err(ScheduleParseError::InvalidDay(other)),
    }
}

/// Cron weekday (Sunday=0) back to ISO (Sunday=7).
fn cron_to_iso_day(day: u8) -> u8 {
    if day == 0 {
        7
    } else {
        day
    }
}
