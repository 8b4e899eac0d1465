//! Date/time expressions.
//!
//! Turns the strings billing clients pass around into instants in a given
//! zone. Matching is case-insensitive.
//!
//! # Supported Formats
//!
//! - **Absolute**: `"2023-03-20 16:38:17"`, `"2023-03-20T16:38:17.5"`, `"2023-03-20 16:38"`,
//!   `"2023-03-20"` (midnight), read as wall-clock time in the zone
//! - **RFC 3339**: `"2023-03-20T07:38:17Z"` (the offset decides the instant)
//! - **Unix seconds**: `"@1679297897"`
//! - **Keywords**: `"now"`, `"today"`, `"midnight"`, `"noon"`, `"tomorrow"`, `"yesterday"`
//! - **Relative**: `"+1 day"`, `"2 weeks ago"`, `"-3 months"`, `"next month"`, `"last year"`
//! - **Month days**: `"first day of next month"`, `"last day of this month"`
//!
//! Tokens combine, e.g. `"yesterday noon"` or `"2023-01-31 +1 month"`.

use crate::calendar::{first_of_month, last_of_month, resolve_local, shift_months};
use crate::error::{PortaError, Result};
use crate::zone::PortaZone;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use log::debug;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

impl Unit {
    fn from_word(word: &str) -> Option<Unit> {
        match word {
            "sec" | "secs" | "second" | "seconds" => Some(Unit::Second),
            "min" | "mins" | "minute" | "minutes" => Some(Unit::Minute),
            "hour" | "hours" => Some(Unit::Hour),
            "day" | "days" => Some(Unit::Day),
            "week" | "weeks" => Some(Unit::Week),
            "fortnight" | "fortnights" => Some(Unit::Fortnight),
            "month" | "months" => Some(Unit::Month),
            "year" | "years" => Some(Unit::Year),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayOf {
    First,
    Last,
}

/// Everything an expression says, before it is applied to "now".
#[derive(Debug, Default)]
struct Draft {
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    implied_midnight: bool,
    day_of: Option<DayOf>,
    months: i64,
    days: i64,
    seconds: i64,
}

impl Draft {
    fn add(&mut self, amount: i64, unit: Unit) {
        let (total, factor) = match unit {
            Unit::Second => (&mut self.seconds, 1),
            Unit::Minute => (&mut self.seconds, 60),
            Unit::Hour => (&mut self.seconds, 3600),
            Unit::Day => (&mut self.days, 1),
            Unit::Week => (&mut self.days, 7),
            Unit::Fortnight => (&mut self.days, 14),
            Unit::Month => (&mut self.months, 1),
            Unit::Year => (&mut self.months, 12),
        };
        *total = total.saturating_add(amount.saturating_mul(factor));
    }

    fn apply(&self, input: &str, zone: &PortaZone, now: DateTime<Utc>) -> Result<DateTime<PortaZone>> {
        let local_now = now.with_timezone(zone).naive_local();
        let out_of_range = || PortaError::OutOfRange(input.to_string());

        let mut date = self.date.unwrap_or_else(|| local_now.date());
        let time = match self.time {
            Some(time) => time,
            None if self.date.is_some() || self.implied_midnight => NaiveTime::default(),
            None => local_now.time(),
        };

        // A "first/last day of" clause pins the day before months move.
        if self.day_of.is_some() {
            date = first_of_month(date);
        }
        date = shift_months(date, self.months).ok_or_else(out_of_range)?;
        date = match self.day_of {
            Some(DayOf::First) => first_of_month(date),
            Some(DayOf::Last) => last_of_month(date),
            None => date,
        };

        let local = Duration::try_days(self.days)
            .zip(Duration::try_seconds(self.seconds))
            .and_then(|(days, seconds)| {
                date.and_time(time)
                    .checked_add_signed(days)?
                    .checked_add_signed(seconds)
            })
            .ok_or_else(out_of_range)?;

        Ok(resolve_local(zone, local))
    }
}

/// Parses `input` as wall-clock time in `zone`, resolving relative parts
/// against `now`.
pub fn parse(input: &str, zone: &PortaZone, now: DateTime<Utc>) -> Result<DateTime<PortaZone>> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if let Some(datetime) = try_parse_unix(trimmed, zone)? {
        return Ok(datetime);
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.with_timezone(zone));
    }

    if let Some(local) = try_parse_absolute(&lower) {
        return Ok(resolve_local(zone, local));
    }

    let draft = parse_tokens(input, &lower)?;
    debug!("Parsed '{}' as {:?}", input, draft);
    draft.apply(input, zone, now)
}

fn try_parse_unix(input: &str, zone: &PortaZone) -> Result<Option<DateTime<PortaZone>>> {
    let Some(digits) = input.strip_prefix('@') else {
        return Ok(None);
    };

    let seconds: i64 = digits
        .parse()
        .map_err(|_| PortaError::parse(input, "expected unix seconds after '@'"))?;
    let datetime = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| PortaError::OutOfRange(input.to_string()))?;

    Ok(Some(datetime.with_timezone(zone)))
}

fn try_parse_absolute(input: &str) -> Option<NaiveDateTime> {
    // chrono wants an upper-case 'T' separator
    let input = input.replacen('t', "T", 1);

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&input, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::default()))
        })
}

fn parse_date_token(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

fn parse_time_token(token: &str) -> Option<NaiveTime> {
    if !token.contains(':') {
        return None;
    }
    NaiveTime::parse_from_str(token, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M"))
        .ok()
}

fn parse_tokens(input: &str, lower: &str) -> Result<Draft> {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let mut draft = Draft::default();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        let next = tokens.get(i + 1).copied();

        match token {
            "now" => {}
            "today" => draft.implied_midnight = true,
            "midnight" => draft.time = Some(NaiveTime::default()),
            "noon" => draft.time = NaiveTime::from_hms_opt(12, 0, 0),
            "tomorrow" => {
                draft.days = draft.days.saturating_add(1);
                draft.implied_midnight = true;
            }
            "yesterday" => {
                draft.days = draft.days.saturating_sub(1);
                draft.implied_midnight = true;
            }
            "first" | "last" if next == Some("day") && tokens.get(i + 2) == Some(&"of") => {
                draft.day_of = Some(if token == "first" {
                    DayOf::First
                } else {
                    DayOf::Last
                });
                i += 3;
                continue;
            }
            "next" | "last" | "previous" | "this" => {
                let unit = next.and_then(Unit::from_word).ok_or_else(|| {
                    PortaError::parse(input, format!("expected a unit after '{}'", token))
                })?;
                let amount = match token {
                    "next" => 1,
                    "this" => 0,
                    _ => -1,
                };
                draft.add(amount, unit);
                i += 2;
                continue;
            }
            _ => {
                if let Ok(amount) = token.parse::<i64>() {
                    let unit = next.and_then(Unit::from_word).ok_or_else(|| {
                        PortaError::parse(input, format!("expected a unit after '{}'", token))
                    })?;
                    if tokens.get(i + 2) == Some(&"ago") {
                        let amount = amount
                            .checked_neg()
                            .ok_or_else(|| PortaError::OutOfRange(input.to_string()))?;
                        draft.add(amount, unit);
                        i += 3;
                    } else {
                        draft.add(amount, unit);
                        i += 2;
                    }
                    continue;
                } else if let Some(date) = parse_date_token(token) {
                    draft.date = Some(date);
                } else if let Some(time) = parse_time_token(token) {
                    draft.time = Some(time);
                } else {
                    return Err(PortaError::parse(
                        input,
                        format!("unexpected token '{}'", token),
                    ));
                }
            }
        }

        i += 1;
    }

    Ok(draft)
}
