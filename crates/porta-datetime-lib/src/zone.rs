use crate::error::{PortaError, Result};
use chrono::{FixedOffset, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::{Tz, TzOffset};
use log::debug;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Timezone attached to a billing timestamp: either a zone from the IANA
/// database or a fixed UTC offset such as `+09:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortaZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl PortaZone {
    pub const UTC: PortaZone = PortaZone::Named(Tz::UTC);

    pub fn name(&self) -> String {
        match self {
            PortaZone::Named(tz) => tz.name().to_string(),
            PortaZone::Fixed(offset) => offset.to_string(),
        }
    }

    pub fn is_utc(&self) -> bool {
        match self {
            PortaZone::Named(tz) => *tz == Tz::UTC || *tz == Tz::Etc__UTC,
            PortaZone::Fixed(offset) => offset.local_minus_utc() == 0,
        }
    }
}

impl Default for PortaZone {
    fn default() -> Self {
        PortaZone::UTC
    }
}

impl fmt::Display for PortaZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for PortaZone {
    type Err = PortaError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        if name.is_empty() {
            return Err(PortaError::UnknownTimezone(s.to_string()));
        }

        if name.eq_ignore_ascii_case("z") {
            return Ok(PortaZone::UTC);
        }

        if name.starts_with('+') || name.starts_with('-') {
            return parse_fixed_offset(name)
                .map(PortaZone::Fixed)
                .ok_or_else(|| PortaError::UnknownTimezone(s.to_string()));
        }

        Tz::from_str(name)
            .or_else(|_| Tz::from_str_insensitive(name))
            .map(PortaZone::Named)
            .map_err(|_| PortaError::UnknownTimezone(s.to_string()))
    }
}

// Accepts "+9", "+09", "+0900" and "+09:00".
fn parse_fixed_offset(value: &str) -> Option<FixedOffset> {
    let (sign, rest) = value.split_at(1);
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }

    let seconds = (hours * 3600 + minutes * 60) * if sign == "-" { -1 } else { 1 };
    FixedOffset::east_opt(seconds)
}

/// Offset produced by [`PortaZone`] for a particular instant.
#[derive(Debug, Clone, Copy)]
pub enum ZoneOffset {
    Named(TzOffset),
    Fixed(FixedOffset),
}

impl ZoneOffset {
    /// Short name of the offset, e.g. `CET` or `+09`.
    pub fn abbreviation(&self) -> String {
        match self {
            ZoneOffset::Named(offset) => offset.to_string(),
            ZoneOffset::Fixed(offset) => offset.to_string(),
        }
    }
}

impl Offset for ZoneOffset {
    fn fix(&self) -> FixedOffset {
        match self {
            ZoneOffset::Named(offset) => offset.fix(),
            ZoneOffset::Fixed(offset) => *offset,
        }
    }
}

impl fmt::Display for ZoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneOffset::Named(offset) => fmt::Display::fmt(offset, f),
            ZoneOffset::Fixed(offset) => fmt::Display::fmt(offset, f),
        }
    }
}

impl TimeZone for PortaZone {
    type Offset = ZoneOffset;

    fn from_offset(offset: &ZoneOffset) -> Self {
        match offset {
            ZoneOffset::Named(offset) => PortaZone::Named(Tz::from_offset(offset)),
            ZoneOffset::Fixed(offset) => PortaZone::Fixed(*offset),
        }
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<ZoneOffset> {
        match self {
            PortaZone::Named(tz) => tz.offset_from_local_date(local).map(ZoneOffset::Named),
            PortaZone::Fixed(offset) => offset.offset_from_local_date(local).map(ZoneOffset::Fixed),
        }
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<ZoneOffset> {
        match self {
            PortaZone::Named(tz) => tz.offset_from_local_datetime(local).map(ZoneOffset::Named),
            PortaZone::Fixed(offset) => offset
                .offset_from_local_datetime(local)
                .map(ZoneOffset::Fixed),
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> ZoneOffset {
        match self {
            PortaZone::Named(tz) => ZoneOffset::Named(tz.offset_from_utc_date(utc)),
            PortaZone::Fixed(offset) => ZoneOffset::Fixed(offset.offset_from_utc_date(utc)),
        }
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> ZoneOffset {
        match self {
            PortaZone::Named(tz) => ZoneOffset::Named(tz.offset_from_utc_datetime(utc)),
            PortaZone::Fixed(offset) => ZoneOffset::Fixed(offset.offset_from_utc_datetime(utc)),
        }
    }
}

/// A timezone as handed to constructors and factories: a zone name, a
/// ready-made zone, or something that is neither.
#[derive(Debug, Clone, PartialEq)]
pub enum TimezoneArg {
    Name(String),
    Zone(PortaZone),
    Unsupported(&'static str),
}

impl From<&str> for TimezoneArg {
    fn from(name: &str) -> Self {
        TimezoneArg::Name(name.to_string())
    }
}

impl From<String> for TimezoneArg {
    fn from(name: String) -> Self {
        TimezoneArg::Name(name)
    }
}

impl From<&String> for TimezoneArg {
    fn from(name: &String) -> Self {
        TimezoneArg::Name(name.clone())
    }
}

impl From<PortaZone> for TimezoneArg {
    fn from(zone: PortaZone) -> Self {
        TimezoneArg::Zone(zone)
    }
}

impl From<Tz> for TimezoneArg {
    fn from(tz: Tz) -> Self {
        TimezoneArg::Zone(PortaZone::Named(tz))
    }
}

impl From<FixedOffset> for TimezoneArg {
    fn from(offset: FixedOffset) -> Self {
        TimezoneArg::Zone(PortaZone::Fixed(offset))
    }
}

impl From<Utc> for TimezoneArg {
    fn from(_: Utc) -> Self {
        TimezoneArg::Zone(PortaZone::UTC)
    }
}

impl From<&Value> for TimezoneArg {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(name) => TimezoneArg::Name(name.clone()),
            Value::Null => TimezoneArg::Unsupported("null"),
            Value::Bool(_) => TimezoneArg::Unsupported("boolean"),
            Value::Number(_) => TimezoneArg::Unsupported("number"),
            Value::Array(_) => TimezoneArg::Unsupported("array"),
            Value::Object(_) => TimezoneArg::Unsupported("object"),
        }
    }
}

impl From<Value> for TimezoneArg {
    fn from(value: Value) -> Self {
        TimezoneArg::from(&value)
    }
}

/// Resolves a timezone argument into a zone, rejecting anything that is not
/// a name or a zone object.
pub fn prepare_timezone(timezone: impl Into<TimezoneArg>) -> Result<PortaZone> {
    match timezone.into() {
        TimezoneArg::Name(name) => {
            let zone = name.parse::<PortaZone>()?;
            debug!("Resolved timezone '{}' to {}", name, zone);
            Ok(zone)
        }
        TimezoneArg::Zone(zone) => Ok(zone),
        TimezoneArg::Unsupported(kind) => Err(PortaError::InvalidTimezoneArgument { kind }),
    }
}

/// Timezones whose values can be copied into a [`PortaZone`].
pub trait ToPortaZone: TimeZone {
    fn to_porta_zone(&self) -> PortaZone;
}

impl ToPortaZone for PortaZone {
    fn to_porta_zone(&self) -> PortaZone {
        *self
    }
}

impl ToPortaZone for Tz {
    fn to_porta_zone(&self) -> PortaZone {
        PortaZone::Named(*self)
    }
}

impl ToPortaZone for Utc {
    fn to_porta_zone(&self) -> PortaZone {
        PortaZone::UTC
    }
}

impl ToPortaZone for FixedOffset {
    fn to_porta_zone(&self) -> PortaZone {
        PortaZone::Fixed(*self)
    }
}
