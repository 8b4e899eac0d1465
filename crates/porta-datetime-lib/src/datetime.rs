use crate::calendar::{days_in_month, first_of_next_month, resolve_local};
use crate::error::{PortaError, Result};
use crate::expression;
use crate::zone::{prepare_timezone, PortaZone, TimezoneArg, ToPortaZone};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use log::trace;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A billing timestamp: an instant plus the timezone used to read its
/// calendar fields.
///
/// Methods taking `&self` never modify the value; the `set_*` methods change
/// it in place and return `&mut Self` so calls can be chained. Equality and
/// ordering only look at the instant.
#[derive(Debug, Clone)]
pub struct PortaDateTime {
    datetime: DateTime<PortaZone>,
}

impl PortaDateTime {
    /// Billing datetime format, always rendered in UTC.
    pub const PORTA_DATETIME: &'static str = "%Y-%m-%d %H:%M:%S";
    /// Billing date format, always rendered in UTC.
    pub const PORTA_DATE: &'static str = "%Y-%m-%d";

    /// Parses `datetime` as wall-clock time in `timezone`.
    ///
    /// The timezone is validated before anything is parsed, so an argument
    /// that is neither a name nor a zone fails with
    /// [`PortaError::InvalidTimezoneArgument`] whatever the datetime is.
    pub fn new(datetime: &str, timezone: impl Into<TimezoneArg>) -> Result<Self> {
        Self::new_at(datetime, timezone, Utc::now())
    }

    /// Like [`PortaDateTime::new`], resolving relative expressions against `now`.
    pub fn new_at(
        datetime: &str,
        timezone: impl Into<TimezoneArg>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let zone = prepare_timezone(timezone)?;
        let datetime = expression::parse(datetime, &zone, now)?;
        Ok(Self { datetime })
    }

    pub fn now() -> Self {
        Self::from_interface(&Utc::now())
    }

    pub fn from_datetime(datetime: DateTime<PortaZone>) -> Self {
        Self { datetime }
    }

    /// Reads a datetime string as returned by the billing (always UTC) and
    /// moves it into `timezone`. The instant does not change.
    pub fn from_porta_string(datetime: &str, timezone: impl Into<TimezoneArg>) -> Result<Self> {
        let zone = prepare_timezone(timezone)?;
        let utc = expression::parse(datetime, &PortaZone::UTC, Utc::now())?;
        Ok(Self {
            datetime: utc.with_timezone(&zone),
        })
    }

    /// Reads a date-only billing string as midnight in `timezone`.
    pub fn from_porta_date_string(date: &str, timezone: impl Into<TimezoneArg>) -> Result<Self> {
        let zone = prepare_timezone(timezone)?;
        let date = NaiveDate::parse_from_str(date.trim(), Self::PORTA_DATE).map_err(|e| {
            PortaError::Parse {
                input: date.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            datetime: resolve_local(&zone, date.and_time(NaiveTime::default())),
        })
    }

    /// Copies the instant and timezone of any supported `DateTime`.
    pub fn from_interface<Z: ToPortaZone>(value: &DateTime<Z>) -> Self {
        let zone = value.timezone().to_porta_zone();
        Self {
            datetime: value.with_timezone(&zone),
        }
    }

    /// Formats any `DateTime` as a billing datetime string in UTC. The value
    /// itself is left alone.
    pub fn format_date_time<Z: TimeZone>(value: &DateTime<Z>) -> String {
        value
            .with_timezone(&Utc)
            .format(Self::PORTA_DATETIME)
            .to_string()
    }

    pub fn format_porta(&self) -> String {
        Self::format_date_time(&self.datetime)
    }

    pub fn format_porta_date(&self) -> String {
        self.to_utc().format(Self::PORTA_DATE).to_string()
    }

    /// Formats in the timestamp's own timezone.
    pub fn format(&self, fmt: &str) -> String {
        self.datetime.format(fmt).to_string()
    }

    pub fn year(&self) -> i32 {
        self.datetime.year()
    }

    pub fn month(&self) -> u32 {
        self.datetime.month()
    }

    pub fn day(&self) -> u32 {
        self.datetime.day()
    }

    pub fn hour(&self) -> u32 {
        self.datetime.hour()
    }

    pub fn minute(&self) -> u32 {
        self.datetime.minute()
    }

    pub fn second(&self) -> u32 {
        self.datetime.second()
    }

    pub fn timezone(&self) -> PortaZone {
        self.datetime.timezone()
    }

    pub fn timestamp(&self) -> i64 {
        self.datetime.timestamp()
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.datetime.with_timezone(&Utc)
    }

    pub fn as_datetime(&self) -> &DateTime<PortaZone> {
        &self.datetime
    }

    pub fn with_timezone(&self, timezone: impl Into<TimezoneArg>) -> Result<Self> {
        let zone = prepare_timezone(timezone)?;
        Ok(Self {
            datetime: self.datetime.with_timezone(&zone),
        })
    }

    pub fn set_timezone(&mut self, timezone: impl Into<TimezoneArg>) -> Result<&mut Self> {
        *self = self.with_timezone(timezone)?;
        Ok(self)
    }

    fn at_local(&self, date: NaiveDate, time: NaiveTime) -> Self {
        let zone = self.timezone();
        trace!("Moving {} to {} {} in {}", self, date, time, zone);
        Self {
            datetime: resolve_local(&zone, date.and_time(time)),
        }
    }

    fn local_date(&self) -> NaiveDate {
        self.datetime.date_naive()
    }

    /// 00:00:00 of the same local day.
    pub fn first_moment(&self) -> Self {
        self.at_local(self.local_date(), NaiveTime::default())
    }

    /// 23:59:59 of the same local day.
    pub fn last_moment(&self) -> Self {
        let time = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        self.at_local(self.local_date(), time)
    }

    /// 00:00:00 of the next local day. On the last day chrono can represent
    /// this is the first moment of that same day.
    pub fn first_moment_next_day(&self) -> Self {
        let date = self.local_date();
        self.at_local(date.succ_opt().unwrap_or(date), NaiveTime::default())
    }

    /// 00:00:00 on the first day of the next local month. In the last month
    /// chrono can represent this stays on the current day.
    pub fn first_moment_of_next_month(&self) -> Self {
        // Midnight first, so the month jump starts from a fixed time of day.
        let midnight = self.first_moment();
        let date = midnight.local_date();
        midnight.at_local(first_of_next_month(date).unwrap_or(date), NaiveTime::default())
    }

    pub fn set_first_moment(&mut self) -> &mut Self {
        *self = self.first_moment();
        self
    }

    pub fn set_last_moment(&mut self) -> &mut Self {
        *self = self.last_moment();
        self
    }

    pub fn set_first_moment_of_next_month(&mut self) -> &mut Self {
        *self = self.first_moment_of_next_month();
        self
    }

    pub fn first_moment_string(&self) -> String {
        self.first_moment().format_porta()
    }

    pub fn last_moment_string(&self) -> String {
        self.last_moment().format_porta()
    }

    pub fn first_moment_next_day_string(&self) -> String {
        self.first_moment_next_day().format_porta()
    }

    /// Share of `fee` covering the rest of the local month, today included.
    ///
    /// The remaining day count is rounded before it is multiplied, then the
    /// product is divided by the month length.
    pub fn prorate_till_end_of_month(&self, fee: f64) -> f64 {
        let days_in_month = days_in_month(self.local_date()) as f64;
        let day_of_month = self.day() as f64;

        (days_in_month - day_of_month + 1.0).round() * fee / days_in_month
    }

    pub fn in_future(&self) -> bool {
        self.in_future_at(Utc::now())
    }

    pub fn in_past(&self) -> bool {
        self.in_past_at(Utc::now())
    }

    pub fn in_future_at(&self, now: DateTime<Utc>) -> bool {
        self.to_utc() > now
    }

    pub fn in_past_at(&self, now: DateTime<Utc>) -> bool {
        self.to_utc() < now
    }

    /// Inclusive range check; a missing bound leaves that side open.
    pub fn between(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
        let instant = self.to_utc();
        from.is_none_or(|from| instant >= from) && to.is_none_or(|to| instant <= to)
    }
}

impl Default for PortaDateTime {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for PortaDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_porta())
    }
}

impl FromStr for PortaDateTime {
    type Err = PortaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s, PortaZone::UTC)
    }
}

impl From<&PortaDateTime> for DateTime<Utc> {
    fn from(value: &PortaDateTime) -> Self {
        value.to_utc()
    }
}

impl From<PortaDateTime> for DateTime<Utc> {
    fn from(value: PortaDateTime) -> Self {
        value.to_utc()
    }
}

impl PartialEq for PortaDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.to_utc() == other.to_utc()
    }
}

impl Eq for PortaDateTime {}

impl PartialOrd for PortaDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PortaDateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc().cmp(&other.to_utc())
    }
}

impl Hash for PortaDateTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_utc().hash(state);
    }
}

impl Serialize for PortaDateTime {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_porta())
    }
}

impl<'de> Deserialize<'de> for PortaDateTime {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_porta_string(&s, PortaZone::UTC).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    const ZONE: &str = "Pacific/Palau";
    const DATETIME: &str = "2023-03-20 07:38:17";
    const DATE: &str = "2023-03-20";
    const LOCAL_DATETIME: &str = "2023-03-20 16:38:17";
    const FIRST_MOMENT: &str = "2023-03-19 15:00:00";
    const LAST_MOMENT: &str = "2023-03-20 14:59:59";
    const NEXT_FIRST: &str = "2023-03-20 15:00:00";

    fn palau_timestamp() -> PortaDateTime {
        PortaDateTime::new(LOCAL_DATETIME, ZONE).unwrap()
    }

    #[test]
    fn test_create() {
        let by_name = PortaDateTime::new(LOCAL_DATETIME, ZONE).unwrap();
        let by_zone = PortaDateTime::new(LOCAL_DATETIME, chrono_tz::Pacific::Palau).unwrap();
        assert_eq!(by_name.format_porta(), DATETIME);
        assert_eq!(by_zone.format_porta(), DATETIME);
        assert_eq!(by_name.timezone().name(), ZONE);
        assert_eq!(by_name.hour(), 16);
    }

    #[test]
    fn test_create_rejects_non_timezone_argument() {
        let err = PortaDateTime::new(LOCAL_DATETIME, &json!([])).unwrap_err();
        assert!(err.is_invalid_timezone_argument());

        // the timezone is checked before the datetime is looked at
        let err = PortaDateTime::new("not a date", &json!({})).unwrap_err();
        assert!(err.is_invalid_timezone_argument());
    }

    #[test]
    fn test_factories_reject_non_timezone_argument() {
        let err = PortaDateTime::from_porta_string(DATETIME, &json!([])).unwrap_err();
        assert!(err.is_invalid_timezone_argument());

        let err = PortaDateTime::from_porta_date_string(DATE, &json!({})).unwrap_err();
        assert!(err.is_invalid_timezone_argument());

        let err = PortaDateTime::from_porta_date_string("not a date", &json!(42)).unwrap_err();
        assert!(err.is_invalid_timezone_argument());
    }

    #[test]
    fn test_create_unknown_timezone() {
        let err = PortaDateTime::new(LOCAL_DATETIME, "Nowhere/Special").unwrap_err();
        assert_eq!(err, PortaError::UnknownTimezone("Nowhere/Special".to_string()));
    }

    #[test]
    fn test_create_from_porta_string() {
        let utc = PortaDateTime::from_porta_string(DATETIME, "UTC").unwrap();
        assert_eq!(utc.format(PortaDateTime::PORTA_DATETIME), DATETIME);

        let local = PortaDateTime::from_porta_string(DATETIME, ZONE).unwrap();
        assert_eq!(local.format(PortaDateTime::PORTA_DATETIME), LOCAL_DATETIME);
        assert_eq!(local.format_porta(), DATETIME);
    }

    #[test]
    fn test_porta_string_round_trip_through_zones() {
        for zone in ["UTC", ZONE, "America/New_York", "Asia/Kolkata", "+05:45"] {
            let datetime = PortaDateTime::from_porta_string(DATETIME, zone).unwrap();
            assert_eq!(datetime.format_porta(), DATETIME, "zone {}", zone);
        }
    }

    #[test]
    fn test_create_from_date_string() {
        let datetime = PortaDateTime::from_porta_date_string(DATE, ZONE).unwrap();
        assert_eq!(datetime.format_porta(), FIRST_MOMENT);
        assert!(PortaDateTime::from_porta_date_string("20/03/2023", ZONE).is_err());
    }

    #[test]
    fn test_create_and_format_from_interface() {
        let local = chrono_tz::Pacific::Palau
            .with_ymd_and_hms(2023, 3, 20, 16, 38, 17)
            .unwrap();
        let datetime = PortaDateTime::from_interface(&local);
        assert_eq!(datetime.format_porta(), DATETIME);
        assert_eq!(datetime.timezone().name(), ZONE);
        assert_eq!(PortaDateTime::format_date_time(&local), DATETIME);
        assert_eq!(local.format("%H:%M").to_string(), "16:38");
    }

    #[test]
    fn test_moments() {
        let datetime = palau_timestamp();
        assert_eq!(datetime.first_moment_string(), FIRST_MOMENT);
        assert_eq!(datetime.last_moment_string(), LAST_MOMENT);
        assert_eq!(datetime.first_moment_next_day_string(), NEXT_FIRST);
        // the getters work on copies
        assert_eq!(datetime.format_porta(), DATETIME);
    }

    #[test]
    fn test_set_moments_mutate_in_place() {
        let mut datetime = palau_timestamp();
        datetime.set_first_moment();
        assert_eq!(datetime.format_porta(), FIRST_MOMENT);

        datetime.set_last_moment();
        assert_eq!(datetime.format_porta(), LAST_MOMENT);

        let mut datetime = palau_timestamp();
        assert_eq!(
            datetime.set_first_moment_of_next_month().format_porta(),
            "2023-03-31 15:00:00"
        );
        assert_eq!(datetime.format(PortaDateTime::PORTA_DATETIME), "2023-04-01 00:00:00");
    }

    #[test]
    fn test_moments_when_local_midnight_is_skipped() {
        // Santiago jumps from 00:00 -04 to 01:00 -03 on 2023-09-03
        let santiago = PortaDateTime::new("2023-09-03 12:00:00", "America/Santiago").unwrap();
        let first = santiago.first_moment();
        assert_eq!(first.format_porta(), "2023-09-03 04:00:00");
        assert_eq!(first.format(PortaDateTime::PORTA_DATETIME), "2023-09-03 01:00:00");
        assert_eq!(santiago.first_moment_string(), "2023-09-03 04:00:00");

        let saturday = PortaDateTime::new("2023-09-02 18:00:00", "America/Santiago").unwrap();
        assert_eq!(saturday.first_moment_next_day_string(), "2023-09-03 04:00:00");

        let date = PortaDateTime::from_porta_date_string("2023-09-03", "America/Santiago").unwrap();
        assert_eq!(date.format_porta(), "2023-09-03 04:00:00");
    }

    #[test]
    fn test_moments_clamp_at_end_of_range() {
        let noon = NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap();
        let end = PortaDateTime::from_datetime(PortaZone::UTC.from_utc_datetime(&noon));
        assert_eq!(end.first_moment_next_day(), end.first_moment());
        assert_eq!(end.first_moment_of_next_month(), end.first_moment());
        assert_eq!(end.prorate_till_end_of_month(31.0), 1.0);
    }

    #[test]
    fn test_first_moment_of_next_month_edges() {
        let end_of_january = PortaDateTime::new("2023-01-31 23:59:59", "UTC").unwrap();
        assert_eq!(
            end_of_january.first_moment_of_next_month().format_porta(),
            "2023-02-01 00:00:00"
        );

        let december = PortaDateTime::new("2023-12-15 10:00:00", "UTC").unwrap();
        assert_eq!(
            december.first_moment_of_next_month().format_porta(),
            "2024-01-01 00:00:00"
        );
    }

    #[test]
    fn test_prorate_till_end_of_month() {
        let datetime = palau_timestamp();
        assert_eq!(datetime.prorate_till_end_of_month(130.0), 130.0 * 12.0 / 31.0);

        let first = PortaDateTime::new("2023-02-01 12:00:00", "UTC").unwrap();
        assert_eq!(first.prorate_till_end_of_month(28.0), 28.0);

        let last = PortaDateTime::new("2024-02-29 12:00:00", "UTC").unwrap();
        assert_eq!(last.prorate_till_end_of_month(29.0), 1.0);
    }

    #[test]
    fn test_prorate_uses_local_calendar() {
        // 2023-03-31 20:00 UTC is already April 1st in Palau
        let datetime = PortaDateTime::from_porta_string("2023-03-31 20:00:00", ZONE).unwrap();
        assert_eq!(datetime.prorate_till_end_of_month(30.0), 30.0);
    }

    #[test]
    fn test_future_and_past() {
        let datetime = palau_timestamp();
        let now = datetime.to_utc();

        assert!(datetime.in_future_at(now - Duration::seconds(1)));
        assert!(!datetime.in_past_at(now - Duration::seconds(1)));
        assert!(datetime.in_past_at(now + Duration::seconds(1)));
        assert!(!datetime.in_future_at(now + Duration::seconds(1)));
        assert!(!datetime.in_future_at(now));
        assert!(!datetime.in_past_at(now));

        assert!(datetime.in_past());
        assert!(PortaDateTime::new("+1 year", ZONE).unwrap().in_future());
    }

    #[test]
    fn test_between() {
        let datetime = palau_timestamp();
        let instant = datetime.to_utc();
        let before = instant - Duration::days(1);
        let after = instant + Duration::days(1);

        assert!(datetime.between(None, None));
        assert!(datetime.between(Some(before), None));
        assert!(datetime.between(None, Some(after)));
        assert!(datetime.between(Some(before), Some(after)));
        assert!(datetime.between(Some(instant), Some(instant)));
        assert!(!datetime.between(Some(after), None));
        assert!(!datetime.between(None, Some(before)));
        assert!(!datetime.between(Some(after), Some(before)));
    }

    #[test]
    fn test_equality_ignores_timezone() {
        let utc = PortaDateTime::from_porta_string(DATETIME, "UTC").unwrap();
        let palau = palau_timestamp();
        assert_eq!(utc, palau);
        assert!(utc.first_moment() < palau);
    }

    #[test]
    fn test_with_timezone_keeps_instant() {
        let mut datetime = palau_timestamp();
        let berlin = datetime.with_timezone("Europe/Berlin").unwrap();
        assert_eq!(berlin.format_porta(), DATETIME);
        assert_eq!(berlin.hour(), 8);

        datetime.set_timezone("UTC").unwrap();
        assert_eq!(datetime.hour(), 7);
        assert!(datetime.set_timezone(&json!(null)).is_err());
    }

    #[test]
    fn test_serde() {
        let datetime = palau_timestamp();
        let value = serde_json::to_value(&datetime).unwrap();
        assert_eq!(value, json!(DATETIME));

        let parsed: PortaDateTime = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, datetime);
        assert!(parsed.timezone().is_utc());

        assert!(serde_json::from_value::<PortaDateTime>(json!("later")).is_err());
    }

    #[test]
    fn test_display_and_from_str() {
        let datetime: PortaDateTime = DATETIME.parse().unwrap();
        assert_eq!(datetime.to_string(), DATETIME);
        assert_eq!(datetime.format_porta_date(), DATE);
        assert_eq!(datetime.timestamp(), 1679297897);
    }
}
