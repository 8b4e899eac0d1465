use crate::zone::PortaZone;
use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, Offset, TimeZone,
};
use log::trace;

/// Number of days in the month of `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    last_of_month(date).day()
}

/// Moves `date` by `months` calendar months keeping the day number. A day
/// that does not exist in the target month spills into the next one, so
/// Jan 31 + 1 month is Mar 3 (or Mar 2 in a leap year).
pub fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = i64::from(date.year())
        .checked_mul(12)?
        .checked_add(i64::from(date.month0()))?
        .checked_add(months)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = total.rem_euclid(12) as u32 + 1;

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_signed(Duration::days(i64::from(date.day()) - 1))
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    // only the last month chrono can represent has no successor
    first_of_next_month(date)
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

pub fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    first_of_month(date).checked_add_months(Months::new(1))
}

/// Pins a local wall-clock time to an instant in `zone`.
///
/// Ambiguous times take the earlier instant. Times inside a DST gap are read
/// with the offset in force before the gap, which pushes them forward by the
/// length of the gap (02:30 on a spring-forward night becomes 03:30).
pub fn resolve_local(zone: &PortaZone, local: NaiveDateTime) -> DateTime<PortaZone> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(datetime) => datetime,
        LocalResult::Ambiguous(earliest, _) => {
            trace!("{} is ambiguous in {}, taking earlier instant", local, zone);
            earliest
        }
        LocalResult::None => {
            let before = local.checked_sub_signed(Duration::days(1)).unwrap_or(local);
            let offset = zone.offset_from_utc_datetime(&before).fix();
            let utc = local
                .checked_sub_signed(Duration::seconds(offset.local_minus_utc() as i64))
                .unwrap_or(local);
            trace!("{} falls in a gap in {}, moving forward", local, zone);
            zone.from_utc_datetime(&utc)
        }
    }
}
