//! Date-only scheduling rules.
//!
//! A parcel counts as *upcoming* for the whole of its pickup date, not just
//! until its window opens: staff keep processing arrivals throughout the
//! day. Every "upcoming vs past" decision in the system (the removal gate,
//! parcel views, cancel and no-show rules, and the SQL count query) goes
//! through [`start_of_day`] so the call sites cannot disagree.
//!
//! The comparison is `pickup >= local midnight of today`, never
//! `pickup > now`.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

/// How far past midnight (in minutes) to search for the first valid local
/// instant on days where midnight falls in a DST gap.
const DST_GAP_SEARCH_LIMIT_MINUTES: i64 = 240;
const DST_GAP_SEARCH_STEP_MINUTES: i64 = 15;

/// The first instant of `now`'s local calendar date, as UTC.
///
/// The local frame is `now`'s own time zone.
#[must_use]
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    local_midnight(&now.timezone(), now.date_naive())
}

/// Whether a parcel with the given earliest pickup instant is upcoming at
/// `now`.
///
/// True for any instant on `now`'s local date (regardless of the current
/// time of day) or later; false for anything before today's midnight.
#[must_use]
pub fn is_upcoming<Tz: TimeZone>(earliest_pickup: DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    earliest_pickup >= start_of_day(now)
}

/// The local calendar date of an instant in the given zone.
#[must_use]
pub fn local_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// UTC bounds `[start, end)` of a local calendar date.
#[must_use]
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(tz, date);
    let end = date
        .succ_opt()
        .map_or(DateTime::<Utc>::MAX_UTC, |next| local_midnight(tz, next));
    (start, end)
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);

    let mut offset = 0;
    while offset <= DST_GAP_SEARCH_LIMIT_MINUTES {
        let candidate = midnight + Duration::minutes(offset);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                return dt.with_timezone(&Utc);
            }
            LocalResult::None => offset += DST_GAP_SEARCH_STEP_MINUTES,
        }
    }

    // No zone in use has a gap this long; treat the naive midnight as UTC.
    midnight.and_utc()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn stockholm_summer() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    #[test]
    fn test_same_day_earlier_window_is_upcoming() {
        let now = utc("2026-10-19T15:00:00Z");
        assert!(is_upcoming(utc("2026-10-19T09:00:00Z"), &now));
    }

    #[test]
    fn test_midnight_and_last_millisecond_are_upcoming() {
        let now = utc("2026-10-19T15:00:00Z");
        assert!(is_upcoming(utc("2026-10-19T00:00:00Z"), &now));
        assert!(is_upcoming(utc("2026-10-19T23:59:59.999Z"), &now));
    }

    #[test]
    fn test_any_hour_today_regardless_of_clock() {
        for now_hour in [0, 6, 12, 23] {
            let now = utc(&format!("2026-10-19T{now_hour:02}:30:00Z"));
            for pickup_hour in [0, 8, 13, 23] {
                let pickup = utc(&format!("2026-10-19T{pickup_hour:02}:00:00Z"));
                assert!(is_upcoming(pickup, &now), "{pickup} at {now}");
            }
        }
    }

    #[test]
    fn test_yesterday_is_never_upcoming() {
        let now = utc("2026-10-19T00:00:01Z");
        assert!(!is_upcoming(utc("2026-10-18T23:59:59.999Z"), &now));
        assert!(!is_upcoming(utc("2026-10-18T00:00:00Z"), &now));
        assert!(!is_upcoming(utc("2025-01-01T12:00:00Z"), &now));
    }

    #[test]
    fn test_future_dates_are_upcoming() {
        let now = utc("2026-10-19T23:59:00Z");
        assert!(is_upcoming(utc("2026-10-20T00:00:00Z"), &now));
        assert!(is_upcoming(utc("2027-03-01T10:00:00Z"), &now));
    }

    #[test]
    fn test_is_idempotent() {
        let now = utc("2026-10-19T15:00:00Z");
        let pickup = utc("2026-10-19T09:00:00Z");
        let first = is_upcoming(pickup, &now);
        let second = is_upcoming(pickup, &now);
        assert_eq!(first, second);
        assert_eq!(start_of_day(&now), start_of_day(&now));
    }

    #[test]
    fn test_local_zone_defines_today() {
        // 00:30 local on the 19th is still the 18th in UTC.
        let now = utc("2026-10-18T22:30:00Z").with_timezone(&stockholm_summer());
        assert_eq!(start_of_day(&now), utc("2026-10-18T22:00:00Z"));

        // 00:10 local on the 19th.
        assert!(is_upcoming(utc("2026-10-18T22:10:00Z"), &now));
        // 23:59 local on the 18th.
        assert!(!is_upcoming(utc("2026-10-18T21:59:00Z"), &now));
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let (start, end) = day_bounds(date, &stockholm_summer());
        assert_eq!(start, utc("2026-10-18T22:00:00Z"));
        assert_eq!(end, utc("2026-10-19T22:00:00Z"));
    }

    #[test]
    fn test_local_date() {
        let instant = utc("2026-10-19T22:30:00Z");
        assert_eq!(
            local_date(instant, &stockholm_summer()),
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
        );
        assert_eq!(
            local_date(instant, &Utc),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
    }
}
