use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Year for a day/month written without one: the next occurrence on or after `today`.
///
/// A day/month that does not exist in `today`'s year (29.02 outside a leap
/// year) resolves to `today`'s year so the caller's date construction rejects it.
pub fn year_for_day_month(day: u32, month: u32, today: NaiveDate) -> i32 {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(candidate) if candidate >= today => today.year(),
        Some(_) => today.year() + 1,
        None => today.year(),
    }
}

/// Year written in a `D.M.Y` match: a two-digit group lives in the 2000s,
/// a longer group is taken as written.
pub fn expand_year(digits: &str) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    Some(if digits.len() == 2 { 2000 + value } else { value })
}

/// Concrete year for a match: the written year, or the next occurrence of
/// the day/month when none was written.
pub fn normalize_year(year: Option<i32>, day: u32, month: u32, today: NaiveDate) -> i32 {
    year.unwrap_or_else(|| year_for_day_month(day, month, today))
}

/// Signed number of days from `today` to `date`.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Wall-clock date of `now` in the operator's time zone.
pub fn local_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Next instant strictly after `now` whose local time of day is `at`.
pub fn next_daily_run(now: DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        // `earliest` is None only inside a DST gap; that day is skipped.
        if let Some(target) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if target > now {
                return target;
            }
        }
        day = day + Duration::days(1);
    }
}
