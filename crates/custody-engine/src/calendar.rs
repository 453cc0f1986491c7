//! Analytic calendar arithmetic: Easter, public holidays, parental days,
//! ISO week parity and the shared end-date resolution rule.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::config::Country;

/// Easter Sunday for a Gregorian year (Anonymous Gregorian algorithm).
///
/// `None` only for years outside chrono's representable range.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Public holidays of one year.
///
/// Only France is modelled; other countries have no analytic holiday set and
/// return an empty set. Alsace-Moselle adds St Stephen's Day and Good Friday.
pub fn public_holidays(year: i32, country: Country, alsace_moselle: bool) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();
    if country != Country::France {
        return days;
    }

    let fixed = [(1, 1), (5, 1), (5, 8), (7, 14), (8, 15), (11, 1), (11, 11), (12, 25)];
    days.extend(
        fixed
            .iter()
            .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(year, m, d)),
    );

    if alsace_moselle {
        days.extend(NaiveDate::from_ymd_opt(year, 12, 26));
    }
    let Some(easter) = easter_sunday(year) else {
        return days;
    };
    days.insert(easter + Duration::days(1)); // Easter Monday
    days.insert(easter + Duration::days(39)); // Ascension
    days.insert(easter + Duration::days(50)); // Whit Monday
    if alsace_moselle {
        days.insert(easter - Duration::days(2));
    }
    days
}

/// Public holidays over an inclusive span of years.
pub fn public_holidays_between(
    first_year: i32,
    last_year: i32,
    country: Country,
    alsace_moselle: bool,
) -> BTreeSet<NaiveDate> {
    (first_year..=last_year)
        .flat_map(|year| public_holidays(year, country, alsace_moselle))
        .collect()
}

/// Mother's Day and Father's Day of a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentDays {
    pub mother: NaiveDate,
    pub father: NaiveDate,
}

/// Mother's Day is the last Sunday of May, pushed one week when it collides
/// with Pentecost. Father's Day is the third Sunday of June.
pub fn parent_days(year: i32) -> Option<ParentDays> {
    let last_may = NaiveDate::from_ymd_opt(year, 5, 31)?;
    let mut mother = on_or_before(last_may, Weekday::Sun);
    let pentecost = easter_sunday(year)? + Duration::days(49);
    if mother == pentecost {
        mother += Duration::days(7);
    }

    let first_june = NaiveDate::from_ymd_opt(year, 6, 1)?;
    let father = on_or_after(first_june, Weekday::Sun) + Duration::days(14);

    Some(ParentDays { mother, father })
}

/// The latest date on or before `date` falling on `weekday`.
pub fn on_or_before(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let back = (date.weekday().num_days_from_monday() + 7 - weekday.num_days_from_monday()) % 7;
    date - Duration::days(i64::from(back))
}

/// The earliest date on or after `date` falling on `weekday`.
pub fn on_or_after(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = days_until(date.weekday(), weekday);
    date + Duration::days(i64::from(ahead))
}

/// Days from `from` forward to the next `to` (0 when equal).
pub fn days_until(from: Weekday, to: Weekday) -> u32 {
    (to.num_days_from_monday() + 7 - from.num_days_from_monday()) % 7
}

/// Whether the ISO-8601 week number of `date` is even.
pub fn iso_week_is_even(date: NaiveDate) -> bool {
    date.iso_week().week() % 2 == 0
}

/// Whether the ISO week of `date` matches the requested parity.
pub fn iso_week_matches(date: NaiveDate, even: bool) -> bool {
    iso_week_is_even(date) == even
}

/// Roll `date` forward while it is a public holiday.
pub fn extend_past_holidays(mut date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> NaiveDate {
    while holidays.contains(&date) {
        date += Duration::days(1);
    }
    date
}

/// End-date resolution shared by every weekly pattern.
///
/// The end is the first `end_day` strictly after `start` (a same-weekday start
/// spans a full week), then rolled forward past consecutive public holidays.
pub fn resolve_end_date(
    start: NaiveDate,
    end_day: Weekday,
    holidays: &BTreeSet<NaiveDate>,
) -> NaiveDate {
    let mut days = days_until(start.weekday(), end_day);
    if days == 0 {
        days = 7;
    }
    extend_past_holidays(start + Duration::days(i64::from(days)), holidays)
}

/// The first `weekday` on or after January 1st of `year`.
pub fn first_in_year(year: i32, weekday: Weekday) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(|jan_first| on_or_after(jan_first, weekday))
}

/// First Monday of `year` (on or after Jan 1) whose ISO week has the requested parity.
pub fn first_monday_with_parity(year: i32, even: bool) -> Option<NaiveDate> {
    let mut candidate = first_in_year(year, Weekday::Mon)?;
    while !iso_week_matches(candidate, even) {
        candidate += Duration::days(7);
    }
    Some(candidate)
}
