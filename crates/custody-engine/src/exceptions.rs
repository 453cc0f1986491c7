//! Windows outside the custody pattern: one-off ranges (configured custom
//! rules, manual service-call windows) and weekly recurring exceptions.
//!
//! Recurring exceptions are expanded through the `rrule` crate as RFC 5545
//! `FREQ=WEEKLY` rules anchored in the arrangement's timezone, so a
//! "Wednesday 12:00" exception stays at noon local time across DST changes.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::debug;

use crate::calendar::on_or_after;
use crate::config::{parse_time, CustomRule, RecurringException};
use crate::dst::LocalCalendar;
use crate::error::{CustodyError, Result};
use crate::window::{PresenceWindow, WindowSource};

/// Manual windows share the shape of configured custom rules.
pub type ManualRange = CustomRule;

/// How far around today recurring exceptions are expanded, in days.
pub const RECURRING_SPAN_DAYS: i64 = 365;

/// Upper bound on expanded instances; two years of weekly occurrences fit easily.
const MAX_OCCURRENCES: u16 = 520;

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an RFC 3339 timestamp, or a naive timestamp interpreted in local time.
pub fn parse_instant(value: &str, calendar: &LocalCalendar) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| calendar.resolve(naive))
}

/// Convert start/end ranges into windows, skipping entries that are missing,
/// unparseable or inverted.
pub fn range_windows(
    ranges: &[CustomRule],
    source: WindowSource,
    default_label: &str,
    calendar: &LocalCalendar,
) -> Vec<PresenceWindow> {
    ranges
        .iter()
        .filter_map(|range| {
            let start = range.start.as_deref().and_then(|s| parse_instant(s, calendar));
            let end = range.end.as_deref().and_then(|s| parse_instant(s, calendar));
            let label = range.label.as_deref().unwrap_or(default_label);
            let window = start
                .zip(end)
                .and_then(|(start, end)| PresenceWindow::new(start, end, label, source));
            if window.is_none() {
                debug!(?range, %source, "skipping invalid range");
            }
            window
        })
        .collect()
}

/// Local dates of a weekly recurrence from `first` through `last` (inclusive).
///
/// # Errors
/// Returns `CustodyError::InvalidRule` if the generated rule text is rejected
/// by the `rrule` parser.
pub fn expand_weekly(first: NaiveDate, last: NaiveDate, time: NaiveTime, tz: Tz) -> Result<Vec<NaiveDate>> {
    if last < first {
        return Ok(Vec::new());
    }
    let dtstart = first.and_time(time).format("%Y%m%dT%H%M%S");
    let mut until = last
        .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    // The rrule crate requires UNTIL in UTC form when DTSTART is UTC.
    if tz == Tz::UTC {
        until.push('Z');
    }
    let text = format!(
        "DTSTART;TZID={}:{}\nRRULE:FREQ=WEEKLY;UNTIL={}",
        tz.name(),
        dtstart,
        until
    );
    let rule_set: RRuleSet = text
        .parse()
        .map_err(|e| CustodyError::InvalidRule(format!("{}", e)))?;

    Ok(rule_set
        .all(MAX_OCCURRENCES)
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&tz).date_naive())
        .collect())
}

/// Expand recurring weekday exceptions over `[today - 365d, today + 365d]`,
/// clipped to each entry's optional date range.
pub fn recurring_windows(
    now: DateTime<Utc>,
    exceptions: &[RecurringException],
    calendar: &LocalCalendar,
) -> Vec<PresenceWindow> {
    let today = calendar.date_of(now);
    let range_start = today - Duration::days(RECURRING_SPAN_DAYS);
    let range_end = today + Duration::days(RECURRING_SPAN_DAYS);

    let mut windows = Vec::new();
    for item in exceptions {
        let Some(weekday) = item
            .weekday
            .and_then(|d| u8::try_from(d).ok())
            .and_then(|d| Weekday::try_from(d).ok())
        else {
            debug!(?item, "skipping recurring exception with invalid weekday");
            continue;
        };
        let times = item
            .start_time
            .as_deref()
            .and_then(parse_time)
            .zip(item.end_time.as_deref().and_then(parse_time))
            .filter(|(start, end)| end > start);
        let Some((start_time, end_time)) = times else {
            debug!(?item, "skipping recurring exception with invalid times");
            continue;
        };

        let parse_date = |v: &Option<String>| {
            v.as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        };
        let first = parse_date(&item.start_date).map_or(range_start, |d| d.max(range_start));
        let last = parse_date(&item.end_date).map_or(range_end, |d| d.min(range_end));
        let first = on_or_after(first, weekday);

        let dates = match expand_weekly(first, last, start_time, calendar.tz) {
            Ok(dates) => dates,
            Err(err) => {
                debug!(?item, %err, "skipping recurring exception");
                continue;
            }
        };
        let label = item.label.as_deref().unwrap_or("Recurring exception");
        for date in dates {
            let bounds = calendar.at(date, start_time).zip(calendar.at(date, end_time));
            if let Some((start, end)) = bounds {
                windows.extend(PresenceWindow::new(
                    start,
                    end,
                    label,
                    WindowSource::ExceptionRecurring,
                ));
            }
        }
    }
    windows
}
