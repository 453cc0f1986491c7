//! Priority merge of window sets into one timeline.
//!
//! Vacation filter spans and special days are *priority intervals*: any
//! pattern window overlapping one is truncated around it (or dropped when fully
//! covered) rather than deleted outright. The truncation is a pure fold over
//! the priority intervals, so each pass can be tested on its own.

use chrono::{DateTime, Duration, Utc};

use crate::window::{PresenceWindow, WindowSource};

/// Windows ending more than this many days before now are dropped.
pub const HISTORY_RETENTION_DAYS: i64 = 365;

/// Subtract `[start, end)` from every window in `windows`.
///
/// Non-overlapping windows pass through unchanged; a partially covered window
/// is replaced by its uncovered head and/or tail, each keeping label and source.
pub fn subtract_interval(
    windows: Vec<PresenceWindow>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<PresenceWindow> {
    windows
        .into_iter()
        .flat_map(|w| {
            if !w.overlaps(start, end) {
                return vec![w];
            }
            let head = (w.start < start).then(|| w.with_bounds(w.start, start)).flatten();
            let tail = (w.end > end).then(|| w.with_bounds(end, w.end)).flatten();
            head.into_iter().chain(tail).collect()
        })
        .collect()
}

/// Priority intervals taken from the vacation-side windows.
///
/// Filter spans and special days win; when neither exists every vacation
/// display window is used instead.
pub fn priority_intervals(vacation_windows: &[PresenceWindow]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let explicit: Vec<_> = vacation_windows
        .iter()
        .filter(|w| matches!(w.source, WindowSource::VacationFilter | WindowSource::Special))
        .map(|w| (w.start, w.end))
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }
    vacation_windows.iter().map(|w| (w.start, w.end)).collect()
}

/// Pattern windows left after removing every priority interval.
pub fn truncate_pattern(
    pattern_windows: Vec<PresenceWindow>,
    vacation_windows: &[PresenceWindow],
) -> Vec<PresenceWindow> {
    priority_intervals(vacation_windows)
        .into_iter()
        .fold(pattern_windows, |active, (start, end)| {
            subtract_interval(active, start, end)
        })
}

/// Merge every window set into the displayed timeline, sorted by start.
///
/// `vacation_windows` holds vacation display windows, filter windows and
/// parental-day windows; filter windows steer truncation and never reach the
/// output. `extra_windows` (custom, manual, recurring exceptions) are added as-is.
pub fn merge(
    now: DateTime<Utc>,
    pattern_windows: Vec<PresenceWindow>,
    vacation_windows: &[PresenceWindow],
    extra_windows: Vec<PresenceWindow>,
) -> Vec<PresenceWindow> {
    let surviving = truncate_pattern(pattern_windows, vacation_windows);
    let history_floor = now - Duration::days(HISTORY_RETENTION_DAYS);

    let mut merged: Vec<PresenceWindow> = vacation_windows
        .iter()
        .filter(|w| w.source.is_displayed())
        .cloned()
        .chain(extra_windows)
        .chain(surviving)
        .filter(|w| w.end > history_floor)
        .collect();
    merged.sort_by_key(|w| (w.start, w.end));
    merged
}

/// A detected overlap between two windows of different sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub first: PresenceWindow,
    pub second: PresenceWindow,
    pub overlap_minutes: i64,
}

/// Pairs of displayed windows from different sources that overlap in time.
///
/// Adjacent windows (one ends exactly when the other starts) do not overlap.
pub fn find_overlaps(windows: &[PresenceWindow]) -> Vec<Overlap> {
    let mut overlaps = Vec::new();
    for (i, a) in windows.iter().enumerate() {
        for b in &windows[i + 1..] {
            if a.source == b.source || !a.source.is_displayed() || !b.source.is_displayed() {
                continue;
            }
            if a.overlaps(b.start, b.end) {
                let overlap_start = a.start.max(b.start);
                let overlap_end = a.end.min(b.end);
                overlaps.push(Overlap {
                    first: a.clone(),
                    second: b.clone(),
                    overlap_minutes: (overlap_end - overlap_start).num_minutes(),
                });
            }
        }
    }
    overlaps
}
