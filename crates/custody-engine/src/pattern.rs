//! Recurring (non-vacation) presence windows from the configured custody type.
//!
//! Two families of generators:
//!
//! - **Fixed cycle** (`alternate_week`, `two_two_three`, `two_two_five_five`,
//!   `custom`): walk forward from a reference anchor in `cycle_length_days`
//!   steps and emit one window per `on` segment.
//! - **ISO week parity** (`alternate_weekend`, `alternate_week_parity`): walk
//!   week by week and emit a window for every week whose ISO number has the
//!   reference parity. Anchoring on the week number instead of a day offset
//!   keeps the alternation stable across DST changes and year boundaries.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use tracing::warn;

use crate::calendar::{
    extend_past_holidays, first_in_year, first_monday_with_parity, iso_week_matches,
    public_holidays_between, resolve_end_date,
};
use crate::config::{Config, CustodyType};
use crate::dst::LocalCalendar;
use crate::window::{PresenceWindow, WindowSource};

const HOLIDAY_SUFFIX: &str = " + Holiday";

/// Generates pattern windows for one configuration.
pub struct PatternWindowGenerator<'a> {
    config: &'a Config,
    calendar: LocalCalendar,
}

impl<'a> PatternWindowGenerator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            calendar: config.calendar(),
        }
    }

    /// Default generation horizon: at least 400 days, longer for long sync windows.
    ///
    /// Saturates at `now` for instants too close to the end of representable time.
    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.config.horizon_days())
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(now)
    }

    /// All pattern windows starting before `horizon`, from the reference anchor onward.
    ///
    /// Windows that a holiday extension makes overlap or touch are folded into
    /// one. Returns nothing when custody management is disabled.
    pub fn generate(&self, now: DateTime<Utc>, horizon: DateTime<Utc>) -> Vec<PresenceWindow> {
        if !self.config.enable_custody {
            return Vec::new();
        }
        let today = self.calendar.date_of(now);
        let until = self.calendar.date_of(horizon);
        let anchor_year = self.reference_year(today.year());
        let holidays = public_holidays_between(
            anchor_year - 1,
            until.year() + 1,
            self.config.country,
            self.config.alsace_moselle,
        );

        let windows = match self.config.custody_type {
            CustodyType::AlternateWeekend | CustodyType::AlternateWeekParity => {
                self.week_parity_windows(today, until, anchor_year, &holidays)
            }
            CustodyType::AlternateWeek
            | CustodyType::TwoTwoThree
            | CustodyType::TwoTwoFiveFive
            | CustodyType::Custom => self.cycle_windows(until, anchor_year, &holidays),
        };
        coalesce(windows)
    }

    /// Most recent year at or before `year` with the configured parity.
    fn reference_year(&self, year: i32) -> i32 {
        if self.config.reference_year.matches_year(year) {
            year
        } else {
            year - 1
        }
    }

    /// First cycle day: Jan 1 of the reference year moved to the configured start weekday.
    pub fn cycle_anchor(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let year = self.reference_year(self.calendar.date_of(now).year());
        first_in_year(year, self.config.start_day)
    }

    fn cycle_windows(
        &self,
        until: NaiveDate,
        anchor_year: i32,
        holidays: &BTreeSet<NaiveDate>,
    ) -> Vec<PresenceWindow> {
        let cycle = self.config.cycle();
        if cycle.cycle_length_days == 0 || cycle.segments.is_empty() {
            return Vec::new();
        }
        let custody_type = self.config.custody_type;
        let label = format!("Custody - {}", custody_type.label());
        let Some(mut pointer) = first_in_year(anchor_year, self.config.start_day) else {
            return Vec::new();
        };

        let mut windows = Vec::new();
        while pointer < until {
            let mut offset = Duration::zero();
            for segment in &cycle.segments {
                let segment_start = pointer + offset;
                let (segment_end, advance) = if custody_type == CustodyType::AlternateWeek {
                    // Tracks the configured end weekday; the next segment starts where this ends.
                    let end = resolve_end_date(segment_start, self.config.end_day, holidays);
                    (end, end - segment_start)
                } else {
                    let nominal = segment_start + Duration::days(i64::from(segment.days) - 1);
                    (
                        extend_past_holidays(nominal, holidays),
                        Duration::days(i64::from(segment.days)),
                    )
                };

                if segment.on {
                    windows.extend(self.window(segment_start, segment_end, label.clone()));
                }
                offset += advance;
            }
            pointer += Duration::days(i64::from(cycle.cycle_length_days));
        }
        windows
    }

    fn week_parity_windows(
        &self,
        today: NaiveDate,
        until: NaiveDate,
        anchor_year: i32,
        holidays: &BTreeSet<NaiveDate>,
    ) -> Vec<PresenceWindow> {
        let even = self.config.reference_year.is_even();
        let custody_type = self.config.custody_type;
        let no_holidays = BTreeSet::new();
        let weekend_offset = self.weekend_offset();

        let Some(mut pointer) = first_monday_with_parity(anchor_year, even) else {
            return Vec::new();
        };
        let history_floor = today - Duration::days(365);
        while pointer < history_floor {
            pointer += Duration::days(14);
            if !iso_week_matches(pointer, even) {
                pointer += Duration::days(7);
            }
        }

        let mut windows = Vec::new();
        while pointer < until {
            if iso_week_matches(pointer, even) {
                let start = match custody_type {
                    CustodyType::AlternateWeekend => pointer + weekend_offset,
                    _ => pointer,
                };
                let end = resolve_end_date(start, self.config.end_day, holidays);
                let nominal_end = resolve_end_date(start, self.config.end_day, &no_holidays);
                let suffix = if end != nominal_end { HOLIDAY_SUFFIX } else { "" };
                let label = format!("Custody - {}{}", custody_type.label(), suffix);
                windows.extend(self.window(start, end, label));
            }
            pointer += Duration::days(7);
        }
        windows
    }

    /// Days from Monday to the start of a custody weekend.
    fn weekend_offset(&self) -> Duration {
        match self.config.weekend_start_day {
            Weekday::Fri => Duration::days(4),
            Weekday::Sat => Duration::days(5),
            other => {
                warn!(weekend_start_day = %other, "weekends start on Friday or Saturday, using Friday");
                Duration::days(4)
            }
        }
    }

    fn window(&self, start: NaiveDate, end: NaiveDate, label: String) -> Option<PresenceWindow> {
        let start = self.calendar.at(start, self.config.arrival())?;
        let end = self.calendar.at(end, self.config.departure())?;
        PresenceWindow::new(start, end, label, WindowSource::Pattern)
    }
}

/// Fold windows that overlap or touch, keeping the earlier label.
fn coalesce(mut windows: Vec<PresenceWindow>) -> Vec<PresenceWindow> {
    windows.sort_by_key(|w| w.start);
    let mut folded: Vec<PresenceWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match folded.last_mut() {
            Some(last) if window.start <= last.end => last.end = last.end.max(window.end),
            _ => folded.push(window),
        }
    }
    folded
}
