//! School-holiday custody: effective bounds, split rules, parental days, and
//! the "current period / next vacation" outlook.
//!
//! Raw holiday records describe the school calendar. Custody follows the
//! pickup/return routine instead: the child is collected on the Friday before
//! the break and handed back on the configured end weekday. Every rule in this
//! module works on those *effective* bounds.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{iso_week_matches, on_or_after, on_or_before, parent_days};
use crate::config::{Config, ParentalRole, SplitMode, SummerMode, VacationRule};
use crate::dst::LocalCalendar;
use crate::holidays::VacationPeriod;
use crate::presence::days_between;
use crate::window::{PresenceWindow, WindowSource};

/// Words identifying the summer break in provider names.
const SUMMER_KEYWORDS: [&str; 3] = ["été", "summer", "ete"];

/// Custody-adjusted bounds of one holiday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub midpoint: DateTime<Utc>,
}

/// Half of a holiday assigned to this parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    First,
    Second,
}

/// Which half this parent gets in a given year.
pub fn assigned_half(year: i32, mode: SplitMode) -> Half {
    let odd = year.rem_euclid(2) == 1;
    match (mode, odd) {
        (SplitMode::OddFirst, true) | (SplitMode::OddSecond, false) => Half::First,
        (SplitMode::OddFirst, false) | (SplitMode::OddSecond, true) => Half::Second,
    }
}

/// `[start, mid)` and `[mid, end)` around the exact midpoint.
pub fn halves(start: DateTime<Utc>, end: DateTime<Utc>) -> [(DateTime<Utc>, DateTime<Utc>); 2] {
    let mid = start + (end - start) / 2;
    [(start, mid), (mid, end)]
}

/// Four equal parts; the last part ends exactly at `end`.
pub fn quarters(start: DateTime<Utc>, end: DateTime<Utc>) -> [(DateTime<Utc>, DateTime<Utc>); 4] {
    let step = (end - start) / 4;
    [
        (start, start + step),
        (start + step, start + step * 2),
        (start + step * 2, start + step * 3),
        (start + step * 3, end),
    ]
}

/// School or vacation, from the holiday calendar alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    School,
    Vacation,
}

/// A holiday as shown to consumers: official and effective bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidaySummary {
    pub name: String,
    pub zone: String,
    pub official_start: DateTime<Utc>,
    pub official_end: DateTime<Utc>,
    pub effective_start: DateTime<Utc>,
    pub effective_end: DateTime<Utc>,
}

/// This parent's next custody segment inside a school holiday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingVacation {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days_until: f64,
}

/// Holiday-derived fields of a computation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VacationOutlook {
    pub current_period: Period,
    pub vacation_name: Option<String>,
    pub next_vacation: Option<UpcomingVacation>,
    pub school_holidays: Vec<HolidaySummary>,
}

/// Converts holiday records into custody windows for one configuration.
pub struct VacationWindowBuilder<'a> {
    config: &'a Config,
    calendar: LocalCalendar,
    arrival: NaiveTime,
    departure: NaiveTime,
}

impl<'a> VacationWindowBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            calendar: config.calendar(),
            arrival: config.arrival(),
            departure: config.departure(),
        }
    }

    /// Renormalize a raw holiday to custody semantics.
    ///
    /// - Start: the Friday on or before the official start, at arrival time.
    /// - End: when the source encodes the end as a midnight "school resumes"
    ///   marker, the day before that marker; otherwise the next configured end
    ///   weekday on or after the official end. At departure time.
    ///
    /// Falls back to the official dates with arrival/departure times when the
    /// normalized span would be inverted; `None` if even that is degenerate.
    pub fn effective_bounds(&self, period: &VacationPeriod) -> Option<EffectiveBounds> {
        let official_start = self.calendar.local(period.start);
        let official_end = self.calendar.local(period.end);

        let start_date = on_or_before(official_start.date_naive(), Weekday::Fri);
        let end_date = if official_end.time() == NaiveTime::MIN {
            official_end.date_naive() - Duration::days(1)
        } else {
            on_or_after(official_end.date_naive(), self.config.end_day)
        };

        let normalized = self
            .calendar
            .at(start_date, self.arrival)
            .zip(self.calendar.at(end_date, self.departure))
            .filter(|(start, end)| end > start);
        let (start, end) = match normalized {
            Some(bounds) => bounds,
            None => {
                let start = self.calendar.with_time(period.start, self.arrival)?;
                let end = self.calendar.with_time(period.end, self.departure)?;
                (start, end)
            }
        };
        if end <= start {
            return None;
        }
        Some(EffectiveBounds {
            start,
            end,
            midpoint: start + (end - start) / 2,
        })
    }

    pub fn is_summer(&self, period: &VacationPeriod) -> bool {
        let name = period.name.to_lowercase();
        SUMMER_KEYWORDS.iter().any(|kw| name.contains(kw))
            || matches!(self.calendar.date_of(period.start).month(), 7 | 8)
    }

    /// Filter windows for every holiday not yet over, plus this parent's display windows.
    pub fn build(&self, now: DateTime<Utc>, periods: &[VacationPeriod]) -> Vec<PresenceWindow> {
        let mut windows = Vec::new();
        for period in periods {
            let Some(bounds) = self.effective_bounds(period) else {
                continue;
            };
            if bounds.end < now {
                continue;
            }

            windows.extend(PresenceWindow::new(
                bounds.start,
                bounds.end,
                format!("{} - Full period (Filter)", period.name),
                WindowSource::VacationFilter,
            ));

            let (segments, rule_label) = self.custody_segments(period, &bounds);
            for (start, end) in segments {
                windows.extend(PresenceWindow::new(
                    start,
                    end,
                    format!("School holidays - {} ({})", period.name, rule_label),
                    WindowSource::Vacation,
                ));
            }
        }
        windows
    }

    /// This parent's segments of one holiday and the label of the rule used.
    ///
    /// Segments with `end <= start` are dropped; a rule that does not apply to
    /// this year or week yields no segment at all.
    pub fn custody_segments(
        &self,
        period: &VacationPeriod,
        bounds: &EffectiveBounds,
    ) -> (Vec<(DateTime<Utc>, DateTime<Utc>)>, &'static str) {
        let year = self.calendar.date_of(bounds.start).year();
        let half = assigned_half(year, self.config.vacation_split_mode);

        let (segments, label): (Vec<_>, &'static str) = match self.config.vacation_rule {
            Some(rule) => (self.legacy_rule_segments(rule, year, bounds), rule.label()),
            None if self.is_summer(period) && self.config.summer_split_mode == SummerMode::Quarter => {
                let parts = quarters(bounds.start, bounds.end);
                let picked = match half {
                    Half::First => vec![parts[0], parts[2]],
                    Half::Second => vec![parts[1], parts[3]],
                };
                (picked, "fortnight")
            }
            None => match half {
                Half::First => (vec![(bounds.start, bounds.midpoint)], "first half"),
                Half::Second => (vec![(bounds.midpoint, bounds.end)], "second half"),
            },
        };

        let segments = segments.into_iter().filter(|(s, e)| e > s).collect();
        (segments, label)
    }

    fn legacy_rule_segments(
        &self,
        rule: VacationRule,
        year: i32,
        bounds: &EffectiveBounds,
    ) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let start_date = self.calendar.date_of(bounds.start);
        let even_year = year.rem_euclid(2) == 0;

        let week_from = |first_day: NaiveDate, days: i64| -> Option<(DateTime<Utc>, DateTime<Utc>)> {
            let start = self.calendar.at(first_day, self.arrival)?.max(bounds.start);
            let end = self
                .calendar
                .at(first_day + Duration::days(days), self.departure)?
                .min(bounds.end);
            Some((start, end))
        };

        let segment = match rule {
            VacationRule::FirstHalf => Some((bounds.start, bounds.midpoint)),
            VacationRule::SecondHalf => Some((bounds.midpoint, bounds.end)),
            VacationRule::FirstWeek if !even_year => week_from(start_date, 7),
            VacationRule::SecondWeek if even_year => {
                week_from(start_date + Duration::days(7), 7)
            }
            VacationRule::FirstWeek | VacationRule::SecondWeek => None,
            VacationRule::EvenWeeks | VacationRule::OddWeeks => {
                let even = rule == VacationRule::EvenWeeks;
                let first = if iso_week_matches(start_date, even) {
                    start_date
                } else {
                    start_date + Duration::days(7)
                };
                week_from(first, 7)
            }
            VacationRule::EvenWeekends | VacationRule::OddWeekends => {
                let even = rule == VacationRule::EvenWeekends;
                let mut saturday = on_or_after(start_date, Weekday::Sat);
                if !iso_week_matches(saturday, even) {
                    saturday += Duration::days(7);
                }
                week_from(saturday, 1)
            }
        };
        segment.into_iter().collect()
    }

    /// Mother's/Father's Day windows for this year and next.
    ///
    /// The day belonging to the configured role is a displayed `special`
    /// window; the other parent's day becomes a `vacation_filter` that clears
    /// this parent's pattern for that day.
    pub fn parental_day_windows(&self, now: DateTime<Utc>) -> Vec<PresenceWindow> {
        if !self.config.auto_parent_days || self.config.parental_role == ParentalRole::None {
            return Vec::new();
        }
        let role = self.config.parental_role;
        let year = self.calendar.date_of(now).year();

        let mut windows = Vec::new();
        for days in [year, year + 1].into_iter().filter_map(parent_days) {
            let entries = [
                (days.mother, ParentalRole::Mother, "Mother's Day"),
                (days.father, ParentalRole::Father, "Father's Day"),
            ];
            for (day, owner, name) in entries {
                let (label, source) = if owner == role {
                    (name.to_string(), WindowSource::Special)
                } else {
                    (format!("{name} (other parent)"), WindowSource::VacationFilter)
                };
                let bounds = self
                    .calendar
                    .start_of_day(day)
                    .zip(self.calendar.start_of_day(day + Duration::days(1)));
                if let Some((start, end)) = bounds {
                    windows.extend(PresenceWindow::new(start, end, label, source));
                }
            }
        }
        windows
    }

    /// Current period, current vacation name and this parent's next vacation segment.
    pub fn outlook(&self, now: DateTime<Utc>, periods: &[VacationPeriod]) -> VacationOutlook {
        let mut bounded: Vec<(&VacationPeriod, EffectiveBounds)> = periods
            .iter()
            .filter_map(|p| self.effective_bounds(p).map(|b| (p, b)))
            .collect();
        bounded.sort_by_key(|(_, b)| b.start);

        let school_holidays = bounded
            .iter()
            .filter(|(_, b)| b.end >= now)
            .map(|(p, b)| HolidaySummary {
                name: p.name.clone(),
                zone: p.zone.clone(),
                official_start: p.start,
                official_end: p.end,
                effective_start: b.start,
                effective_end: b.end,
            })
            .collect();

        let current = bounded
            .iter()
            .find(|(_, b)| b.start <= now && now <= b.end);

        let next_vacation = match current {
            Some((period, bounds)) => {
                let (start, end) = self
                    .next_segment(period, bounds, now)
                    .unwrap_or((bounds.start, bounds.end));
                Some(UpcomingVacation {
                    name: period.name.clone(),
                    start,
                    end,
                    days_until: 0.0,
                })
            }
            None => bounded.iter().find_map(|(period, bounds)| {
                let (start, end) = self.next_segment(period, bounds, now)?;
                (start > now).then(|| UpcomingVacation {
                    name: period.name.clone(),
                    start,
                    end,
                    days_until: days_between(now, start),
                })
            }),
        };

        VacationOutlook {
            current_period: if current.is_some() {
                Period::Vacation
            } else {
                Period::School
            },
            vacation_name: current.map(|(p, _)| p.name.clone()),
            next_vacation,
            school_holidays,
        }
    }

    /// The first of this parent's segments not yet over, else the last one.
    /// With custody management disabled the whole effective span is the segment.
    fn next_segment(
        &self,
        period: &VacationPeriod,
        bounds: &EffectiveBounds,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if !self.config.enable_custody {
            return Some((bounds.start, bounds.end));
        }
        let (segments, _) = self.custody_segments(period, bounds);
        segments
            .iter()
            .find(|(_, end)| *end > now)
            .or_else(|| segments.last())
            .copied()
    }
}
