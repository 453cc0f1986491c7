//! DST transition policies and local-calendar conversion.
//!
//! Custody windows are defined in wall-clock terms ("Friday 16:15") but stored
//! as UTC instants. [`LocalCalendar`] performs that conversion for one IANA
//! timezone and applies a [`DstPolicy`] when a wall-clock time does not exist.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CustodyError, Result};

/// Policy for local times that fall in a DST gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Drop the window whose boundary falls in the gap.
    Skip,
    /// Move to the first valid wall-clock time after the gap.
    #[default]
    ShiftForward,
}

impl FromStr for DstPolicy {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(DstPolicy::Skip),
            "shift_forward" | "shift" => Ok(DstPolicy::ShiftForward),
            other => Err(CustodyError::InvalidConfig(format!(
                "unknown DST policy '{other}'"
            ))),
        }
    }
}

/// Wall-clock calendar for a single timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCalendar {
    pub tz: Tz,
    pub policy: DstPolicy,
}

impl LocalCalendar {
    pub fn new(tz: Tz, policy: DstPolicy) -> Self {
        Self { tz, policy }
    }

    /// Build a calendar from an IANA name.
    ///
    /// # Errors
    /// Returns `CustodyError::InvalidTimezone` if the name is not a known zone.
    pub fn from_name(name: &str, policy: DstPolicy) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|_| CustodyError::InvalidTimezone(name.to_string()))?;
        Ok(Self { tz, policy })
    }

    /// UTC instant of a local date + time, or `None` when the policy skips it.
    ///
    /// Ambiguous times (the repeated hour in autumn) resolve to the earlier instant.
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.resolve(date.and_time(time))
    }

    /// Local midnight at the start of `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.at(date, NaiveTime::MIN)
    }

    pub fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        if let Some(dt) = self.tz.from_local_datetime(&local).earliest() {
            return Some(dt.with_timezone(&Utc));
        }
        match self.policy {
            DstPolicy::Skip => None,
            // Gaps are at most one hour in every zone we serve; step through it in 15-minute increments.
            DstPolicy::ShiftForward => (1..=8).find_map(|step| {
                self.tz
                    .from_local_datetime(&(local + Duration::minutes(15 * step)))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
        }
    }

    /// The instant seen in this timezone.
    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.tz)
    }

    /// Local calendar date of an instant.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Replace the wall-clock time of an instant, keeping its local date.
    pub fn with_time(&self, instant: DateTime<Utc>, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.at(self.date_of(instant), time)
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::new(Tz::UTC, DstPolicy::default())
    }
}
