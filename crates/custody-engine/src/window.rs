//! Presence windows: the value objects every stage of the engine exchanges.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a window came from. Also its merge priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    Pattern,
    Vacation,
    /// Marks a span that suppresses the weekly pattern. Never shown to consumers.
    VacationFilter,
    Custom,
    Manual,
    ExceptionRecurring,
    Special,
    Override,
}

impl WindowSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowSource::Pattern => "pattern",
            WindowSource::Vacation => "vacation",
            WindowSource::VacationFilter => "vacation_filter",
            WindowSource::Custom => "custom",
            WindowSource::Manual => "manual",
            WindowSource::ExceptionRecurring => "exception_recurring",
            WindowSource::Special => "special",
            WindowSource::Override => "override",
        }
    }

    /// Whether consumers ever see windows of this source.
    pub fn is_displayed(&self) -> bool {
        !matches!(self, WindowSource::VacationFilter)
    }
}

impl fmt::Display for WindowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A half-open interval `[start, end)` during which the child is with this parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
    pub source: WindowSource,
}

impl PresenceWindow {
    /// Build a window, or `None` when the bounds are degenerate (`end <= start`).
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        label: impl Into<String>,
        source: WindowSource,
    ) -> Option<Self> {
        (end > start).then(|| Self {
            start,
            end,
            label: label.into(),
            source,
        })
    }

    /// A copy of this window with new bounds, keeping label and source.
    pub fn with_bounds(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        Self::new(start, end, self.label.clone(), self.source)
    }

    /// Half-open overlap: adjacent windows do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}
