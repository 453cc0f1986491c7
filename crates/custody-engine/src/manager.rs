//! The per-arrangement orchestrator.
//!
//! [`ScheduleManager`] owns everything mutable about one arrangement: its
//! configuration, the holiday client and cache, manual windows, and the
//! presence override. Each [`ScheduleManager::compute_state`] call rebuilds the
//! whole timeline from that state and returns a fresh [`ScheduleComputation`].

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::exceptions::{range_windows, recurring_windows, ManualRange};
use crate::holidays::{HolidayClient, VacationPeriod};
use crate::merger::merge;
use crate::pattern::PatternWindowGenerator;
use crate::presence::{evaluate, OverrideState, PresenceOverride, Transition};
use crate::vacation::{HolidaySummary, Period, UpcomingVacation, VacationWindowBuilder};
use crate::window::{PresenceWindow, WindowSource};

/// How often a host should recompute every arrangement.
pub const REFRESH_INTERVAL: StdDuration = StdDuration::from_secs(15 * 60);

/// Display length of an override window when the override has no end.
const OPEN_OVERRIDE_HOURS: i64 = 1;

/// Free-form arrangement details passed through to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub location: Option<String>,
    pub notes: Option<String>,
    pub zone: Option<String>,
}

/// One complete answer for an arrangement at an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleComputation {
    pub computed_at: DateTime<Utc>,
    pub is_present: bool,
    pub next_arrival: Option<Transition>,
    pub next_departure: Option<Transition>,
    pub days_remaining: Option<f64>,
    pub current_period: Period,
    pub vacation_name: Option<String>,
    pub next_vacation: Option<UpcomingVacation>,
    pub school_holidays: Vec<HolidaySummary>,
    /// The merged timeline, past windows included.
    pub windows: Vec<PresenceWindow>,
    pub attributes: Attributes,
}

pub struct ScheduleManager {
    config: Config,
    holidays: HolidayClient,
    manual_ranges: Vec<ManualRange>,
    presence_override: Option<PresenceOverride>,
}

impl ScheduleManager {
    pub fn new(config: Config, holidays: HolidayClient) -> Self {
        Self {
            config,
            holidays,
            manual_ranges: Vec::new(),
            presence_override: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn holidays(&self) -> &HolidayClient {
        &self.holidays
    }

    pub fn presence_override(&self) -> Option<PresenceOverride> {
        self.presence_override
    }

    /// Replace the manual windows. Invalid ranges are skipped.
    ///
    /// Returns the number of ranges that produced a window.
    pub fn set_manual_windows(&mut self, ranges: &[ManualRange]) -> usize {
        let calendar = self.config.calendar();
        let accepted: Vec<ManualRange> = ranges
            .iter()
            .filter(|range| {
                !range_windows(std::slice::from_ref(*range), WindowSource::Manual, "", &calendar)
                    .is_empty()
            })
            .cloned()
            .collect();
        debug!(given = ranges.len(), accepted = accepted.len(), "manual windows replaced");
        self.manual_ranges = accepted;
        self.manual_ranges.len()
    }

    /// Force presence on or off, for `duration` from `now` or until cleared.
    ///
    /// A duration reaching past representable time is treated as unbounded.
    pub fn override_presence(
        &mut self,
        state: OverrideState,
        duration: Option<Duration>,
        now: DateTime<Utc>,
    ) {
        let until = duration.and_then(|d| now.checked_add_signed(d));
        info!(?state, ?until, "presence override set");
        self.presence_override = Some(PresenceOverride { state, until });
    }

    pub fn clear_override(&mut self) {
        self.presence_override = None;
    }

    /// Apply a partial configuration update (top-level JSON keys replace).
    ///
    /// # Errors
    /// Returns an error if `patch` is not an object or the merged document is
    /// not a valid configuration. The current configuration is kept on error.
    pub fn update_config(&mut self, patch: &Value) -> Result<()> {
        self.config = self.config.patched(patch)?;
        info!(child = %self.config.child_name, "configuration updated");
        Ok(())
    }

    async fn fetch_holidays(&self, now: DateTime<Utc>) -> Vec<VacationPeriod> {
        let zone = self
            .config
            .zone
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty());
        match zone {
            Some(zone) => {
                self.holidays
                    .list(self.config.country, zone, now, &self.config.calendar())
                    .await
            }
            None => {
                debug!("no school zone configured, skipping holidays");
                Vec::new()
            }
        }
    }

    /// Rebuild the timeline and derive presence at `now`.
    ///
    /// Never fails: provider errors degrade to cached or empty holidays, and
    /// invalid configuration entries fall back or are skipped. The only state
    /// change is the lazy removal of an expired override.
    pub async fn compute_state(&mut self, now: DateTime<Utc>) -> ScheduleComputation {
        let holidays = self.fetch_holidays(now).await;
        let config = &self.config;
        let calendar = config.calendar();

        let generator = PatternWindowGenerator::new(config);
        let pattern = generator.generate(now, generator.horizon(now));

        let builder = VacationWindowBuilder::new(config);
        let mut vacation_windows = builder.build(now, &holidays);
        vacation_windows.extend(builder.parental_day_windows(now));

        let mut extra = range_windows(&config.custom_rules, WindowSource::Custom, "Custom rule", &calendar);
        extra.extend(range_windows(
            &self.manual_ranges,
            WindowSource::Manual,
            "Manual custody",
            &calendar,
        ));
        extra.extend(recurring_windows(now, &config.exceptions_recurring, &calendar));

        let mut windows = merge(now, pattern, &vacation_windows, extra);
        let presence = evaluate(now, &windows, &mut self.presence_override, config.enable_custody);
        let outlook = builder.outlook(now, &holidays);

        if let Some(window) = self.override_window(now, &windows) {
            let at = windows.partition_point(|w| (w.start, w.end) <= (window.start, window.end));
            windows.insert(at, window);
        }

        debug!(
            windows = windows.len(),
            holidays = holidays.len(),
            is_present = presence.is_present,
            "schedule computed"
        );

        ScheduleComputation {
            computed_at: now,
            is_present: presence.is_present,
            next_arrival: presence.next_arrival,
            next_departure: presence.next_departure,
            days_remaining: presence.days_remaining,
            current_period: outlook.current_period,
            vacation_name: outlook.vacation_name,
            next_vacation: outlook.next_vacation,
            school_holidays: outlook.school_holidays,
            windows,
            attributes: Attributes {
                location: config.location.clone(),
                notes: config.notes.clone(),
                zone: config.zone.clone(),
            },
        }
    }

    /// A display window for a forced presence that no scheduled window covers.
    fn override_window(&self, now: DateTime<Utc>, windows: &[PresenceWindow]) -> Option<PresenceWindow> {
        let forced = self.presence_override.filter(|o| o.state == OverrideState::On)?;
        if windows.iter().any(|w| w.contains(now)) {
            return None;
        }
        let end = forced
            .until
            .unwrap_or(now + Duration::hours(OPEN_OVERRIDE_HOURS));
        PresenceWindow::new(now, end, "Override", WindowSource::Override)
    }
}
