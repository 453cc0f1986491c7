//! Presence state machine: "is the child here now, and when does that change?"
//!
//! Works on the merged, start-sorted timeline. A one-minute lookahead margin
//! treats windows that end within the next minute as already over, so the
//! state does not flap just before a real transition when the computation and
//! the display clock disagree by a few seconds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::window::PresenceWindow;

/// Windows ending within this many seconds of now count as ended.
pub const LOOKAHEAD_SECONDS: i64 = 60;

/// Forced presence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideState {
    On,
    Off,
}

/// A manual presence override, optionally bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceOverride {
    pub state: OverrideState,
    pub until: Option<DateTime<Utc>>,
}

impl PresenceOverride {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| now > until)
    }
}

/// A future state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub at: DateTime<Utc>,
    pub label: String,
}

impl Transition {
    fn start_of(window: &PresenceWindow) -> Self {
        Self {
            at: window.start,
            label: window.label.clone(),
        }
    }

    fn end_of(window: &PresenceWindow) -> Self {
        Self {
            at: window.end,
            label: window.label.clone(),
        }
    }
}

/// Presence fields of a computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceState {
    pub is_present: bool,
    pub next_arrival: Option<Transition>,
    pub next_departure: Option<Transition>,
    pub days_remaining: Option<f64>,
}

/// `max(0, (to - from) in days)`, rounded to two decimals.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let days = (to - from).num_seconds() as f64 / 86_400.0;
    ((days * 100.0).round() / 100.0).max(0.0)
}

/// The active override state, clearing an expired override in place.
pub fn active_override(slot: &mut Option<PresenceOverride>, now: DateTime<Utc>) -> Option<bool> {
    match slot {
        Some(o) if o.is_expired(now) => {
            *slot = None;
            None
        }
        Some(o) => Some(o.state == OverrideState::On),
        None => None,
    }
}

/// Derive presence and the next transitions at `now`.
///
/// `windows` must be sorted by start. With custody management disabled the
/// child is present unless forced off, and no transitions are computed.
pub fn evaluate(
    now: DateTime<Utc>,
    windows: &[PresenceWindow],
    presence_override: &mut Option<PresenceOverride>,
    enable_custody: bool,
) -> PresenceState {
    let override_state = active_override(presence_override, now);

    if !enable_custody {
        return PresenceState {
            is_present: override_state != Some(false),
            next_arrival: None,
            next_departure: None,
            days_remaining: None,
        };
    }

    let horizon = now + Duration::seconds(LOOKAHEAD_SECONDS);
    let live: Vec<&PresenceWindow> = windows
        .iter()
        .filter(|w| w.source.is_displayed() && w.end > horizon)
        .collect();
    let current = live.iter().copied().find(|w| w.contains(now));
    let next = live.iter().copied().find(|w| w.start > now);
    let first_starting_after =
        |instant: DateTime<Utc>| live.iter().copied().find(|w| w.start > instant);

    let is_present = override_state.unwrap_or(current.is_some());

    let (next_arrival, next_departure) = if is_present {
        match (current, *presence_override) {
            (Some(window), _) => (
                first_starting_after(window.end).map(Transition::start_of),
                Some(Transition::end_of(window)),
            ),
            (
                None,
                Some(PresenceOverride {
                    state: OverrideState::On,
                    until: Some(until),
                }),
            ) if until > horizon => (
                first_starting_after(until).map(Transition::start_of),
                Some(Transition {
                    at: until,
                    label: "Override".to_string(),
                }),
            ),
            _ => (
                next.map(Transition::start_of),
                next.map(Transition::end_of),
            ),
        }
    } else {
        let upcoming = next.or_else(|| live.iter().copied().find(|w| w.start >= now));
        (
            upcoming.map(Transition::start_of),
            upcoming.map(Transition::end_of),
        )
    };

    let target = if is_present {
        next_departure.as_ref()
    } else {
        next_arrival.as_ref()
    };
    let days_remaining = target.map(|t| days_between(now, t.at));

    PresenceState {
        is_present,
        next_arrival,
        next_departure,
        days_remaining,
    }
}
