//! Consumer-facing views of a computation: calendar events and the
//! "who has the child" lookup.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::manager::ScheduleComputation;
use crate::presence::Transition;
use crate::window::{PresenceWindow, WindowSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: String,
    pub description: String,
    pub location: Option<String>,
}

impl CalendarEvent {
    pub fn from_window(child_name: &str, window: &PresenceWindow, location: Option<&str>) -> Self {
        let description = match window.source {
            WindowSource::Vacation => format!("School vacation • {}", window.label),
            WindowSource::Pattern => format!("Regular custody • {}", window.label),
            source => format!("{} • Source: {}", window.label, source),
        };
        Self {
            start: window.start,
            end: window.end,
            summary: format!("{} • {}", child_name, window.label).trim().to_string(),
            description,
            location: location.map(str::to_string),
        }
    }
}

/// Events for displayed windows touching `[from, to]`, sorted by start.
pub fn calendar_events(
    child_name: &str,
    windows: &[PresenceWindow],
    location: Option<&str>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<CalendarEvent> {
    let mut events: Vec<CalendarEvent> = windows
        .iter()
        .filter(|w| w.source.is_displayed() && w.end >= from && w.start <= to)
        .map(|w| CalendarEvent::from_window(child_name, w, location))
        .collect();
    events.sort_by_key(|e| (e.start, e.end));
    events
}

/// The first displayed window not yet over.
pub fn next_event(
    child_name: &str,
    windows: &[PresenceWindow],
    location: Option<&str>,
    now: DateTime<Utc>,
) -> Option<CalendarEvent> {
    windows
        .iter()
        .filter(|w| w.source.is_displayed() && w.end > now)
        .min_by_key(|w| (w.start, w.end))
        .map(|w| CalendarEvent::from_window(child_name, w, location))
}

/// A configured arrangement and its latest computation, if any.
#[derive(Debug, Clone, Copy)]
pub struct Arrangement<'a> {
    pub config: &'a Config,
    pub computation: Option<&'a ScheduleComputation>,
}

/// Answer to "who has the child right now?".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WhoHasChild {
    NotFound {
        query: String,
    },
    NotComputed {
        name: String,
    },
    WithYou {
        name: String,
        next_change: Option<Transition>,
    },
    WithOtherParent {
        name: String,
        next_change: Option<Transition>,
    },
}

fn matches_query(config: &Config, query: &str) -> bool {
    let display = config
        .child_name_display
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    let name = config.child_name.trim().to_lowercase();
    display.contains(query)
        || name.contains(query)
        || (!display.is_empty() && query.contains(display.as_str()))
}

/// Resolve `query` to the first arrangement whose display or normalized name
/// matches case-insensitively, and report its presence.
pub fn who_has_child(query: &str, arrangements: &[Arrangement<'_>]) -> WhoHasChild {
    let needle = query.trim().to_lowercase();
    let found = (!needle.is_empty())
        .then(|| arrangements.iter().find(|a| matches_query(a.config, &needle)))
        .flatten();
    let Some(arrangement) = found else {
        return WhoHasChild::NotFound {
            query: query.trim().to_string(),
        };
    };

    let name = arrangement.config.display_name().to_string();
    match arrangement.computation {
        None => WhoHasChild::NotComputed { name },
        Some(c) if c.is_present => WhoHasChild::WithYou {
            name,
            next_change: c.next_departure.clone(),
        },
        Some(c) => WhoHasChild::WithOtherParent {
            name,
            next_change: c.next_arrival.clone(),
        },
    }
}
