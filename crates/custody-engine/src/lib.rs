//! # custody-engine
//!
//! Deterministic presence schedules for shared-custody arrangements.
//!
//! Given a custody pattern, school holidays, exceptions and overrides, the
//! engine builds one timeline of presence windows and answers "is the child
//! with this parent now, and when does that change?". Calendar arithmetic is
//! done in the arrangement's local timezone via `chrono-tz`; recurring
//! exceptions are expanded with the `rrule` crate.
//!
//! ## Modules
//!
//! - [`calendar`]: Easter, public holidays, parental days, ISO week parity, end-date resolution
//! - [`config`]: arrangement configuration with lenient loading
//! - [`dst`]: local-calendar conversion and DST gap policies
//! - [`pattern`]: recurring custody windows
//! - [`vacation`]: school-holiday windows, split rules, vacation outlook
//! - [`exceptions`]: custom, manual and recurring exception windows
//! - [`merger`]: priority merge into one timeline
//! - [`presence`]: presence state machine and overrides
//! - [`holidays`]: holiday providers, cache and client
//! - [`manager`]: per-arrangement orchestration
//! - [`projection`]: calendar events and the "who has the child" lookup
//! - [`error`]: error types

pub mod calendar;
pub mod config;
pub mod dst;
pub mod error;
pub mod exceptions;
pub mod holidays;
pub mod manager;
pub mod merger;
pub mod pattern;
pub mod presence;
pub mod projection;
pub mod vacation;
pub mod window;

pub use config::{Config, Country, CustodyType};
pub use dst::{DstPolicy, LocalCalendar};
pub use error::{CustodyError, Result};
pub use holidays::{HolidayClient, VacationPeriod};
pub use manager::{ScheduleComputation, ScheduleManager, REFRESH_INTERVAL};
pub use merger::merge;
pub use presence::{evaluate, OverrideState, PresenceOverride};
pub use projection::{calendar_events, who_has_child, WhoHasChild};
pub use window::{PresenceWindow, WindowSource};
