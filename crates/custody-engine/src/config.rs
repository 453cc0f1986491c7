//! Arrangement configuration.
//!
//! A [`Config`] is loaded from JSON and is immutable for the duration of one
//! computation. Every field has a default, and enumerated fields deserialize
//! leniently: an unknown value is logged and replaced by the default instead
//! of rejecting the whole document.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::dst::{DstPolicy, LocalCalendar};
use crate::error::{CustodyError, Result};

// ── Enumerated settings ─────────────────────────────────────────────────────

/// Countries with a school-holiday provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Country {
    #[default]
    #[serde(rename = "FR")]
    France,
    #[serde(rename = "BE")]
    Belgium,
    #[serde(rename = "CH")]
    Switzerland,
    #[serde(rename = "LU")]
    Luxembourg,
    #[serde(rename = "CA_QC")]
    Quebec,
}

impl Country {
    pub fn code(&self) -> &'static str {
        match self {
            Country::France => "FR",
            Country::Belgium => "BE",
            Country::Switzerland => "CH",
            Country::Luxembourg => "LU",
            Country::Quebec => "CA_QC",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FR" => Ok(Country::France),
            "BE" => Ok(Country::Belgium),
            "CH" => Ok(Country::Switzerland),
            "LU" => Ok(Country::Luxembourg),
            "CA_QC" | "QC" => Ok(Country::Quebec),
            other => Err(CustodyError::InvalidConfig(format!("unknown country '{other}'"))),
        }
    }
}

/// The closed set of custody patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyType {
    #[default]
    AlternateWeek,
    AlternateWeekend,
    AlternateWeekParity,
    TwoTwoThree,
    TwoTwoFiveFive,
    Custom,
}

impl CustodyType {
    pub fn label(&self) -> &'static str {
        match self {
            CustodyType::AlternateWeek => "Alternating Weeks",
            CustodyType::AlternateWeekend => "Alternating Weekends",
            CustodyType::AlternateWeekParity => "Alternating Weeks (ISO parity)",
            CustodyType::TwoTwoThree => "2-2-3",
            CustodyType::TwoTwoFiveFive => "2-2-5-5",
            CustodyType::Custom => "Custom",
        }
    }

    /// Built-in cycle for fixed-cycle types. Parity types carry their nominal
    /// cycle for reference only; the generator anchors them on ISO weeks.
    pub fn definition(&self) -> CustodyTypeDefinition {
        use Segment as S;
        let (cycle_length_days, segments) = match self {
            CustodyType::AlternateWeek | CustodyType::AlternateWeekParity => {
                (14, vec![S::on(7), S::off(7)])
            }
            CustodyType::AlternateWeekend => (14, vec![S::off(12), S::on(2)]),
            CustodyType::TwoTwoThree => (7, vec![S::on(2), S::off(2), S::on(3)]),
            CustodyType::TwoTwoFiveFive => (14, vec![S::on(2), S::off(2), S::on(5), S::off(5)]),
            CustodyType::Custom => (14, Vec::new()),
        };
        CustodyTypeDefinition {
            cycle_length_days,
            segments,
        }
    }
}

impl FromStr for CustodyType {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alternate_week" => Ok(CustodyType::AlternateWeek),
            "alternate_weekend" => Ok(CustodyType::AlternateWeekend),
            "alternate_week_parity" => Ok(CustodyType::AlternateWeekParity),
            "two_two_three" => Ok(CustodyType::TwoTwoThree),
            "two_two_five_five" => Ok(CustodyType::TwoTwoFiveFive),
            "custom" => Ok(CustodyType::Custom),
            other => Err(CustodyError::InvalidConfig(format!(
                "unknown custody type '{other}'"
            ))),
        }
    }
}

/// One run of identical days inside a custody cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub days: u32,
    pub on: bool,
}

impl Segment {
    pub fn on(days: u32) -> Self {
        Self { days, on: true }
    }

    pub fn off(days: u32) -> Self {
        Self { days, on: false }
    }
}

/// A repeating cycle of on/off segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyTypeDefinition {
    pub cycle_length_days: u32,
    pub segments: Vec<Segment>,
}

impl CustodyTypeDefinition {
    /// Run-length encode a comma-separated day list such as `on,on,off,off,on`.
    ///
    /// Returns `None` for an empty pattern.
    pub fn from_pattern(pattern: &str) -> Option<Self> {
        let days: Vec<bool> = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "on" | "1" | "true"))
            .collect();
        if days.is_empty() {
            return None;
        }

        let mut segments: Vec<Segment> = Vec::new();
        for on in &days {
            match segments.last_mut() {
                Some(last) if last.on == *on => last.days += 1,
                _ => segments.push(Segment { days: 1, on: *on }),
            }
        }
        Some(Self {
            cycle_length_days: days.len() as u32,
            segments,
        })
    }
}

/// Which ISO-week / calendar-year parity the arrangement is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceParity {
    #[default]
    Even,
    Odd,
}

impl ReferenceParity {
    pub fn is_even(&self) -> bool {
        matches!(self, ReferenceParity::Even)
    }

    pub fn matches_year(&self, year: i32) -> bool {
        (year.rem_euclid(2) == 0) == self.is_even()
    }
}

impl FromStr for ReferenceParity {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "even" => Ok(ReferenceParity::Even),
            "odd" => Ok(ReferenceParity::Odd),
            other => Err(CustodyError::InvalidConfig(format!("unknown parity '{other}'"))),
        }
    }
}

/// Which half of each school holiday goes to this parent, keyed on year parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Odd years: first half. Even years: second half.
    #[default]
    OddFirst,
    /// Odd years: second half. Even years: first half.
    OddSecond,
}

impl FromStr for SplitMode {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "odd_first" => Ok(SplitMode::OddFirst),
            "odd_second" => Ok(SplitMode::OddSecond),
            other => Err(CustodyError::InvalidConfig(format!(
                "unknown vacation split mode '{other}'"
            ))),
        }
    }
}

/// How the summer break is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummerMode {
    #[default]
    Half,
    Quarter,
}

impl FromStr for SummerMode {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "half" => Ok(SummerMode::Half),
            "quarter" => Ok(SummerMode::Quarter),
            other => Err(CustodyError::InvalidConfig(format!(
                "unknown summer split mode '{other}'"
            ))),
        }
    }
}

/// Explicit vacation rule overriding the automatic half split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacationRule {
    FirstHalf,
    SecondHalf,
    FirstWeek,
    SecondWeek,
    EvenWeeks,
    OddWeeks,
    EvenWeekends,
    OddWeekends,
}

impl VacationRule {
    pub fn label(&self) -> &'static str {
        match self {
            VacationRule::FirstHalf => "first half",
            VacationRule::SecondHalf => "second half",
            VacationRule::FirstWeek => "first week",
            VacationRule::SecondWeek => "second week",
            VacationRule::EvenWeeks => "even weeks",
            VacationRule::OddWeeks => "odd weeks",
            VacationRule::EvenWeekends => "even weekends",
            VacationRule::OddWeekends => "odd weekends",
        }
    }
}

impl FromStr for VacationRule {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_half" => Ok(VacationRule::FirstHalf),
            "second_half" => Ok(VacationRule::SecondHalf),
            "first_week" => Ok(VacationRule::FirstWeek),
            "second_week" => Ok(VacationRule::SecondWeek),
            "even_weeks" => Ok(VacationRule::EvenWeeks),
            "odd_weeks" => Ok(VacationRule::OddWeeks),
            "even_weekends" => Ok(VacationRule::EvenWeekends),
            "odd_weekends" => Ok(VacationRule::OddWeekends),
            other => Err(CustodyError::InvalidConfig(format!(
                "unknown vacation rule '{other}'"
            ))),
        }
    }
}

/// Which parent this arrangement represents, for parental days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentalRole {
    #[default]
    None,
    Mother,
    Father,
}

impl FromStr for ParentalRole {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(ParentalRole::None),
            "mother" => Ok(ParentalRole::Mother),
            "father" => Ok(ParentalRole::Father),
            other => Err(CustodyError::InvalidConfig(format!(
                "unknown parental role '{other}'"
            ))),
        }
    }
}

// ── Free-form entries ───────────────────────────────────────────────────────

/// A one-off custody window from the configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// A weekly exception such as "every Wednesday 12:00-18:00".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurringException {
    /// 0 = Monday .. 6 = Sunday.
    #[serde(default)]
    pub weekday: Option<i64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

// ── Config ──────────────────────────────────────────────────────────────────

pub const DEFAULT_ARRIVAL: &str = "08:00";
pub const DEFAULT_DEPARTURE: &str = "19:00";
/// Upper bound on `calendar_sync_days`, about ten years.
pub const MAX_SYNC_DAYS: u32 = 3650;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub child_name: String,
    pub child_name_display: Option<String>,
    pub time_zone: String,

    #[serde(deserialize_with = "lenient")]
    pub custody_type: CustodyType,
    pub custom_pattern: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub reference_year: ReferenceParity,
    #[serde(deserialize_with = "lenient_start_day", serialize_with = "weekday_name")]
    pub start_day: Weekday,
    #[serde(deserialize_with = "lenient_end_day", serialize_with = "weekday_name")]
    pub end_day: Weekday,
    #[serde(deserialize_with = "lenient_weekend_start", serialize_with = "weekday_name")]
    pub weekend_start_day: Weekday,
    pub arrival_time: String,
    pub departure_time: String,

    #[serde(deserialize_with = "lenient")]
    pub country: Country,
    pub zone: Option<String>,
    pub alsace_moselle: bool,
    #[serde(deserialize_with = "lenient")]
    pub vacation_split_mode: SplitMode,
    #[serde(deserialize_with = "lenient")]
    pub summer_split_mode: SummerMode,
    #[serde(deserialize_with = "lenient_optional")]
    pub vacation_rule: Option<VacationRule>,

    pub enable_custody: bool,
    pub auto_parent_days: bool,
    #[serde(deserialize_with = "lenient")]
    pub parental_role: ParentalRole,
    #[serde(deserialize_with = "bounded_sync_days")]
    pub calendar_sync_days: u32,

    pub custom_rules: Vec<CustomRule>,
    pub exceptions_recurring: Vec<RecurringException>,

    pub location: Option<String>,
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub dst_policy: DstPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            child_name: String::new(),
            child_name_display: None,
            time_zone: "UTC".to_string(),
            custody_type: CustodyType::default(),
            custom_pattern: None,
            reference_year: ReferenceParity::default(),
            start_day: Weekday::Mon,
            end_day: Weekday::Sun,
            weekend_start_day: Weekday::Fri,
            arrival_time: DEFAULT_ARRIVAL.to_string(),
            departure_time: DEFAULT_DEPARTURE.to_string(),
            country: Country::default(),
            zone: None,
            alsace_moselle: false,
            vacation_split_mode: SplitMode::default(),
            summer_split_mode: SummerMode::default(),
            vacation_rule: None,
            enable_custody: true,
            auto_parent_days: false,
            parental_role: ParentalRole::default(),
            calendar_sync_days: 120,
            custom_rules: Vec::new(),
            exceptions_recurring: Vec::new(),
            location: None,
            notes: None,
            dst_policy: DstPolicy::default(),
        }
    }
}

impl Config {
    /// Parse a JSON document.
    ///
    /// # Errors
    /// Returns `CustodyError::Json` when the document is not a JSON object of
    /// the expected shape. Unknown enumerated values are not errors.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Apply a partial update: top-level keys of `patch` replace the current values.
    ///
    /// # Errors
    /// Returns `CustodyError::InvalidConfig` if `patch` is not a JSON object.
    pub fn patched(&self, patch: &serde_json::Value) -> Result<Self> {
        let patch = patch.as_object().ok_or_else(|| {
            CustodyError::InvalidConfig("configuration update must be a JSON object".into())
        })?;
        let mut current = serde_json::to_value(self)?;
        if let Some(map) = current.as_object_mut() {
            for (key, value) in patch {
                map.insert(key.clone(), value.clone());
            }
        }
        Ok(serde_json::from_value(current)?)
    }

    /// Display name, falling back to the normalized name.
    pub fn display_name(&self) -> &str {
        self.child_name_display
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.child_name)
    }

    pub fn arrival(&self) -> NaiveTime {
        parse_time_or(&self.arrival_time, DEFAULT_ARRIVAL, "arrival_time")
    }

    pub fn departure(&self) -> NaiveTime {
        parse_time_or(&self.departure_time, DEFAULT_DEPARTURE, "departure_time")
    }

    /// The local calendar; an unknown timezone falls back to UTC.
    pub fn calendar(&self) -> LocalCalendar {
        LocalCalendar::from_name(&self.time_zone, self.dst_policy).unwrap_or_else(|err| {
            warn!(time_zone = %self.time_zone, %err, "falling back to UTC");
            LocalCalendar::new(chrono_tz::Tz::UTC, self.dst_policy)
        })
    }

    /// The cycle used by fixed-cycle generation, honoring the custom pattern.
    pub fn cycle(&self) -> CustodyTypeDefinition {
        if self.custody_type == CustodyType::Custom {
            if let Some(def) = self
                .custom_pattern
                .as_deref()
                .and_then(CustodyTypeDefinition::from_pattern)
            {
                return def;
            }
        }
        self.custody_type.definition()
    }

    /// Days of pattern generated ahead of now.
    pub fn horizon_days(&self) -> i64 {
        (i64::from(self.calendar_sync_days.min(MAX_SYNC_DAYS)) + 30).max(400)
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn parse_time_or(value: &str, fallback: &str, field: &str) -> NaiveTime {
    parse_time(value).unwrap_or_else(|| {
        warn!(field, value, fallback, "malformed time, using default");
        parse_time(fallback).unwrap_or(NaiveTime::MIN)
    })
}

// ── Lenient serde helpers ───────────────────────────────────────────────────

fn parse_or<T>(raw: Option<String>, fallback: T) -> T
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => fallback,
        Some(value) => value.parse().unwrap_or_else(|err: T::Err| {
            warn!(%value, %err, "unrecognized configuration value, using default");
            fallback
        }),
    }
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(parse_or(raw, T::default()))
}

fn lenient_optional<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()).and_then(|value| {
        value
            .parse()
            .map_err(|err: T::Err| warn!(%value, %err, "ignoring unrecognized value"))
            .ok()
    }))
}

fn lenient_weekday<'de, D>(deserializer: D, fallback: Weekday) -> std::result::Result<Weekday, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw {
        None => fallback,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(%value, %fallback, "invalid weekday name, using default");
            fallback
        }),
    })
}

fn lenient_start_day<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Weekday, D::Error> {
    lenient_weekday(d, Weekday::Mon)
}

fn lenient_end_day<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Weekday, D::Error> {
    lenient_weekday(d, Weekday::Sun)
}

fn lenient_weekend_start<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Weekday, D::Error> {
    let day = lenient_weekday(d, Weekday::Fri)?;
    Ok(match day {
        Weekday::Fri | Weekday::Sat => day,
        other => {
            warn!(weekend_start_day = %other, "weekends start on Friday or Saturday, using Friday");
            Weekday::Fri
        }
    })
}

fn bounded_sync_days<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
    let days = u64::deserialize(d)?;
    if days > u64::from(MAX_SYNC_DAYS) {
        warn!(days, max = MAX_SYNC_DAYS, "calendar_sync_days too large, clamping");
        return Ok(MAX_SYNC_DAYS);
    }
    Ok(days as u32)
}

fn weekday_name<S: Serializer>(day: &Weekday, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let name = match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    };
    serializer.serialize_str(name)
}
