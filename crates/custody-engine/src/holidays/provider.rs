//! The provider seam and the shared pieces of payload parsing.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use super::france::FranceEducationProvider;
use super::openholidays::OpenHolidaysProvider;
use super::quebec::QuebecProvider;
use super::VacationPeriod;
use crate::config::Country;
use crate::dst::LocalCalendar;
use crate::error::{CustodyError, Result};

/// Per-request timeout for every provider.
pub const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(20);

/// Everything a provider needs to answer one lookup.
#[derive(Debug, Clone)]
pub struct HolidayRequest {
    pub country: Country,
    pub zone: String,
    pub today: NaiveDate,
    pub calendar: LocalCalendar,
}

/// A source of school-holiday periods.
///
/// Implementations fetch every year they cover, log and skip per-year
/// failures, and return an error only when no year could be fetched.
#[async_trait]
pub trait HolidayProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, request: &HolidayRequest) -> Result<Vec<VacationPeriod>>;
}

/// One provider per supported country.
#[derive(Clone)]
pub struct ProviderSet {
    france: Arc<dyn HolidayProvider>,
    open_holidays: Arc<dyn HolidayProvider>,
    quebec: Arc<dyn HolidayProvider>,
}

impl ProviderSet {
    pub fn new(
        france: Arc<dyn HolidayProvider>,
        open_holidays: Arc<dyn HolidayProvider>,
        quebec: Arc<dyn HolidayProvider>,
    ) -> Self {
        Self {
            france,
            open_holidays,
            quebec,
        }
    }

    /// The public HTTP providers sharing one connection pool.
    pub fn http() -> Self {
        let client = reqwest::Client::new();
        Self::new(
            Arc::new(FranceEducationProvider::new(client.clone())),
            Arc::new(OpenHolidaysProvider::new(client.clone())),
            Arc::new(QuebecProvider::new(client)),
        )
    }

    /// The same provider for every country.
    pub fn uniform(provider: Arc<dyn HolidayProvider>) -> Self {
        Self::new(provider.clone(), provider.clone(), provider)
    }

    pub fn for_country(&self, country: Country) -> &dyn HolidayProvider {
        match country {
            Country::France => self.france.as_ref(),
            Country::Belgium | Country::Switzerland | Country::Luxembourg => {
                self.open_holidays.as_ref()
            }
            Country::Quebec => self.quebec.as_ref(),
        }
    }
}

/// Combine per-year results: an error only when nothing was fetched and at
/// least one year failed.
pub(crate) fn finish(
    mut periods: Vec<VacationPeriod>,
    last_error: Option<CustodyError>,
) -> Result<Vec<VacationPeriod>> {
    match last_error {
        Some(err) if periods.is_empty() => Err(err),
        _ => {
            periods.sort_by_key(|p| (p.start, p.end));
            Ok(periods)
        }
    }
}

/// GET `url` with `query` and decode the JSON body.
pub(crate) async fn get_json(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value> {
    let value = http
        .get(url)
        .query(query)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json::<Value>()
        .await?;
    Ok(value)
}

/// Parse a provider timestamp: RFC 3339, or a naive date-time in local time.
pub(crate) fn parse_timestamp(raw: &str, calendar: &LocalCalendar) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .and_then(|naive| calendar.resolve(naive))
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Local `[first 00:00, last 23:59:59]` for a day-granular record.
pub(crate) fn day_span(
    first: NaiveDate,
    last: NaiveDate,
    calendar: &LocalCalendar,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;
    let start = calendar.start_of_day(first)?;
    let end = calendar.at(last, end_of_day)?;
    (end > start).then_some((start, end))
}

/// First string field present among `keys`.
pub(crate) fn first_str<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}
