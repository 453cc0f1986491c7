//! Quebec statutory holidays from `canada-holidays.ca`.
//!
//! Each holiday is a single full day.

use async_trait::async_trait;
use chrono::Datelike;
use serde_json::Value;
use tracing::error;

use super::provider::{day_span, finish, first_str, get_json, parse_date, HolidayProvider, HolidayRequest};
use super::VacationPeriod;
use crate::dst::LocalCalendar;
use crate::error::Result;

pub const QUEBEC_API_URL: &str = "https://canada-holidays.ca/api/v1/provinces/QC";

/// Parse a province payload, preferring French names and observed dates.
pub fn parse_province(payload: &Value, zone: &str, calendar: &LocalCalendar) -> Vec<VacationPeriod> {
    let Some(holidays) = payload
        .get("province")
        .and_then(|p| p.get("holidays"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    holidays
        .iter()
        .filter_map(|holiday| {
            let name = first_str(holiday, &["nameFr", "nameEn"])?;
            let date = first_str(holiday, &["observedDate", "date"]).and_then(parse_date)?;
            let (start, end) = day_span(date, date, calendar)?;
            Some(VacationPeriod {
                name: name.to_string(),
                zone: zone.to_string(),
                start,
                end,
            })
        })
        .collect()
}

pub struct QuebecProvider {
    http: reqwest::Client,
    base_url: String,
}

impl QuebecProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, QUEBEC_API_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl HolidayProvider for QuebecProvider {
    fn name(&self) -> &str {
        "canada-holidays.ca"
    }

    async fn fetch(&self, request: &HolidayRequest) -> Result<Vec<VacationPeriod>> {
        let mut periods = Vec::new();
        let mut last_error = None;
        let this_year = request.today.year();
        for year in this_year..this_year + 3 {
            match get_json(&self.http, &self.base_url, &[("year", year.to_string())]).await {
                Ok(payload) => periods.extend(parse_province(&payload, &request.zone, &request.calendar)),
                Err(err) => {
                    error!(provider = self.name(), year, %err, "holiday year fetch failed");
                    last_error = Some(err);
                }
            }
        }
        finish(periods, last_error)
    }
}
