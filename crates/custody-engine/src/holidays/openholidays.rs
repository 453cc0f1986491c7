//! OpenHolidays school holidays for Belgium, Switzerland and Luxembourg.

use async_trait::async_trait;
use chrono::Datelike;
use serde_json::Value;
use tracing::error;

use super::provider::{day_span, finish, get_json, parse_date, HolidayProvider, HolidayRequest};
use super::VacationPeriod;
use crate::config::Country;
use crate::dst::LocalCalendar;
use crate::error::Result;

pub const OPEN_HOLIDAYS_URL: &str = "https://openholidaysapi.org/SchoolHolidays";

/// Zone values that name a whole country or a French zone, never a subdivision.
const NON_SUBDIVISION_ZONES: [&str; 9] = ["FR", "BE", "CH", "LU", "A", "B", "C", "Corse", "DOM-TOM"];

const FALLBACK_NAME: &str = "Vacances";

fn language_for(country: Country) -> &'static str {
    match country {
        Country::Belgium | Country::Switzerland | Country::Luxembourg => "FR",
        _ => "EN",
    }
}

/// Query parameters for one calendar year.
///
/// A zone that is not a country or French zone code narrows the query: as a
/// community group in Belgium, as a subdivision (canton) elsewhere.
pub fn query_for(country: Country, zone: &str, year: i32) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("countryIsoCode", country.code().to_string()),
        ("languageIsoCode", language_for(country).to_string()),
        ("validFrom", format!("{year}-01-01")),
        ("validTo", format!("{}-01-01", year + 1)),
    ];
    let zone = zone.trim();
    if !zone.is_empty() && !NON_SUBDIVISION_ZONES.contains(&zone) {
        let key = if country == Country::Belgium {
            "groupCode"
        } else {
            "subdivisionCode"
        };
        query.push((key, zone.to_string()));
    }
    query
}

/// Parse a `SchoolHolidays` response; each record covers whole local days.
pub fn parse_school_holidays(
    payload: &Value,
    language: &str,
    zone: &str,
    calendar: &LocalCalendar,
) -> Vec<VacationPeriod> {
    let Some(items) = payload.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let first = item.get("startDate").and_then(Value::as_str).and_then(parse_date)?;
            let last = item.get("endDate").and_then(Value::as_str).and_then(parse_date)?;
            let (start, end) = day_span(first, last, calendar)?;
            let name = item
                .get("name")
                .and_then(Value::as_array)
                .and_then(|names| {
                    names.iter().find_map(|n| {
                        let lang = n.get("language").and_then(Value::as_str)?;
                        lang.eq_ignore_ascii_case(language)
                            .then(|| n.get("text").and_then(Value::as_str))
                            .flatten()
                    })
                })
                .unwrap_or(FALLBACK_NAME);
            Some(VacationPeriod {
                name: name.to_string(),
                zone: zone.to_string(),
                start,
                end,
            })
        })
        .collect()
}

pub struct OpenHolidaysProvider {
    http: reqwest::Client,
    base_url: String,
}

impl OpenHolidaysProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, OPEN_HOLIDAYS_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl HolidayProvider for OpenHolidaysProvider {
    fn name(&self) -> &str {
        "openholidaysapi.org"
    }

    async fn fetch(&self, request: &HolidayRequest) -> Result<Vec<VacationPeriod>> {
        let language = language_for(request.country);
        let mut periods = Vec::new();
        let mut last_error = None;
        let this_year = request.today.year();
        for year in this_year..this_year + 3 {
            let query = query_for(request.country, &request.zone, year);
            match get_json(&self.http, &self.base_url, &query).await {
                Ok(payload) => periods.extend(parse_school_holidays(
                    &payload,
                    language,
                    &request.zone,
                    &request.calendar,
                )),
                Err(err) => {
                    error!(provider = self.name(), year, %err, "holiday year fetch failed");
                    last_error = Some(err);
                }
            }
        }
        finish(periods, last_error)
    }
}
