//! French national education calendar (`data.education.gouv.fr`).

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use tracing::{debug, error};

use super::provider::{finish, first_str, get_json, parse_timestamp, HolidayProvider, HolidayRequest};
use super::VacationPeriod;
use crate::dst::LocalCalendar;
use crate::error::{CustodyError, Result};

pub const FRANCE_API_URL: &str = "https://data.education.gouv.fr/api/records/1.0/search/";
const DATASET: &str = "fr-en-calendrier-scolaire";

/// Map configured zone codes to the dataset's zone labels.
pub fn normalize_zone(zone: &str) -> String {
    match zone.trim() {
        "A" => "Zone A".to_string(),
        "B" => "Zone B".to_string(),
        "C" => "Zone C".to_string(),
        "DOM-TOM" => "Guadeloupe".to_string(),
        "Corse" => "Corse".to_string(),
        other => other.to_string(),
    }
}

/// The current school year and the two following ones, as `"2025-2026"`
/// labels; a school year starts in September.
pub fn school_years_around(today: NaiveDate) -> Vec<String> {
    let first = if today.month() < 9 {
        today.year() - 1
    } else {
        today.year()
    };
    (first..first + 3).map(|y| format!("{}-{}", y, y + 1)).collect()
}

/// Parse a records payload.
///
/// With `zone_filter`, only records whose `zones` field equals the zone or
/// lists it among comma-separated values are kept.
pub fn parse_records(
    payload: &Value,
    zone_label: &str,
    zone_filter: Option<&str>,
    calendar: &LocalCalendar,
) -> Vec<VacationPeriod> {
    let Some(records) = payload.get("records").and_then(Value::as_array) else {
        return Vec::new();
    };
    records
        .iter()
        .filter_map(|record| record.get("fields"))
        .filter(|fields| match zone_filter {
            None => true,
            Some(zone) => first_str(fields, &["zones", "zone"])
                .is_some_and(|z| z == zone || z.split(',').any(|part| part.trim() == zone)),
        })
        .filter_map(|fields| {
            let start = first_str(fields, &["start_date", "date_debut"])
                .and_then(|s| parse_timestamp(s, calendar))?;
            let end = first_str(fields, &["end_date", "date_fin"])
                .and_then(|s| parse_timestamp(s, calendar))?;
            let name = first_str(fields, &["description", "libelle"]).unwrap_or("Vacances scolaires");
            (end > start).then(|| VacationPeriod {
                name: name.to_string(),
                zone: zone_label.to_string(),
                start,
                end,
            })
        })
        .collect()
}

pub struct FranceEducationProvider {
    http: reqwest::Client,
    base_url: String,
}

impl FranceEducationProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, FRANCE_API_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn fetch_school_year(
        &self,
        school_year: &str,
        zone: &str,
        calendar: &LocalCalendar,
    ) -> Result<Vec<VacationPeriod>> {
        let refined = get_json(
            &self.http,
            &self.base_url,
            &[
                ("dataset", DATASET.to_string()),
                ("refine.annee_scolaire", school_year.to_string()),
                ("refine.zones", zone.to_string()),
            ],
        )
        .await?;
        let periods = parse_records(&refined, zone, None, calendar);
        if !periods.is_empty() {
            return Ok(periods);
        }

        // Some zones are not indexed for refinement; filter the full year instead.
        debug!(school_year, zone, "no refined records, retrying without zone filter");
        let all = get_json(
            &self.http,
            &self.base_url,
            &[
                ("dataset", DATASET.to_string()),
                ("refine.annee_scolaire", school_year.to_string()),
                ("rows", "100".to_string()),
            ],
        )
        .await?;
        Ok(parse_records(&all, zone, Some(zone), calendar))
    }
}

#[async_trait]
impl HolidayProvider for FranceEducationProvider {
    fn name(&self) -> &str {
        "education.gouv.fr"
    }

    async fn fetch(&self, request: &HolidayRequest) -> Result<Vec<VacationPeriod>> {
        let zone = normalize_zone(&request.zone);
        if zone.is_empty() {
            return Err(CustodyError::Provider("no school zone configured".into()));
        }
        let mut periods = Vec::new();
        let mut last_error = None;
        for school_year in school_years_around(request.today) {
            match self
                .fetch_school_year(&school_year, &zone, &request.calendar)
                .await
            {
                Ok(mut found) => periods.append(&mut found),
                Err(err) => {
                    error!(provider = self.name(), %school_year, %err, "school year fetch failed");
                    last_error = Some(err);
                }
            }
        }
        finish(periods, last_error)
    }
}
