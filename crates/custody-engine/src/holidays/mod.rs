//! School-holiday data access.
//!
//! [`HolidayClient`] dispatches to a per-country [`HolidayProvider`], keeps the
//! results in memory and in a [`CacheStore`], and degrades to the last known
//! result when a refetch fails. A slightly outdated holiday calendar is better
//! than none: a missing vacation would put the weekly pattern back in the
//! middle of a school break.

pub mod france;
pub mod openholidays;
pub mod provider;
pub mod quebec;
pub mod store;

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::Country;
use crate::dst::LocalCalendar;

pub use provider::{HolidayProvider, HolidayRequest, ProviderSet};
pub use store::{CacheEntry, CacheStore, JsonFileStore, MemoryStore};

/// Cached entries younger than this are served without refetching.
pub const CACHE_MAX_AGE_DAYS: i64 = 30;

/// A holiday record from an external source, not yet custody-adjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationPeriod {
    pub name: String,
    pub zone: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl VacationPeriod {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Persisted cache key, rendered as `country|zone|year`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub country: Country,
    pub zone: String,
    pub year: i32,
}

impl CacheKey {
    fn prefix(country: Country, zone: &str) -> String {
        format!("{}|{}|", country.code(), zone)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.country.code(), self.zone, self.year)
    }
}

/// Drop exact `(name, start, end)` duplicates, then keep only the longest
/// record among those starting on the same local day.
pub fn deduplicate(periods: Vec<VacationPeriod>, calendar: &LocalCalendar) -> Vec<VacationPeriod> {
    let mut seen = HashSet::new();
    let mut unique: Vec<VacationPeriod> = periods
        .into_iter()
        .filter(|p| seen.insert((p.name.clone(), p.start, p.end)))
        .collect();
    unique.sort_by(|a, b| {
        calendar
            .date_of(a.start)
            .cmp(&calendar.date_of(b.start))
            .then_with(|| b.duration().cmp(&a.duration()))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut collapsed: Vec<VacationPeriod> = Vec::with_capacity(unique.len());
    for period in unique {
        let same_day = collapsed
            .last()
            .is_some_and(|last| calendar.date_of(last.start) == calendar.date_of(period.start));
        if !same_day {
            collapsed.push(period);
        }
    }
    collapsed.sort_by_key(|p| (p.start, p.end));
    collapsed
}

/// Outcome of a direct provider check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub country: Country,
    pub zone: String,
    pub holidays_count: usize,
    pub sample: Vec<VacationPeriod>,
    pub error: Option<String>,
}

#[derive(Default)]
struct CacheState {
    loaded: bool,
    entries: HashMap<String, CacheEntry>,
}

/// Cached, fail-open access to school holidays.
pub struct HolidayClient {
    providers: ProviderSet,
    store: Box<dyn CacheStore>,
    state: Mutex<CacheState>,
    max_age: Duration,
}

impl HolidayClient {
    pub fn new(providers: ProviderSet, store: Box<dyn CacheStore>) -> Self {
        Self {
            providers,
            store,
            state: Mutex::new(CacheState::default()),
            max_age: Duration::days(CACHE_MAX_AGE_DAYS),
        }
    }

    /// Client backed by the real HTTP providers and an in-memory store.
    pub fn http() -> Self {
        Self::new(ProviderSet::http(), Box::new(MemoryStore::default()))
    }

    /// Holidays for `country`/`zone` around `now`.
    ///
    /// Never fails: fetch errors are logged and answered from the last cached
    /// result for the same country and zone (however old), else with an empty list.
    ///
    /// The cache lock is held for the whole lookup, so concurrent calls wait
    /// for an in-flight fetch and then read its cached result.
    pub async fn list(
        &self,
        country: Country,
        zone: &str,
        now: DateTime<Utc>,
        calendar: &LocalCalendar,
    ) -> Vec<VacationPeriod> {
        let today = calendar.date_of(now);
        let key = CacheKey {
            country,
            zone: zone.to_string(),
            year: today.year(),
        }
        .to_string();

        let mut state = self.state.lock().await;
        if !state.loaded {
            state.entries = self.store.load().unwrap_or_else(|err| {
                warn!(%err, "could not load holiday cache, starting empty");
                HashMap::new()
            });
            state.loaded = true;
        }

        if let Some(entry) = state.entries.get(&key) {
            if entry.is_fresh(now, self.max_age) {
                debug!(%key, "serving holidays from cache");
                return entry.holidays.clone();
            }
        }

        let request = HolidayRequest {
            country,
            zone: zone.to_string(),
            today,
            calendar: *calendar,
        };
        let provider = self.providers.for_country(country);
        let fetched = match provider.fetch(&request).await {
            Ok(list) if !list.is_empty() => Some(deduplicate(list, calendar)),
            Ok(_) => {
                warn!(%key, provider = provider.name(), "provider returned no holidays");
                None
            }
            Err(err) => {
                error!(%key, provider = provider.name(), %err, "holiday fetch failed");
                None
            }
        };

        match fetched {
            Some(holidays) => {
                state.entries.insert(
                    key.clone(),
                    CacheEntry {
                        timestamp: Some(now),
                        holidays: holidays.clone(),
                    },
                );
                if let Err(err) = self.store.save(&state.entries) {
                    warn!(%key, %err, "could not persist holiday cache");
                }
                holidays
            }
            None => match Self::last_known(&state.entries, &key, country, zone) {
                Some(entry) => {
                    warn!(%key, "serving stale holidays after failed refresh");
                    entry.holidays.clone()
                }
                None => Vec::new(),
            },
        }
    }

    /// The exact entry if present, else the newest entry for the same country and zone.
    fn last_known<'e>(
        entries: &'e HashMap<String, CacheEntry>,
        key: &str,
        country: Country,
        zone: &str,
    ) -> Option<&'e CacheEntry> {
        if let Some(entry) = entries.get(key) {
            return Some(entry);
        }
        let prefix = CacheKey::prefix(country, zone);
        entries
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .max_by(|(ka, a), (kb, b)| a.timestamp.cmp(&b.timestamp).then_with(|| ka.cmp(kb)))
            .map(|(_, entry)| entry)
    }

    /// Query the provider directly, bypassing the cache.
    pub async fn test_connection(
        &self,
        country: Country,
        zone: &str,
        now: DateTime<Utc>,
        calendar: &LocalCalendar,
    ) -> ConnectionReport {
        let request = HolidayRequest {
            country,
            zone: zone.to_string(),
            today: calendar.date_of(now),
            calendar: *calendar,
        };
        let (success, holidays, error) = match self.providers.for_country(country).fetch(&request).await {
            Ok(list) => (true, deduplicate(list, calendar), None),
            Err(err) => (false, Vec::new(), Some(err.to_string())),
        };
        ConnectionReport {
            success,
            country,
            zone: zone.to_string(),
            holidays_count: holidays.len(),
            sample: holidays.into_iter().take(5).collect(),
            error,
        }
    }

    /// Drop the in-memory cache; the next lookup reloads from the store.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.loaded = false;
    }
}
