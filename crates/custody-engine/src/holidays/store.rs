//! Persistent holiday cache.
//!
//! The on-disk document is `{"version": 1, "entries": {"FR|A|2026": {...}}}`.
//! Entries written before timestamps were recorded are bare holiday lists;
//! they load with no timestamp and are therefore always stale.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::VacationPeriod;
use crate::error::Result;

pub const STORE_VERSION: u32 = 1;

/// One cached provider result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub holidays: Vec<VacationPeriod>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.timestamp.is_some_and(|ts| now - ts < max_age)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Timestamped {
        timestamp: DateTime<Utc>,
        holidays: Vec<VacationPeriod>,
    },
    Legacy(Vec<VacationPeriod>),
}

impl From<StoredEntry> for CacheEntry {
    fn from(stored: StoredEntry) -> Self {
        match stored {
            StoredEntry::Timestamped {
                timestamp,
                holidays,
            } => CacheEntry {
                timestamp: Some(timestamp),
                holidays,
            },
            StoredEntry::Legacy(holidays) => CacheEntry {
                timestamp: None,
                holidays,
            },
        }
    }
}

impl From<&CacheEntry> for StoredEntry {
    fn from(entry: &CacheEntry) -> Self {
        match entry.timestamp {
            Some(timestamp) => StoredEntry::Timestamped {
                timestamp,
                holidays: entry.holidays.clone(),
            },
            None => StoredEntry::Legacy(entry.holidays.clone()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: HashMap<String, StoredEntry>,
}

/// Where cached holiday lists survive restarts.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, CacheEntry>>;

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()>;
}

/// A JSON file on disk. A missing file loads as an empty cache.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no holiday cache file yet");
            return Ok(HashMap::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let document: StoredDocument = serde_json::from_str(&text)?;
        Ok(document
            .entries
            .into_iter()
            .map(|(key, stored)| (key, CacheEntry::from(stored)))
            .collect())
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let document = StoredDocument {
            version: STORE_VERSION,
            entries: entries
                .iter()
                .map(|(key, entry)| (key.clone(), StoredEntry::from(entry)))
                .collect(),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn with_entries(entries: HashMap<String, CacheEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries.clone();
        Ok(())
    }
}
