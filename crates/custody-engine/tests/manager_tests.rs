//! End-to-end computations through `ScheduleManager`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use custody_engine::config::{Config, CustodyType, ReferenceParity};
use custody_engine::exceptions::ManualRange;
use custody_engine::holidays::{HolidayProvider, HolidayRequest, MemoryStore, ProviderSet};
use custody_engine::presence::OverrideState;
use custody_engine::vacation::Period;
use custody_engine::{
    HolidayClient, Result, ScheduleManager, VacationPeriod, WindowSource,
};
use serde_json::json;

fn utc(m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, m, d, h, 0, 0).unwrap()
}

/// Always answers with the same list.
struct FixedProvider {
    periods: Vec<VacationPeriod>,
    calls: AtomicUsize,
}

#[async_trait]
impl HolidayProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(&self, _request: &HolidayRequest) -> Result<Vec<VacationPeriod>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.periods.clone())
    }
}

fn provider(periods: Vec<VacationPeriod>) -> Arc<FixedProvider> {
    Arc::new(FixedProvider {
        periods,
        calls: AtomicUsize::new(0),
    })
}

fn paris_holidays() -> Vec<VacationPeriod> {
    vec![
        VacationPeriod {
            name: "Vacances d'Hiver".into(),
            zone: "Zone A".into(),
            start: utc(2, 6, 23),
            end: utc(2, 22, 23),
        },
        VacationPeriod {
            name: "Vacances de Printemps".into(),
            zone: "Zone A".into(),
            start: utc(4, 3, 22),
            end: utc(4, 19, 22),
        },
    ]
}

fn config(zone: Option<&str>) -> Config {
    Config {
        child_name: "lea".into(),
        child_name_display: Some("Léa".into()),
        time_zone: "Europe/Paris".into(),
        custody_type: CustodyType::AlternateWeek,
        reference_year: ReferenceParity::Even,
        zone: zone.map(String::from),
        location: Some("Lyon".into()),
        ..Config::default()
    }
}

fn manager(config: Config, provider: Arc<FixedProvider>) -> ScheduleManager {
    let client = HolidayClient::new(ProviderSet::uniform(provider), Box::new(MemoryStore::default()));
    ScheduleManager::new(config, client)
}

#[tokio::test]
async fn computation_is_deterministic() {
    let mut manager = manager(config(None), provider(Vec::new()));

    let first = manager.compute_state(utc(3, 4, 12)).await;
    let second = manager.compute_state(utc(3, 4, 12)).await;

    assert_eq!(first, second);
    assert!(first.is_present);
    assert_eq!(first.next_departure.as_ref().unwrap().at, utc(3, 8, 18));
    assert_eq!(first.next_arrival.as_ref().unwrap().at, utc(3, 16, 7));
    assert_eq!(first.attributes.location.as_deref(), Some("Lyon"));
}

#[tokio::test]
async fn no_zone_skips_holiday_lookup() {
    let fixed = provider(paris_holidays());
    let mut manager = manager(config(Some("  ")), fixed.clone());

    let state = manager.compute_state(utc(3, 4, 12)).await;

    assert_eq!(fixed.calls.load(Ordering::SeqCst), 0);
    assert!(state.school_holidays.is_empty());
    assert_eq!(state.current_period, Period::School);
}

#[tokio::test]
async fn holidays_drive_period_and_next_vacation() {
    let fixed = provider(paris_holidays());
    let mut manager = manager(config(Some("A")), fixed.clone());

    let during = manager.compute_state(utc(2, 12, 12)).await;
    assert_eq!(during.current_period, Period::Vacation);
    assert_eq!(during.vacation_name.as_deref(), Some("Vacances d'Hiver"));
    assert_eq!(during.next_vacation.as_ref().unwrap().days_until, 0.0);

    let after = manager.compute_state(utc(3, 4, 12)).await;
    assert_eq!(after.current_period, Period::School);
    assert_eq!(after.vacation_name, None);
    let next = after.next_vacation.unwrap();
    assert_eq!(next.name, "Vacances de Printemps");
    assert!(next.start > utc(3, 4, 12));
    assert!(after
        .school_holidays
        .iter()
        .all(|h| h.name == "Vacances de Printemps"));
    assert!(after
        .windows
        .iter()
        .any(|w| w.source == WindowSource::Vacation));

    assert_eq!(fixed.calls.load(Ordering::SeqCst), 1, "cached between computations");
}

#[tokio::test]
async fn bounded_override_expires_lazily() {
    let mut manager = manager(config(None), provider(Vec::new()));
    let now = utc(3, 4, 12);
    manager.override_presence(OverrideState::Off, Some(Duration::hours(2)), now);

    assert!(!manager.compute_state(now).await.is_present);
    assert!(manager.presence_override().is_some());

    assert!(manager.compute_state(now + Duration::hours(3)).await.is_present);
    assert!(manager.presence_override().is_none());
}

#[tokio::test]
async fn forced_presence_gets_a_display_window() {
    let mut manager = manager(config(None), provider(Vec::new()));
    let now = utc(3, 11, 12);
    manager.override_presence(OverrideState::On, None, now);

    let state = manager.compute_state(now).await;
    assert!(state.is_present);
    let window = state
        .windows
        .iter()
        .find(|w| w.source == WindowSource::Override)
        .expect("override window");
    assert_eq!((window.start, window.end), (now, now + Duration::hours(1)));
    assert!(state.windows.windows(2).all(|w| w[0].start <= w[1].start));

    manager.clear_override();
    let state = manager.compute_state(now).await;
    assert!(!state.is_present);
    assert!(!state.windows.iter().any(|w| w.source == WindowSource::Override));
}

#[tokio::test]
async fn forced_presence_inside_a_window_adds_nothing() {
    let mut manager = manager(config(None), provider(Vec::new()));
    let now = utc(3, 4, 12);
    manager.override_presence(OverrideState::On, Some(Duration::hours(5)), now);

    let state = manager.compute_state(now).await;
    assert!(!state.windows.iter().any(|w| w.source == WindowSource::Override));
}

#[tokio::test]
async fn manual_windows_replace_previous_set() {
    let mut manager = manager(config(None), provider(Vec::new()));
    let doctor = ManualRange {
        start: Some("2026-03-11T10:00:00Z".into()),
        end: Some("2026-03-11T16:00:00Z".into()),
        label: Some("Doctor".into()),
    };
    let inverted = ManualRange {
        start: Some("2026-03-12T16:00:00Z".into()),
        end: Some("2026-03-12T10:00:00Z".into()),
        label: None,
    };
    let unlabeled = ManualRange {
        start: Some("2026-03-13T14:00".into()),
        end: Some("2026-03-13T18:00".into()),
        label: None,
    };

    assert_eq!(manager.set_manual_windows(&[doctor, inverted, unlabeled]), 2);
    let state = manager.compute_state(utc(3, 11, 12)).await;
    assert!(state.is_present);
    let manual: Vec<_> = state
        .windows
        .iter()
        .filter(|w| w.source == WindowSource::Manual)
        .map(|w| (w.label.as_str(), w.start))
        .collect();
    assert_eq!(
        manual,
        vec![("Doctor", utc(3, 11, 10)), ("Manual custody", utc(3, 13, 13))]
    );

    assert_eq!(manager.set_manual_windows(&[]), 0);
    let state = manager.compute_state(utc(3, 11, 12)).await;
    assert!(!state.is_present);
}

#[tokio::test]
async fn config_update_applies_or_keeps_previous() {
    let mut manager = manager(config(None), provider(Vec::new()));

    assert!(manager.update_config(&json!(["not", "an", "object"])).is_err());
    assert_eq!(manager.config().location.as_deref(), Some("Lyon"));

    manager
        .update_config(&json!({"custody_type": "alternate_weekend", "notes": "Piano on Tuesday"}))
        .unwrap();
    assert_eq!(manager.config().custody_type, CustodyType::AlternateWeekend);
    assert_eq!(manager.config().child_name, "lea");

    let state = manager.compute_state(utc(3, 4, 12)).await;
    assert!(!state.is_present, "weekends only after the update");
    assert_eq!(state.attributes.notes.as_deref(), Some("Piano on Tuesday"));
}

#[tokio::test]
async fn extreme_inputs_do_not_abort_the_computation() {
    let huge_sync = Config {
        calendar_sync_days: u32::MAX,
        ..config(None)
    };
    let mut manager = manager(huge_sync, provider(Vec::new()));
    let now = utc(3, 4, 12);

    assert!(manager.compute_state(now).await.is_present);

    manager.override_presence(OverrideState::Off, Some(Duration::MAX), now);
    assert_eq!(manager.presence_override().unwrap().until, None);
    assert!(!manager.compute_state(now).await.is_present);
}
