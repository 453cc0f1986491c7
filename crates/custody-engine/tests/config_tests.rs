//! Tests for configuration parsing and its lenient fallbacks.

use chrono::{NaiveTime, Weekday};
use custody_engine::config::{
    Config, Country, CustodyType, CustodyTypeDefinition, ParentalRole, ReferenceParity, Segment,
    SplitMode, SummerMode, VacationRule, MAX_SYNC_DAYS,
};
use custody_engine::dst::DstPolicy;
use serde_json::json;

#[test]
fn full_document_parses() {
    let config = Config::from_json(
        r#"{
            "child_name": "tom",
            "child_name_display": "Tom",
            "time_zone": "Europe/Brussels",
            "custody_type": "alternate_weekend",
            "reference_year": "odd",
            "end_day": "monday",
            "weekend_start_day": "Saturday",
            "arrival_time": "16:15",
            "departure_time": "18:30:00",
            "country": "BE",
            "zone": "fr",
            "vacation_split_mode": "odd_second",
            "summer_split_mode": "quarter",
            "vacation_rule": "first_week",
            "auto_parent_days": true,
            "parental_role": "father",
            "calendar_sync_days": 200,
            "dst_policy": "skip"
        }"#,
    )
    .unwrap();

    assert_eq!(config.custody_type, CustodyType::AlternateWeekend);
    assert_eq!(config.reference_year, ReferenceParity::Odd);
    assert_eq!(config.end_day, Weekday::Mon);
    assert_eq!(config.weekend_start_day, Weekday::Sat);
    assert_eq!(config.arrival(), NaiveTime::from_hms_opt(16, 15, 0).unwrap());
    assert_eq!(config.departure(), NaiveTime::from_hms_opt(18, 30, 0).unwrap());
    assert_eq!(config.country, Country::Belgium);
    assert_eq!(config.vacation_split_mode, SplitMode::OddSecond);
    assert_eq!(config.summer_split_mode, SummerMode::Quarter);
    assert_eq!(config.vacation_rule, Some(VacationRule::FirstWeek));
    assert_eq!(config.parental_role, ParentalRole::Father);
    assert_eq!(config.dst_policy, DstPolicy::Skip);
    assert_eq!(config.display_name(), "Tom");
    assert_eq!(config.horizon_days(), 400);
}

#[test]
fn empty_document_uses_defaults() {
    let config = Config::from_json("{}").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.start_day, Weekday::Mon);
    assert_eq!(config.end_day, Weekday::Sun);
    assert_eq!(config.weekend_start_day, Weekday::Fri);
    assert!(config.enable_custody);
}

#[test]
fn unknown_values_fall_back_instead_of_failing() {
    let config = Config::from_json(
        r#"{
            "custody_type": "every_other_tuesday",
            "country": "DE",
            "end_day": "someday",
            "vacation_rule": "whatever",
            "summer_split_mode": null,
            "arrival_time": "25:99",
            "time_zone": "Mars/Olympus_Mons"
        }"#,
    )
    .unwrap();

    assert_eq!(config.custody_type, CustodyType::AlternateWeek);
    assert_eq!(config.country, Country::France);
    assert_eq!(config.end_day, Weekday::Sun);
    assert_eq!(config.vacation_rule, None);
    assert_eq!(config.summer_split_mode, SummerMode::Half);
    assert_eq!(config.arrival(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert_eq!(config.calendar().tz, chrono_tz::Tz::UTC);
}

#[test]
fn malformed_json_is_an_error() {
    assert!(Config::from_json("[1, 2]").is_err());
    assert!(Config::from_json("{\"child_name\": ").is_err());
}

#[test]
fn display_name_falls_back_to_normalized_name() {
    let config = Config {
        child_name: "lea".into(),
        child_name_display: Some(String::new()),
        ..Config::default()
    };
    assert_eq!(config.display_name(), "lea");
}

#[test]
fn patch_replaces_top_level_keys_only() {
    let base = Config {
        child_name: "lea".into(),
        zone: Some("A".into()),
        ..Config::default()
    };
    let patched = base
        .patched(&json!({"zone": "C", "custody_type": "two_two_three", "end_day": "friday"}))
        .unwrap();

    assert_eq!(patched.zone.as_deref(), Some("C"));
    assert_eq!(patched.custody_type, CustodyType::TwoTwoThree);
    assert_eq!(patched.end_day, Weekday::Fri);
    assert_eq!(patched.child_name, "lea");

    assert!(base.patched(&json!("zone=C")).is_err());
}

#[test]
fn patch_round_trips_optional_rule() {
    let base = Config {
        vacation_rule: Some(VacationRule::EvenWeekends),
        ..Config::default()
    };
    let patched = base.patched(&json!({"notes": "hello"})).unwrap();
    assert_eq!(patched.vacation_rule, Some(VacationRule::EvenWeekends));
}

#[test]
fn custom_pattern_is_run_length_encoded() {
    let def = CustodyTypeDefinition::from_pattern("on, ON, off, 1, true, 0, off").unwrap();
    assert_eq!(def.cycle_length_days, 7);
    assert_eq!(
        def.segments,
        vec![Segment::on(2), Segment::off(1), Segment::on(2), Segment::off(2)]
    );
    assert!(CustodyTypeDefinition::from_pattern(" , ").is_none());
}

#[test]
fn custom_type_without_pattern_uses_builtin_cycle() {
    let config = Config {
        custody_type: CustodyType::Custom,
        custom_pattern: Some("on,off".into()),
        ..Config::default()
    };
    assert_eq!(config.cycle().cycle_length_days, 2);

    let fallback = Config {
        custody_type: CustodyType::Custom,
        ..Config::default()
    };
    assert!(fallback.cycle().segments.is_empty());
}

#[test]
fn long_sync_window_extends_horizon() {
    let config = Config {
        calendar_sync_days: 450,
        ..Config::default()
    };
    assert_eq!(config.horizon_days(), 480);
}

#[test]
fn oversized_sync_window_is_clamped() {
    let config = Config::from_json(r#"{"calendar_sync_days": 99999999999}"#).unwrap();
    assert_eq!(config.calendar_sync_days, MAX_SYNC_DAYS);

    let direct = Config {
        calendar_sync_days: u32::MAX,
        ..Config::default()
    };
    assert_eq!(direct.horizon_days(), i64::from(MAX_SYNC_DAYS) + 30);
}

#[test]
fn weekend_start_accepts_friday_or_saturday_only() {
    let saturday = Config::from_json(r#"{"weekend_start_day": "saturday"}"#).unwrap();
    assert_eq!(saturday.weekend_start_day, Weekday::Sat);

    let tuesday = Config::from_json(r#"{"weekend_start_day": "tuesday"}"#).unwrap();
    assert_eq!(tuesday.weekend_start_day, Weekday::Fri);
}
