//! Integration tests for the `custody` CLI binary.
//!
//! Every fixture has no school zone, so no holiday provider is contacted and
//! the output depends only on the configuration and `--now`.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

/// Wednesday of ISO week 10, 13:00 in Paris.
const NOW: &str = "2026-03-04T12:00:00Z";

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn custody() -> Command {
    Command::cargo_bin("custody").unwrap()
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout must be JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// state
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn state_reports_presence_inside_custody_week() {
    let json = stdout_json(custody().args(["state", "-c", &fixture("lea.json"), "--now", NOW]));

    assert_eq!(json["is_present"], true);
    // Week of Monday 2026-03-02, handed back Sunday 19:00 Paris (UTC+1).
    assert_eq!(json["next_departure"]["at"], "2026-03-08T18:00:00Z");
    assert_eq!(json["next_arrival"]["at"], "2026-03-16T07:00:00Z");
    assert_eq!(json["current_period"], "school");
    assert_eq!(json["attributes"]["location"], "Lyon");
}

#[test]
fn state_override_off_forces_absence() {
    let json = stdout_json(custody().args([
        "state",
        "-c",
        &fixture("lea.json"),
        "--now",
        NOW,
        "--override",
        "off",
        "--override-hours",
        "2",
    ]));

    assert_eq!(json["is_present"], false);
}

#[test]
fn state_with_manual_window_skips_invalid_entries() {
    let json = stdout_json(custody().args([
        "state",
        "-c",
        &fixture("tom.json"),
        "--now",
        NOW,
        "--manual",
        &fixture("manual.json"),
    ]));

    assert_eq!(json["is_present"], true);
    assert_eq!(json["next_departure"]["label"], "Doctor");
    assert_eq!(json["next_departure"]["at"], "2026-03-04T16:00:00Z");
    // Next odd ISO week (11): Friday 2026-03-13 08:00 Paris.
    assert_eq!(json["next_arrival"]["at"], "2026-03-13T07:00:00Z");

    let manual = json["windows"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|w| w["source"] == "manual")
        .count();
    assert_eq!(manual, 1);
}

#[test]
fn state_is_deterministic_for_fixed_now() {
    let args = ["state", "-c", &fixture("tom.json"), "--now", NOW];
    let first = stdout_json(custody().args(args));
    let second = stdout_json(custody().args(args));
    assert_eq!(first, second);
}

#[test]
fn state_rejects_out_of_range_override_hours() {
    for hours in ["0", "9223372036854775807"] {
        custody()
            .args([
                "state",
                "-c",
                &fixture("lea.json"),
                "--now",
                NOW,
                "--override",
                "on",
                "--override-hours",
                hours,
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--override-hours"));
    }
}

#[test]
fn state_missing_config_fails() {
    custody()
        .args(["state", "-c", "/nonexistent/arrangement.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn state_invalid_now_fails() {
    custody()
        .args(["state", "-c", &fixture("lea.json"), "--now", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid RFC 3339 timestamp"));
}

// ─────────────────────────────────────────────────────────────────────────────
// events
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn events_lists_pattern_windows_in_range() {
    let json = stdout_json(custody().args([
        "events",
        "-c",
        &fixture("lea.json"),
        "--now",
        NOW,
        "--from",
        "2026-03-01T00:00:00Z",
        "--to",
        "2026-03-31T00:00:00Z",
    ]));

    let events = json.as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["start"], "2026-03-02T07:00:00Z");
    assert_eq!(events[0]["summary"], "Léa • Custody - Alternating Weeks");
    assert_eq!(
        events[0]["description"],
        "Regular custody • Custody - Alternating Weeks"
    );
    assert_eq!(events[0]["location"], "Lyon");
    assert_eq!(events[1]["start"], "2026-03-16T07:00:00Z");
    // Summer time from 2026-03-29: 08:00 Paris is 06:00 UTC.
    assert_eq!(events[2]["start"], "2026-03-30T06:00:00Z");
}

#[test]
fn events_rejects_inverted_range() {
    custody()
        .args([
            "events",
            "-c",
            &fixture("lea.json"),
            "--from",
            "2026-03-31T00:00:00Z",
            "--to",
            "2026-03-01T00:00:00Z",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--to must not be before --from"));
}

// ─────────────────────────────────────────────────────────────────────────────
// who
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn who_finds_child_case_insensitively() {
    let json = stdout_json(custody().args([
        "who",
        "LÉA",
        "-c",
        &fixture("tom.json"),
        "-c",
        &fixture("lea.json"),
        "--now",
        NOW,
    ]));

    assert_eq!(json["status"], "with_you");
    assert_eq!(json["name"], "Léa");
    assert_eq!(json["next_change"]["at"], "2026-03-08T18:00:00Z");
}

#[test]
fn who_reports_other_parent() {
    let json = stdout_json(custody().args([
        "who",
        "tom",
        "-c",
        &fixture("tom.json"),
        "--now",
        NOW,
    ]));

    assert_eq!(json["status"], "with_other_parent");
    assert_eq!(json["next_change"]["at"], "2026-03-13T07:00:00Z");
}

#[test]
fn who_unknown_child_is_not_found() {
    let json = stdout_json(custody().args([
        "who",
        "zoe",
        "-c",
        &fixture("lea.json"),
        "--now",
        NOW,
    ]));

    assert_eq!(json["status"], "not_found");
    assert_eq!(json["query"], "zoe");
}

// ─────────────────────────────────────────────────────────────────────────────
// holidays / watch
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn holidays_without_zone_is_empty() {
    custody()
        .args(["holidays", "-c", &fixture("lea.json"), "--now", NOW])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn holidays_test_reports_failure_without_zone() {
    let json = stdout_json(custody().args([
        "holidays",
        "-c",
        &fixture("lea.json"),
        "--now",
        NOW,
        "--test",
    ]));

    assert_eq!(json["success"], false);
    assert_eq!(json["holidays_count"], 0);
    assert!(json["error"].as_str().unwrap().contains("no school zone"));
}

#[test]
fn watch_prints_one_line_per_tick() {
    let output = custody()
        .args([
            "watch",
            "-c",
            &fixture("lea.json"),
            "--now",
            NOW,
            "--ticks",
            "1",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let line: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(line["is_present"], true);
}

#[test]
fn no_subcommand_shows_usage_error() {
    custody()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
