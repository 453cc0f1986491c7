//! `custody` CLI: compute presence schedules for custody arrangements.
//!
//! ## Usage
//!
//! ```sh
//! # Current state of one arrangement, as JSON
//! custody state -c lea.json
//!
//! # State at a fixed instant, with a forced presence for 4 hours
//! custody state -c lea.json --now 2026-03-02T09:00:00Z --override on --override-hours 4
//!
//! # Calendar events for a range
//! custody events -c lea.json --from 2026-03-01T00:00:00Z --to 2026-04-01T00:00:00Z
//!
//! # Who has the child? Searches every given arrangement by name
//! custody who lea -c lea.json -c tom.json
//!
//! # School holidays, or a direct provider check
//! custody holidays -c lea.json --test
//!
//! # Recompute every 15 minutes
//! custody watch -c lea.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use custody_engine::exceptions::ManualRange;
use custody_engine::holidays::{CacheStore, JsonFileStore, MemoryStore, ProviderSet};
use custody_engine::projection::Arrangement;
use custody_engine::{
    calendar_events, who_has_child, Config, HolidayClient, OverrideState, ScheduleManager,
    REFRESH_INTERVAL,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAX_OVERRIDE_HOURS: i64 = 24 * 366;

#[derive(Parser)]
#[command(name = "custody", version, about = "Shared-custody presence schedules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter (e.g. "info", "custody_engine=debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Persist the school-holiday cache to this JSON file
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Evaluate at this RFC 3339 instant instead of the current time
    #[arg(long, global = true)]
    now: Option<String>,
}

#[derive(clap::Args)]
struct ScheduleArgs {
    /// Arrangement configuration file (JSON)
    #[arg(short, long)]
    config: PathBuf,
    /// JSON file holding a list of manual windows ({start, end, label})
    #[arg(long)]
    manual: Option<PathBuf>,
    /// Force presence on or off
    #[arg(long = "override", value_enum)]
    presence_override: Option<OverrideArg>,
    /// Override duration in hours, at most one year (unbounded if omitted)
    #[arg(
        long,
        requires = "presence_override",
        value_parser = clap::value_parser!(i64).range(1..=MAX_OVERRIDE_HOURS)
    )]
    override_hours: Option<i64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OverrideArg {
    On,
    Off,
}

impl From<OverrideArg> for OverrideState {
    fn from(arg: OverrideArg) -> Self {
        match arg {
            OverrideArg::On => OverrideState::On,
            OverrideArg::Off => OverrideState::Off,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the full schedule state
    State {
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// List calendar events between two instants
    Events {
        #[command(flatten)]
        schedule: ScheduleArgs,
        /// Range start (RFC 3339)
        #[arg(long)]
        from: String,
        /// Range end (RFC 3339)
        #[arg(long)]
        to: String,
    },
    /// Find which parent has a child, by name
    Who {
        /// Child name or part of it
        query: String,
        /// Arrangement configuration files
        #[arg(short, long = "config", required = true)]
        configs: Vec<PathBuf>,
    },
    /// List school holidays for an arrangement
    Holidays {
        #[arg(short, long)]
        config: PathBuf,
        /// Query the provider directly and report the outcome
        #[arg(long)]
        test: bool,
    },
    /// Recompute on the refresh interval and print one line per tick
    Watch {
        #[command(flatten)]
        schedule: ScheduleArgs,
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let fixed_now = cli.now.as_deref().map(parse_instant).transpose()?;
    let now = fixed_now.unwrap_or_else(Utc::now);
    let cache = cli.cache.as_deref();

    match cli.command {
        Commands::State { schedule } => {
            let mut manager = build_manager(&schedule, cache, now)?;
            let computation = manager.compute_state(now).await;
            print_json(&computation)?;
        }
        Commands::Events { schedule, from, to } => {
            let from = parse_instant(&from)?;
            let to = parse_instant(&to)?;
            if to < from {
                bail!("--to must not be before --from");
            }
            let mut manager = build_manager(&schedule, cache, now)?;
            let computation = manager.compute_state(now).await;
            let config = manager.config();
            let events = calendar_events(
                config.display_name(),
                &computation.windows,
                config.location.as_deref(),
                from,
                to,
            );
            print_json(&events)?;
        }
        Commands::Who { query, configs } => {
            let mut loaded = Vec::with_capacity(configs.len());
            for path in &configs {
                let config = load_config(path)?;
                let mut manager = ScheduleManager::new(config.clone(), holiday_client(cache));
                let computation = manager.compute_state(now).await;
                loaded.push((config, computation));
            }
            let arrangements: Vec<Arrangement<'_>> = loaded
                .iter()
                .map(|(config, computation)| Arrangement {
                    config,
                    computation: Some(computation),
                })
                .collect();
            print_json(&who_has_child(&query, &arrangements))?;
        }
        Commands::Holidays { config, test } => {
            let config = load_config(&config)?;
            let zone = config.zone.clone().unwrap_or_default();
            let client = holiday_client(cache);
            let calendar = config.calendar();
            if test {
                let report = client.test_connection(config.country, &zone, now, &calendar).await;
                print_json(&report)?;
            } else {
                let holidays = client.list(config.country, &zone, now, &calendar).await;
                print_json(&holidays)?;
            }
        }
        Commands::Watch { schedule, ticks } => {
            let mut manager = build_manager(&schedule, cache, now)?;
            let mut interval = tokio::time::interval(REFRESH_INTERVAL);
            let mut count = 0u64;
            loop {
                interval.tick().await;
                let tick_now = fixed_now.unwrap_or_else(Utc::now);
                let computation = manager.compute_state(tick_now).await;
                println!(
                    "{}",
                    serde_json::to_string(&serde_json::json!({
                        "at": tick_now,
                        "is_present": computation.is_present,
                        "next_arrival": computation.next_arrival,
                        "next_departure": computation.next_departure,
                        "days_remaining": computation.days_remaining,
                    }))?
                );
                count += 1;
                if ticks.is_some_and(|limit| count >= limit) {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("Invalid log filter: {}", level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid RFC 3339 timestamp: {}", raw))
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load configuration: {}", path.display()))
}

fn holiday_client(cache: Option<&Path>) -> HolidayClient {
    let store: Box<dyn CacheStore> = match cache {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::default()),
    };
    HolidayClient::new(ProviderSet::http(), store)
}

fn build_manager(args: &ScheduleArgs, cache: Option<&Path>, now: DateTime<Utc>) -> Result<ScheduleManager> {
    let config = load_config(&args.config)?;
    let mut manager = ScheduleManager::new(config, holiday_client(cache));

    if let Some(path) = &args.manual {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let ranges: Vec<ManualRange> =
            serde_json::from_str(&text).context("Manual windows must be a JSON list")?;
        let accepted = manager.set_manual_windows(&ranges);
        info!(accepted, given = ranges.len(), "manual windows loaded");
    }

    if let Some(state) = args.presence_override {
        let duration = args.override_hours.map(Duration::hours);
        manager.override_presence(state.into(), duration, now);
    }
    Ok(manager)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
