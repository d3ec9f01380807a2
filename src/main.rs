//! Operator CLI for expense-guard.
//!
//! - `profiles`: print the effective breaker profiles
//! - `check-config`: validate a configuration file
//! - `simulate`: drive a breaker with a randomly failing operation on a
//!   manual clock and print every status
//! - `watch`: keep breaker profiles in sync with a config file until Ctrl-C

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::json;

use expense_guard::clock::{Clock, ManualClock, SystemClock};
use expense_guard::config::watcher::start_hot_reload;
use expense_guard::config::{load_config, GuardConfig};
use expense_guard::observability::{logging, metrics};
use expense_guard::resilience::{profiles, BreakerRegistry};

#[derive(Parser)]
#[command(name = "expense-guard")]
#[command(about = "Inspect and exercise expense-guard circuit breakers", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print breaker profiles as JSON
    Profiles,
    /// Validate a configuration file
    CheckConfig {
        path: PathBuf,
    },
    /// Run a breaker against an operation that fails at random
    Simulate {
        /// Profile to build the breaker from
        #[arg(short, long, default_value = "mutation")]
        profile: String,

        /// Number of calls to attempt
        #[arg(long, default_value_t = 20)]
        calls: u32,

        /// Probability in [0, 1] that a call fails
        #[arg(long, default_value_t = 0.5, value_parser = parse_failure_rate)]
        failure_rate: f64,

        /// Simulated milliseconds between calls
        #[arg(long, default_value_t = 5_000)]
        step_ms: u64,
    },
    /// Reload breaker profiles whenever a config file changes
    Watch {
        path: PathBuf,
    },
}

fn parse_failure_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{raw} is not a probability between 0 and 1"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init(&config.observability.log_filter);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Profiles => {
            let mut table = profiles::builtin_table();
            table.extend(config.breakers);
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Commands::CheckConfig { path } => match load_config(&path) {
            Ok(_) => println!("{}: ok", path.display()),
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        Commands::Simulate {
            profile,
            calls,
            failure_rate,
            step_ms,
        } => simulate(config, &profile, calls, failure_rate, step_ms).await?,
        Commands::Watch { path } => watch(&path).await?,
    }

    Ok(())
}

async fn simulate(
    config: GuardConfig,
    profile: &str,
    calls: u32,
    failure_rate: f64,
    step_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(ManualClock::new(SystemClock.now_ms()));
    let registry = BreakerRegistry::with_clock(config.breakers, clock.clone());
    let breaker = registry.get_or_create("simulated", profile)?;

    tracing::info!(profile, calls, failure_rate, step_ms, "Starting simulation");

    for call in 1..=calls {
        let fail = rand::thread_rng().gen_bool(failure_rate);
        let result = breaker
            .execute(|| async move {
                if fail {
                    Err("injected failure")
                } else {
                    Ok(())
                }
            })
            .await;

        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) if e.is_rejected() => "rejected",
            Err(_) => "failed",
        };
        let line = json!({
            "call": call,
            "outcome": outcome,
            "status": breaker.status(),
        });
        println!("{}", serde_json::to_string(&line)?);

        clock.advance(step_ms);
    }

    Ok(())
}

async fn watch(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let registry = Arc::new(BreakerRegistry::new(config.breakers));
    let (_watcher, reloader) = start_hot_reload(path, registry.clone())?;

    tracing::info!(path = %path.display(), "Watching config, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    reloader.abort();

    for name in profiles::builtin_table().keys() {
        if let Some(profile) = registry.profile(name) {
            println!("{}", json!({ "profile": name, "settings": profile }));
        }
    }
    Ok(())
}
