//! Command line entry point for pitlog
//!
//! Replay a recorded tick log through the logger:
//! ```bash
//! pitlog replay race.yaml --speed 10 --archive-dir RaceLogs
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `pitlog=info`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use pitlog::{LoggerConfig, LoggerEvent, Pitlog, format_hms};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pitlog")]
#[command(about = "Stint and pit-stop logger for sim racing telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded tick log
    Replay {
        /// YAML tick log, one document per poll
        file: PathBuf,

        /// Playback speed multiplier
        #[arg(long, default_value_t = 1.0, value_parser = parse_speed)]
        speed: f64,

        /// Logger config file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stint log CSV
        #[arg(long)]
        output: Option<PathBuf>,

        /// Driver totals CSV
        #[arg(long)]
        driver_total: Option<PathBuf>,

        /// Directory receiving archived logs on session change
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Also write projected totals to this CSV
        #[arg(long)]
        live_totals: Option<PathBuf>,

        /// Recorded spacing between ticks in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Mirror stints and totals into this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn parse_speed(arg: &str) -> Result<f64, String> {
    let speed: f64 = arg.parse().map_err(|e| format!("{e}"))?;
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err(format!("speed must be a positive number, got {arg}"))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            file,
            speed,
            config,
            output,
            driver_total,
            archive_dir,
            live_totals,
            interval_ms,
            db,
        } => {
            let mut config = match config {
                Some(path) => LoggerConfig::from_yaml_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => LoggerConfig::default(),
            };
            // Flags override the file
            if let Some(path) = output {
                config.stint_log_path = path;
            }
            if let Some(path) = driver_total {
                config.totals_path = path;
            }
            if let Some(dir) = archive_dir {
                config.archive_dir = dir;
            }
            if live_totals.is_some() {
                config.live_totals_path = live_totals;
            }
            if let Some(ms) = interval_ms {
                config.poll_interval_ms = ms;
            }
            if db.is_some() {
                config.db_path = db;
            }

            replay(file, config, speed).await
        }
    }
}

async fn replay(file: PathBuf, config: LoggerConfig, speed: f64) -> Result<()> {
    let handle = Pitlog::replay(&file, config, speed)
        .with_context(|| format!("starting replay of {}", file.display()))?;

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, flushing open stints");
            cancel.cancel();
        }
    });

    let mut events = handle.events();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                LoggerEvent::StintClosed(record) => println!(
                    "STINT END - {} / {}: {} laps, {}",
                    record.team,
                    record.driver,
                    record.duration_laps,
                    format_hms(record.duration_seconds)
                ),
                LoggerEvent::SessionChanged(change) => {
                    println!("SESSION CHANGE - {} -> {}", change.old, change.new)
                }
                LoggerEvent::ShutdownFlush { partial_stints } => {
                    println!("Flushed {partial_stints} open stints")
                }
            }
        }
    });

    let summary = handle.join().await?;
    let _ = printer.await;

    info!(
        "{} ticks, {} stints, {} rollovers",
        summary.stats.ticks, summary.stats.stints_closed, summary.stats.rollovers
    );
    for (key, totals) in &summary.totals {
        println!(
            "{key}: {} laps, {} (avg {:.3}s, best {})",
            totals.total_laps,
            format_hms(totals.total_time_seconds),
            totals.average_lap_seconds(),
            totals.best_lap_seconds.map(|b| format!("{b:.3}s")).unwrap_or_else(|| "-".into())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_flag_rejects_non_finite_values() {
        for bad in ["NaN", "inf", "-1", "0", "fast"] {
            assert!(Cli::try_parse_from(["pitlog", "replay", "x.yaml", "--speed", bad]).is_err());
        }
        let cli = Cli::try_parse_from(["pitlog", "replay", "x.yaml", "--speed", "4"]).unwrap();
        let Commands::Replay { speed, .. } = cli.command;
        assert_eq!(speed, 4.0);
    }
}
