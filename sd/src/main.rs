//! sd - stepdelay demo driver
//!
//! Runs fan-out and chained scenarios on the default event loop.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, info};

use stepdelay::cli::{Cli, Command, OutputFormat};
use stepdelay::config::Config;
use stepdelay::demo::{self, Latency};
use stepdelay::{Delay, DelayResult};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stepdelay")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("stepdelay.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let demo_config = &config.demo;

    debug!(command = ?cli.command, "main: dispatching command");
    let started = Instant::now();
    let (label, outcome) = match cli.command {
        Command::FanOut {
            count,
            max_latency_ms,
            seed,
        } => {
            let count = count.unwrap_or(demo_config.count);
            let mut latency = Latency::new(
                Duration::from_millis(max_latency_ms.unwrap_or(demo_config.max_latency_ms)),
                seed.or(demo_config.seed),
            );
            info!(count, "main: fan-out");
            ("fan-out", demo::fan_out(&Delay::new(), count, &mut latency))
        }
        Command::Chain {
            stages,
            width,
            max_latency_ms,
            seed,
        } => {
            let stages = stages.unwrap_or(demo_config.stages);
            let width = width.unwrap_or(demo_config.width);
            let latency = Latency::new(
                Duration::from_millis(max_latency_ms.unwrap_or(demo_config.max_latency_ms)),
                seed.or(demo_config.seed),
            );
            info!(stages, width, "main: chain");
            ("chain", demo::chain(&Delay::new(), stages, width, latency))
        }
        Command::Fail { at, message } => {
            info!(at, %message, "main: failing chain");
            ("fail", demo::failing_chain(&Delay::new(), at, &message))
        }
    };

    report(label, &outcome, started.elapsed(), cli.format)?;
    outcome.map(|_| ()).context(format!("{} delay failed", label))
}

fn report(label: &str, outcome: &DelayResult<Vec<Value>>, elapsed: Duration, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let body = match outcome {
                Ok(args) => json!({
                    "scenario": label,
                    "event": "finish",
                    "args": args,
                    "elapsed_ms": elapsed.as_millis() as u64,
                }),
                Err(err) => json!({
                    "scenario": label,
                    "event": "error",
                    "error": err.to_string(),
                    "elapsed_ms": elapsed.as_millis() as u64,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => match outcome {
            Ok(args) => {
                println!(
                    "{} {} finished with {} value(s) in {}ms",
                    "✓".green(),
                    label.cyan(),
                    args.len(),
                    elapsed.as_millis()
                );
                for (i, arg) in args.iter().enumerate() {
                    println!("  {} {}", format!("[{}]", i).dimmed(), arg);
                }
            }
            Err(err) => {
                println!("{} {} {}", "✗".red(), label.cyan(), err.to_string().red());
            }
        },
    }
    Ok(())
}
