//! CLI argument parsing for stepdelay

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sd")]
#[command(
    author,
    version,
    about = "Fan out and chain callback work on a single-threaded event loop",
    long_about = None,
    after_help = "Logs are written to: ~/.local/share/stepdelay/logs/stepdelay.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue N timer-backed tokens at once and wait for all of them
    FanOut {
        /// Number of tokens (default: from config)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Maximum simulated latency per token in milliseconds
        #[arg(short, long)]
        max_latency_ms: Option<u64>,

        /// RNG seed for reproducible latencies
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Run a chain of steps, each fanning out over the previous step's results
    Chain {
        /// Number of steps (default: from config)
        #[arg(long)]
        stages: Option<usize>,

        /// Tokens issued per step (default: from config)
        #[arg(short, long)]
        width: Option<usize>,

        /// Maximum simulated latency per token in milliseconds
        #[arg(short, long)]
        max_latency_ms: Option<u64>,

        /// RNG seed for reproducible latencies
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Run a chain whose step fails, showing error propagation through wait
    Fail {
        /// 1-based index of the failing step
        #[arg(long, default_value = "2")]
        at: usize,

        /// Failure message
        #[arg(short, long, default_value = "boom")]
        message: String,
    },
}
