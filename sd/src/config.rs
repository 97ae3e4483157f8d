//! Configuration for stepdelay

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Defaults for the demo scenarios
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Tokens issued by `fan-out`
    #[serde(default = "default_count")]
    pub count: usize,

    /// Steps run by `chain`
    #[serde(default = "default_stages")]
    pub stages: usize,

    /// Tokens issued per `chain` step
    #[serde(default = "default_width")]
    pub width: usize,

    /// Upper bound for a token's simulated latency
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Fixed RNG seed; random per run when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_count() -> usize {
    5
}

fn default_stages() -> usize {
    3
}

fn default_width() -> usize {
    2
}

fn default_max_latency_ms() -> u64 {
    50
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            stages: default_stages(),
            width: default_width(),
            max_latency_ms: default_max_latency_ms(),
            seed: None,
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::load_file(config_path);
        }

        // Try default locations
        for path in default_paths().iter().flatten() {
            if path.exists() {
                return Self::load_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full `load` reports them once logging works.
    pub fn load_log_level(path: Option<&PathBuf>) -> Option<String> {
        Self::load(path).ok().and_then(|config| config.log_level)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config from {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).context(format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

fn default_paths() -> [Option<PathBuf>; 2] {
    [
        dirs::config_dir().map(|p| p.join("stepdelay").join("config.yml")),
        Some(PathBuf::from("stepdelay.yml")),
    ]
}
