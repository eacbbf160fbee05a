//! CLI configuration: environment first, then an optional JSON file for the
//! orchestrator itself.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use harvester::HarvestConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings loaded from `HARVEST_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for collected payloads
    pub output_dir: PathBuf,
    /// Ledger snapshot read at start and written at shutdown
    pub ledger_path: PathBuf,
    /// JSON file with a full `HarvestConfig`
    pub config_file: Option<PathBuf>,
    pub quiet_period: Option<Duration>,
    pub call_timeout: Option<Duration>,
    pub settle_delay: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let output_dir = PathBuf::from(
            env::var("HARVEST_OUTPUT_DIR").unwrap_or_else(|_| "./harvest-output".to_string()),
        );
        let ledger_path = env::var("HARVEST_LEDGER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("ledger.json"));

        Ok(Self {
            ledger_path,
            output_dir,
            config_file: env::var("HARVEST_CONFIG").ok().map(PathBuf::from),
            quiet_period: millis_var("HARVEST_QUIET_PERIOD_MS")?,
            call_timeout: millis_var("HARVEST_CALL_TIMEOUT_MS")?,
            settle_delay: millis_var("HARVEST_SETTLE_DELAY_MS")?,
        })
    }

    /// Point outputs somewhere else; the ledger follows unless set explicitly.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if self.ledger_path == self.output_dir.join("ledger.json") {
            self.ledger_path = dir.join("ledger.json");
        }
        self.output_dir = dir;
        self
    }

    /// Orchestrator configuration: file (or defaults) plus overrides.
    pub fn harvest_config(&self) -> Result<HarvestConfig> {
        let mut config = match &self.config_file {
            Some(path) => load_harvest_config(path)?,
            None => HarvestConfig::default(),
        };
        if let Some(quiet_period) = self.quiet_period {
            config = config.with_quiet_period(quiet_period);
        }
        if let Some(call_timeout) = self.call_timeout {
            config = config.with_call_timeout(call_timeout);
        }
        if let Some(settle_delay) = self.settle_delay {
            config = config.with_settle_delay(settle_delay);
        }
        config.validate().context("Invalid harvest configuration")?;
        Ok(config)
    }
}

fn load_harvest_config(path: &Path) -> Result<HarvestConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Config file {} is not a valid harvest config", path.display()))
}

fn millis_var(name: &str) -> Result<Option<Duration>> {
    match env::var(name) {
        Ok(value) => {
            let ms: u64 = value
                .parse()
                .with_context(|| format!("{name} must be a number of milliseconds"))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}
