//! Configuration management for the CLI
//!
//! Settings come from `~/.config/nami/config.json` when it exists, then
//! `NAMI_*` environment variables. Command-line flags win over both.

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use nami_lib::deploy::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use nami_lib::fleet::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "NAMI";

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region override for the control plane
    pub region: Option<String>,
    /// Named credential profile
    pub profile: Option<String>,
    /// Cluster used when a command is given none
    pub default_cluster: Option<String>,
    /// Maximum in-flight workers for fleet reports
    pub concurrency: usize,
    pub poll_interval_secs: u64,
    pub default_timeout_secs: u64,
    /// Default output format
    pub format: Option<OutputFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            default_cluster: None,
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            default_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            format: None,
        }
    }
}

impl Config {
    /// Load configuration from the default file and the environment
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::load_layers(None),
        }
    }

    /// Load configuration from a specific file and the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_layers(Some(path))
    }

    fn load_layers(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Poll cadence for `--wait`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Convergence deadline when `--timeout` is not given
    pub fn default_timeout(&self) -> Duration {
        match self.default_timeout_secs {
            0 => DEFAULT_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("nami").join("config.json"))
    }
}
