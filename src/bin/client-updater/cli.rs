//! Command-line interface definition.

use clap::{Parser, ValueEnum};
use client_updater::config::{StrategyKind, UpdaterConfig};
use std::path::PathBuf;

/// Check a release endpoint for client updates.
#[derive(Parser, Debug)]
#[command(name = "client-updater")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Version endpoint URL.
    #[arg(long, env = "CLIENT_UPDATER_URL")]
    pub update_url: Option<String>,

    /// Update strategy.
    #[arg(long, value_enum, env = "CLIENT_UPDATER_STRATEGY")]
    pub strategy: Option<CliStrategy>,

    /// Version of the running client.
    #[arg(long, env = "CLIENT_UPDATER_CLIENT_VERSION")]
    pub client_version: Option<String>,

    /// Directory for persisted settings and staged installers.
    #[arg(long, env = "CLIENT_UPDATER_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Hours between background checks.
    #[arg(long, env = "CLIENT_UPDATER_CHECK_INTERVAL_HOURS")]
    pub check_interval_hours: Option<u64>,

    /// Seconds before a version request times out.
    #[arg(long, env = "CLIENT_UPDATER_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Disable background checks.
    #[arg(long)]
    pub no_background_checks: bool,

    /// Check once, print the status and exit.
    #[arg(long)]
    pub once: bool,

    /// Launch a staged installer, if any, after checking.
    #[arg(long, requires = "once")]
    pub install: bool,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Strategy CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliStrategy {
    /// Pick the strategy for this platform.
    Auto,
    /// Download and launch the installer.
    Silent,
    /// Announce new versions only.
    Passive,
}

impl Cli {
    /// Convert CLI arguments into an `UpdaterConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<UpdaterConfig> {
        let mut config = if let Some(ref path) = self.config {
            UpdaterConfig::from_file(path)?
        } else {
            UpdaterConfig::default()
        };

        if let Some(ref url) = self.update_url {
            config.update_url.clone_from(url);
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if let Some(ref version) = self.client_version {
            config.client_version = Some(version.clone());
        }
        if let Some(ref dir) = self.state_dir {
            config.state_dir.clone_from(dir);
        }
        if let Some(hours) = self.check_interval_hours {
            config.check_interval_hours = hours;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if self.no_background_checks {
            config.enabled = false;
        }
        config.log_level.clone_from(&self.log_level);

        Ok(config)
    }
}

impl From<CliStrategy> for StrategyKind {
    fn from(s: CliStrategy) -> Self {
        match s {
            CliStrategy::Auto => StrategyKind::Auto,
            CliStrategy::Silent => StrategyKind::Silent,
            CliStrategy::Passive => StrategyKind::Passive,
        }
    }
}
