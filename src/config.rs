//! Configuration for client-updater.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How updates are applied on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Pick the strategy for the target platform.
    #[default]
    Auto,
    /// Download and launch the installer.
    Silent,
    /// Announce new versions only.
    Passive,
}

/// Updater configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Run background checks at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Version endpoint URL.
    #[serde(default = "default_update_url")]
    pub update_url: String,

    /// Update strategy.
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Version of the running client; defaults to this crate's version.
    #[serde(default)]
    pub client_version: Option<String>,

    /// Hours between background checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_hours: u64,

    /// Seconds before the first background check.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Seconds a version request may take before the check times out.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Seconds an installer download may take.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Directory for persisted settings and staged installers.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Arguments passed to a launched installer.
    #[serde(default = "default_installer_args")]
    pub installer_args: Vec<String>,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            update_url: default_update_url(),
            strategy: StrategyKind::default(),
            client_version: None,
            check_interval_hours: default_check_interval(),
            initial_delay_secs: default_initial_delay(),
            request_timeout_secs: default_request_timeout(),
            download_timeout_secs: default_download_timeout(),
            state_dir: default_state_dir(),
            installer_args: default_installer_args(),
            log_level: default_log_level(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

fn default_update_url() -> String {
    "https://updates.example.com/client/".to_string()
}

const fn default_check_interval() -> u64 {
    10 // 10 hours
}

const fn default_initial_delay() -> u64 {
    3
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_download_timeout() -> u64 {
    600
}

fn default_state_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "client-updater")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".client-updater"))
}

fn default_installer_args() -> Vec<String> {
    if cfg!(windows) {
        vec!["/S".to_string(), "/launch".to_string()]
    } else {
        Vec::new()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl UpdaterConfig {
    /// Interval between background checks.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours * 3600)
    }

    /// Delay before the first background check.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Upper bound for one version request.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Upper bound for one installer download.
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Path of the persisted settings file.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.state_dir.join("updater.toml")
    }

    /// Check the values that have no sensible fallback.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> crate::Result<()> {
        if self.update_url.trim().is_empty() {
            return Err(crate::Error::Config("update_url must not be empty".to_string()));
        }
        if self.check_interval_hours == 0 {
            return Err(crate::Error::Config("check_interval_hours must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::Config("request_timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
