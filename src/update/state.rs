//! Download lifecycle states.

use crate::update::UpdateInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// No check has run yet.
    #[default]
    Unknown,
    /// Waiting for the version endpoint.
    CheckingServer,
    /// The running version is current.
    UpToDate,
    /// Fetching the installer payload.
    Downloading,
    /// The installer is staged and ready to launch.
    DownloadComplete,
    /// The check or the download failed.
    DownloadFailed,
    /// The version endpoint did not answer in time.
    DownloadTimedOut,
    /// A newer version exists but must be installed by the system.
    UpdateOnlyAvailableThroughSystem,
}

impl DownloadState {
    /// Whether this state ends the current check cycle.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unknown | Self::CheckingServer | Self::Downloading)
    }

    /// Whether a check is outstanding in this state.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::CheckingServer | Self::Downloading)
    }

    /// Plain-language status for this state.
    ///
    /// Depends only on the state and the cached release info.
    #[must_use]
    pub fn status_string(self, info: Option<&UpdateInfo>) -> String {
        let version = info.map_or("", UpdateInfo::version_string);
        match self {
            Self::Unknown => "No update check has been performed yet.".to_string(),
            Self::CheckingServer => "Checking update server...".to_string(),
            Self::UpToDate => "The client is up to date.".to_string(),
            Self::Downloading => format!("Downloading version {version}. Please wait..."),
            Self::DownloadComplete => {
                format!("Version {version} is available. Restart the application to start the update.")
            }
            Self::DownloadFailed => match info.map(UpdateInfo::web_url).filter(|u| !u.is_empty()) {
                Some(url) => {
                    format!("Could not download update. Please download it manually from {url}.")
                }
                None => "Could not check for new updates.".to_string(),
            },
            Self::DownloadTimedOut => "Timed out while checking for updates.".to_string(),
            Self::UpdateOnlyAvailableThroughSystem => {
                format!("New version {version} is available. Please use the system's update tool to install it.")
            }
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::CheckingServer => "checking-server",
            Self::UpToDate => "up-to-date",
            Self::Downloading => "downloading",
            Self::DownloadComplete => "download-complete",
            Self::DownloadFailed => "download-failed",
            Self::DownloadTimedOut => "download-timed-out",
            Self::UpdateOnlyAvailableThroughSystem => "update-only-available-through-system",
        };
        f.write_str(name)
    }
}
