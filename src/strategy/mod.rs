//! Platform update strategies.
//!
//! Each platform reacts differently once a newer release is known:
//!
//! - **Silent installer** (Windows): download the installer, stage it next to
//!   the settings file and launch it on request.
//! - **Passive notifier** (Linux and other Unix): announce the release once and
//!   leave installation to the system package manager.
//!
//! macOS clients rely on the OS-native updater, which has its own lifecycle,
//! so no strategy exists for it.
//!
//! The strategy is chosen once when the updater is built and never changes.

mod launcher;
mod passive;
mod silent;

pub use launcher::{InstallerLauncher, ProcessLauncher};
pub use passive::PassiveNotifier;
pub use silent::{SilentInstaller, StagedInstaller};

use crate::config::StrategyKind;
use crate::error::{Error, Result};
use crate::event::{UpdaterEvent, UpdaterEventsSender};
use crate::update::{DownloadState, UpdateInfo};
use futures::future::BoxFuture;
use semver::Version;
use std::collections::HashSet;
use tracing::{debug, info};

/// What the state machine should do after a strategy saw a new release.
pub enum Reaction {
    /// Move straight to this state.
    Transition(DownloadState),
    /// Enter `Downloading` and drive this staging future to completion.
    Download(BoxFuture<'static, Result<StagedInstaller>>),
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transition(state) => f.debug_tuple("Transition").field(state).finish(),
            Self::Download(_) => f.write_str("Download(..)"),
        }
    }
}

/// The active platform strategy.
#[derive(Debug)]
pub enum PlatformStrategy {
    /// Download and launch the installer.
    SilentInstaller(SilentInstaller),
    /// Only announce new releases.
    PassiveNotifier(PassiveNotifier),
}

impl PlatformStrategy {
    /// Which variant this is.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SilentInstaller(_) => StrategyKind::Silent,
            Self::PassiveNotifier(_) => StrategyKind::Passive,
        }
    }

    /// Decide at process start whether an update from a previous run is
    /// waiting to be installed. Never touches the network.
    pub fn handle_startup(&mut self) -> bool {
        match self {
            Self::SilentInstaller(s) => s.handle_startup(),
            Self::PassiveNotifier(_) => false,
        }
    }

    /// Release info for an update found pending at startup.
    #[must_use]
    pub fn pending_update(&self) -> Option<UpdateInfo> {
        match self {
            Self::SilentInstaller(s) => s.staged().map(|staged| UpdateInfo::from_version(staged.version.clone())),
            Self::PassiveNotifier(_) => None,
        }
    }

    /// React to a release newer than the running version.
    pub fn version_info_arrived(&mut self, info: &UpdateInfo, events: &UpdaterEventsSender) -> Reaction {
        match self {
            Self::SilentInstaller(s) => s.version_info_arrived(info, events),
            Self::PassiveNotifier(p) => Reaction::Transition(p.version_info_arrived(info, events)),
        }
    }

    /// Record the outcome of a payload download started by
    /// [`Reaction::Download`] and return the resulting state.
    pub fn download_finished(&mut self, result: Result<StagedInstaller>) -> DownloadState {
        match self {
            Self::SilentInstaller(s) => s.download_finished(result),
            Self::PassiveNotifier(_) => DownloadState::DownloadFailed,
        }
    }

    /// Whether a background check should run from `state`.
    #[must_use]
    pub fn background_check_for_update(&self, state: DownloadState) -> bool {
        match self {
            Self::SilentInstaller(_) => matches!(
                state,
                DownloadState::Unknown
                    | DownloadState::UpToDate
                    | DownloadState::DownloadFailed
                    | DownloadState::DownloadTimedOut
            ),
            Self::PassiveNotifier(p) => p.background_check_for_update(state),
        }
    }

    /// Launch the staged update.
    ///
    /// Returns `Ok(true)` if an installer was started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`] if the installer cannot be launched.
    pub fn perform_update(&mut self, events: &UpdaterEventsSender) -> Result<bool> {
        match self {
            Self::SilentInstaller(s) => s.perform_update(events),
            Self::PassiveNotifier(_) => Ok(false),
        }
    }

    /// Stop offering `info` to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be persisted.
    pub fn skip_version(&mut self, info: &UpdateInfo) -> Result<bool> {
        match self {
            Self::SilentInstaller(s) => s.skip_version(info).map(|()| true),
            Self::PassiveNotifier(_) => Ok(false),
        }
    }
}

/// Resolve `auto` to the strategy for `os`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedPlatform`] when `os` has no strategy.
pub fn resolve_kind(kind: StrategyKind, os: &str) -> Result<StrategyKind> {
    match kind {
        StrategyKind::Silent | StrategyKind::Passive => Ok(kind),
        StrategyKind::Auto => match os {
            "windows" => Ok(StrategyKind::Silent),
            "macos" | "ios" => Err(Error::UnsupportedPlatform(format!(
                "{os} updates are handled by the OS-native updater"
            ))),
            "linux" | "freebsd" | "netbsd" | "openbsd" | "dragonfly" | "solaris" | "illumos" => {
                Ok(StrategyKind::Passive)
            }
            other => Err(Error::UnsupportedPlatform(format!(
                "no update strategy for {other}"
            ))),
        },
    }
}

/// Tracks which versions were announced during this process run.
#[derive(Debug, Default)]
pub(crate) struct Announcements {
    seen: HashSet<Version>,
}

impl Announcements {
    /// Announce `info` unless it was already announced. Returns whether an
    /// event was sent.
    pub(crate) fn announce(&mut self, info: &UpdateInfo, message: String, events: &UpdaterEventsSender) -> bool {
        if !self.seen.insert(info.version().clone()) {
            debug!("Version {} already announced, staying quiet", info.version());
            return false;
        }

        info!("Announcing new version {}", info.version());
        let _ = events.send(UpdaterEvent::NewUpdateAvailable {
            title: info.version_string().to_string(),
            message,
        });
        true
    }
}
