//! The update check state machine.
//!
//! One check runs at a time. Starting a check bumps the check generation,
//! arms the watchdog and spawns the fetch; every spawned task reports back
//! through the completion channel tagged with the generation it belongs to.
//! Completions for a generation other than the current one, or arriving
//! after the check has left the state they expect, are dropped. That is the
//! only cancellation path: an abandoned fetch keeps running but its result is
//! never applied.

use crate::error::{Error, Result};
use crate::event::{UpdaterEvent, UpdaterEventsSender};
use crate::strategy::{PlatformStrategy, Reaction, StagedInstaller};
use crate::update::{DownloadState, UpdateInfo, VersionFetcher, Watchdog};
use chrono::{DateTime, Utc};
use semver::Version;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of a task spawned on behalf of a check.
#[derive(Debug)]
pub enum Completion {
    /// The version request finished.
    VersionFetched {
        /// Check the request belongs to.
        generation: u64,
        /// Parsed release info or the failure.
        result: Result<UpdateInfo>,
    },
    /// The watchdog expired.
    WatchdogExpired {
        /// Check the watchdog guarded.
        generation: u64,
    },
    /// The installer download finished.
    PayloadStaged {
        /// Check the download belongs to.
        generation: u64,
        /// Staged installer or the failure.
        result: Result<StagedInstaller>,
    },
}

/// Point-in-time view of the updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    /// Current state.
    pub state: DownloadState,
    /// Plain-language status.
    pub message: String,
    /// Newest release seen.
    pub info: Option<UpdateInfo>,
    /// When the last version request completed.
    pub last_checked: Option<DateTime<Utc>>,
}

/// Owns the download state and drives one check at a time.
pub struct UpdateStateMachine {
    state: DownloadState,
    info: Option<UpdateInfo>,
    generation: u64,
    watchdog: Option<Watchdog>,
    request_timeout: Duration,
    running_version: Version,
    fetcher: Arc<dyn VersionFetcher>,
    strategy: PlatformStrategy,
    events: UpdaterEventsSender,
    completions: mpsc::UnboundedSender<Completion>,
    last_checked: Option<DateTime<Utc>>,
}

impl UpdateStateMachine {
    /// Create a state machine in `Unknown`.
    ///
    /// The returned receiver must be drained into [`Self::handle_completion`].
    #[must_use]
    pub fn new(
        running_version: Version,
        request_timeout: Duration,
        fetcher: Arc<dyn VersionFetcher>,
        strategy: PlatformStrategy,
        events: UpdaterEventsSender,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completions, rx) = mpsc::unbounded_channel();
        let machine = Self {
            state: DownloadState::Unknown,
            info: None,
            generation: 0,
            watchdog: None,
            request_timeout,
            running_version,
            fetcher,
            strategy,
            events,
            completions,
            last_checked: None,
        };
        (machine, rx)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// Version of the running client.
    #[must_use]
    pub fn running_version(&self) -> &Version {
        &self.running_version
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> &PlatformStrategy {
        &self.strategy
    }

    /// Plain-language status of the current state.
    #[must_use]
    pub fn status_string(&self) -> String {
        self.state.status_string(self.info.as_ref())
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn status(&self) -> UpdateStatus {
        UpdateStatus {
            state: self.state,
            message: self.status_string(),
            info: self.info.clone(),
            last_checked: self.last_checked,
        }
    }

    /// Ask the strategy whether an update from a previous run is pending.
    ///
    /// A pending installer puts the machine straight into `DownloadComplete`.
    pub fn handle_startup(&mut self) -> bool {
        if !self.strategy.handle_startup() {
            return false;
        }
        self.info = self.strategy.pending_update();
        self.set_download_state(DownloadState::DownloadComplete);
        true
    }

    /// Start a check unless one is already in flight.
    ///
    /// Returns whether a new check was started.
    pub fn check_for_update(&mut self) -> bool {
        if self.state.is_in_flight() {
            debug!("Check #{} still in flight, ignoring request", self.generation);
            return false;
        }

        self.generation += 1;
        let generation = self.generation;
        info!("Starting update check #{}", generation);
        self.set_download_state(DownloadState::CheckingServer);

        self.watchdog = Some(Watchdog::arm(
            generation,
            self.request_timeout,
            self.completions.clone(),
            |generation| Completion::WatchdogExpired { generation },
        ));

        let fetch = self.fetcher.fetch();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            let _ = tx.send(Completion::VersionFetched { generation, result });
        });
        true
    }

    /// Start a check if the strategy wants one from the current state.
    pub fn background_check_for_update(&mut self) -> bool {
        if !self.strategy.background_check_for_update(self.state) {
            debug!("Skipping background check in state {}", self.state);
            return false;
        }
        self.check_for_update()
    }

    /// Apply a completion reported by a spawned task.
    pub fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::VersionFetched { generation, result } => {
                if !self.is_current(generation, DownloadState::CheckingServer) {
                    debug!("Discarding late version result for check #{}", generation);
                    return;
                }
                self.disarm_watchdog();
                self.last_checked = Some(Utc::now());
                match result {
                    Ok(info) => self.version_info_arrived(info),
                    Err(Error::Timeout(after)) => {
                        warn!("Update check #{} timed out after {:?}", generation, after);
                        self.set_download_state(DownloadState::DownloadTimedOut);
                    }
                    Err(e) => {
                        warn!("Update check #{} failed: {}", generation, e);
                        self.set_download_state(DownloadState::DownloadFailed);
                    }
                }
            }
            Completion::WatchdogExpired { generation } => {
                if !self.is_current(generation, DownloadState::CheckingServer) {
                    debug!("Ignoring stale watchdog for check #{}", generation);
                    return;
                }
                self.watchdog = None;
                warn!(
                    "Update check #{} timed out after {:?}",
                    generation, self.request_timeout
                );
                self.set_download_state(DownloadState::DownloadTimedOut);
            }
            Completion::PayloadStaged { generation, result } => {
                if !self.is_current(generation, DownloadState::Downloading) {
                    debug!("Discarding late download result for check #{}", generation);
                    return;
                }
                let next = self.strategy.download_finished(result);
                self.set_download_state(next);
            }
        }
    }

    /// Launch the staged update.
    ///
    /// Only valid in `DownloadComplete`. Returns whether an installer was
    /// actually started; a failed launch moves the machine to
    /// `DownloadFailed`.
    pub fn perform_update(&mut self) -> bool {
        if self.state != DownloadState::DownloadComplete {
            debug!("No update ready to install in state {}", self.state);
            return false;
        }

        match self.strategy.perform_update(&self.events) {
            Ok(started) => started,
            Err(e) => {
                warn!("Could not start the update: {}", e);
                self.set_download_state(DownloadState::DownloadFailed);
                false
            }
        }
    }

    /// Stop offering the newest known release.
    pub fn skip_version(&mut self) -> bool {
        let Some(info) = self.info.clone() else {
            return false;
        };
        match self.strategy.skip_version(&info) {
            Ok(skipped) => skipped,
            Err(e) => {
                warn!("Could not skip version {}: {}", info.version(), e);
                false
            }
        }
    }

    fn version_info_arrived(&mut self, info: UpdateInfo) {
        if !info.is_newer_than(&self.running_version) {
            info!(
                "Server offers {}, running {}: up to date",
                info.version(),
                self.running_version
            );
            self.set_download_state(DownloadState::UpToDate);
            return;
        }

        info!("New version {} available (running {})", info.version(), self.running_version);
        let reaction = self.strategy.version_info_arrived(&info, &self.events);
        self.info = Some(info);

        match reaction {
            Reaction::Transition(state) => self.set_download_state(state),
            Reaction::Download(download) => {
                self.set_download_state(DownloadState::Downloading);
                let generation = self.generation;
                let tx = self.completions.clone();
                tokio::spawn(async move {
                    let result = download.await;
                    let _ = tx.send(Completion::PayloadStaged { generation, result });
                });
            }
        }
    }

    fn is_current(&self, generation: u64, expected: DownloadState) -> bool {
        generation == self.generation && self.state == expected
    }

    fn disarm_watchdog(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.disarm();
        }
    }

    fn set_download_state(&mut self, state: DownloadState) {
        debug!("Download state {} -> {}", self.state, state);
        self.state = state;
        if state.is_terminal() {
            self.disarm_watchdog();
        }
        let _ = self.events.send(UpdaterEvent::DownloadStateChanged { state });
    }
}

impl std::fmt::Debug for UpdateStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateStateMachine")
            .field("state", &self.state)
            .field("info", &self.info)
            .field("generation", &self.generation)
            .field("running_version", &self.running_version)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
