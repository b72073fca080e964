//! Test harness that builds updaters against scripted collaborators.
//!
//! The `TestHarness` owns the state directory, the installer launcher and the
//! persisted settings so tests can inspect what the updater left behind.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use client_updater::error::{Error, Result};
use client_updater::settings::{MemorySettingsStore, SettingsStore, TARGET_FILE, TARGET_VERSION};
use client_updater::strategy::InstallerLauncher;
use client_updater::update::VersionFetcher;
use client_updater::{
    DownloadState, RunningUpdater, StrategyKind, UpdateInfo, UpdaterBuilder, UpdaterConfig, UpdaterEvent,
    UpdaterEventsChannel,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Version every test client claims to run.
pub const RUNNING_VERSION: &str = "2.5.0";

/// Fetcher answering from a script instead of the network.
pub struct ScriptedFetcher {
    response: Mutex<Option<UpdateInfo>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    /// Answer every request with `version` after `delay`.
    pub fn offering(version: &str, download_url: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Some(UpdateInfo::new(version, download_url).unwrap())),
            delay: Mutex::new(delay),
            calls: AtomicUsize::new(0),
        })
    }

    /// Fail every request after `delay`.
    pub fn failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(None),
            delay: Mutex::new(delay),
            calls: AtomicUsize::new(0),
        })
    }

    /// Change how long later requests take.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Number of requests issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VersionFetcher for ScriptedFetcher {
    fn fetch(&self) -> BoxFuture<'static, Result<UpdateInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.lock().clone();
        let delay = *self.delay.lock();
        async move {
            tokio::time::sleep(delay).await;
            response.ok_or_else(|| Error::Network("connection refused".to_string()))
        }
        .boxed()
    }
}

/// Launcher that records instead of starting processes.
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<PathBuf>>,
}

impl RecordingLauncher {
    /// Installers launched so far.
    pub fn launched(&self) -> Vec<PathBuf> {
        self.launched.lock().clone()
    }
}

impl InstallerLauncher for RecordingLauncher {
    fn launch(&self, path: &Path) -> Result<()> {
        self.launched.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Collaborators shared between a test and the updater under test.
pub struct TestHarness {
    /// State directory for settings and staged installers.
    pub state_dir: TempDir,
    /// Installer launcher.
    pub launcher: Arc<RecordingLauncher>,
    /// Persisted settings.
    pub settings: Arc<MemorySettingsStore>,
}

impl TestHarness {
    /// Create a harness with an empty state directory.
    pub fn new() -> Self {
        Self {
            state_dir: tempfile::tempdir().unwrap(),
            launcher: Arc::new(RecordingLauncher::default()),
            settings: Arc::new(MemorySettingsStore::new()),
        }
    }

    /// Configuration pointing at the harness state directory.
    pub fn config(&self, strategy: StrategyKind) -> UpdaterConfig {
        UpdaterConfig {
            update_url: "http://127.0.0.1:9/update".to_string(),
            strategy,
            state_dir: self.state_dir.path().to_path_buf(),
            request_timeout_secs: 30,
            initial_delay_secs: 3,
            ..UpdaterConfig::default()
        }
    }

    /// Builder wired to the harness collaborators.
    pub fn builder(&self, config: UpdaterConfig) -> UpdaterBuilder {
        UpdaterBuilder::new(config)
            .with_running_version(Version::parse(RUNNING_VERSION).unwrap())
            .with_launcher(self.launcher.clone())
            .with_settings(self.settings.clone())
    }

    /// Build an updater with the given strategy and fetcher.
    pub async fn start(&self, strategy: StrategyKind, fetcher: Arc<ScriptedFetcher>) -> RunningUpdater {
        self.builder(self.config(strategy))
            .with_fetcher(fetcher)
            .build()
            .await
            .unwrap()
    }

    /// Pretend a previous run staged an installer for `version`.
    pub fn stage_installer(&self, version: &str) -> PathBuf {
        let path = self.state_dir.path().join("installer.exe");
        std::fs::write(&path, b"staged installer").unwrap();
        self.settings.set(TARGET_VERSION, version).unwrap();
        self.settings.set(TARGET_FILE, &path.to_string_lossy()).unwrap();
        path
    }

    /// Files left in the state directory.
    pub fn state_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.state_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Collect events until a terminal download state arrives.
pub async fn until_terminal(events: &mut UpdaterEventsChannel) -> Vec<UpdaterEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(3600), events.recv())
            .await
            .expect("no terminal state within an hour")
            .expect("event channel closed");
        let done = matches!(event, UpdaterEvent::DownloadStateChanged { state } if state.is_terminal());
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// The download states in `events`, in order.
pub fn states(events: &[UpdaterEvent]) -> Vec<DownloadState> {
    events
        .iter()
        .filter_map(|event| match event {
            UpdaterEvent::DownloadStateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Number of announcements in `events`.
pub fn announcements(events: &[UpdaterEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, UpdaterEvent::NewUpdateAvailable { .. }))
        .count()
}
