//! Updater service: wires the state machine, strategy and scheduler together.
//!
//! The state machine lives inside a single task. Every inbound request and
//! every completion from a spawned fetch, download or watchdog is processed
//! by that task in order, so state transitions never overlap.

use crate::config::{StrategyKind, UpdaterConfig};
use crate::error::{Error, Result};
use crate::event::{create_event_channel, UpdaterEventsChannel, UpdaterEventsSender};
use crate::scheduler::UpdaterScheduler;
use crate::settings::{FileSettingsStore, SettingsStore};
use crate::strategy::{
    resolve_kind, InstallerLauncher, PassiveNotifier, PlatformStrategy, ProcessLauncher, SilentInstaller,
};
use crate::update::{parse_version, Completion, HttpVersionFetcher, UpdateStateMachine, UpdateStatus, VersionFetcher};
use semver::Version;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Requests served by the updater task.
#[derive(Debug)]
enum Command {
    CheckForUpdate(oneshot::Sender<bool>),
    BackgroundCheck(oneshot::Sender<bool>),
    PerformUpdate(oneshot::Sender<bool>),
    SkipVersion(oneshot::Sender<bool>),
    Status(oneshot::Sender<UpdateStatus>),
}

/// Cloneable handle to a running updater.
#[derive(Debug, Clone)]
pub struct UpdaterHandle {
    commands: mpsc::Sender<Command>,
    events: UpdaterEventsSender,
}

impl UpdaterHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await.map_err(|_| Error::Shutdown)?;
        rx.await.map_err(|_| Error::Shutdown)
    }

    /// Start a check now. Returns `false` if one is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the updater has stopped.
    pub async fn check_for_update(&self) -> Result<bool> {
        self.request(Command::CheckForUpdate).await
    }

    /// Start a check if the strategy wants one from the current state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the updater has stopped.
    pub async fn background_check_for_update(&self) -> Result<bool> {
        self.request(Command::BackgroundCheck).await
    }

    /// Launch the staged update. Returns whether an installer was started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the updater has stopped.
    pub async fn perform_update(&self) -> Result<bool> {
        self.request(Command::PerformUpdate).await
    }

    /// Stop offering the newest known release.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the updater has stopped.
    pub async fn skip_version(&self) -> Result<bool> {
        self.request(Command::SkipVersion).await
    }

    /// Current status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the updater has stopped.
    pub async fn status(&self) -> Result<UpdateStatus> {
        self.request(Command::Status).await
    }

    /// Subscribe to updater events.
    #[must_use]
    pub fn subscribe(&self) -> UpdaterEventsChannel {
        self.events.subscribe()
    }
}

/// Builder for constructing an updater.
pub struct UpdaterBuilder {
    config: UpdaterConfig,
    fetcher: Option<Arc<dyn VersionFetcher>>,
    launcher: Option<Arc<dyn InstallerLauncher>>,
    settings: Option<Arc<dyn SettingsStore>>,
    running_version: Option<Version>,
    os: &'static str,
}

impl UpdaterBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: UpdaterConfig) -> Self {
        Self {
            config,
            fetcher: None,
            launcher: None,
            settings: None,
            running_version: None,
            os: std::env::consts::OS,
        }
    }

    /// Use `fetcher` instead of HTTP.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn VersionFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use `launcher` to start installers.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn InstallerLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Persist updater state in `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Override the running client version.
    #[must_use]
    pub fn with_running_version(mut self, version: Version) -> Self {
        self.running_version = Some(version);
        self
    }

    /// Resolve `strategy = "auto"` as if running on `os`.
    #[must_use]
    pub fn with_target_os(mut self, os: &'static str) -> Self {
        self.os = os;
        self
    }

    /// Build and start the updater.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no strategy exists
    /// for this platform.
    pub async fn build(self) -> Result<RunningUpdater> {
        self.config.validate()?;
        let kind = resolve_kind(self.config.strategy, self.os)?;
        debug!("Resolved {:?} strategy for {}", kind, self.os);

        let running_version = match (self.running_version, &self.config.client_version) {
            (Some(version), _) => version,
            (None, Some(raw)) => parse_version(raw)
                .map_err(|e| Error::Config(format!("invalid client_version: {e}")))?,
            (None, None) => Version::parse(env!("CARGO_PKG_VERSION"))
                .unwrap_or_else(|_| Version::new(0, 0, 0)),
        };

        let fetcher: Arc<dyn VersionFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpVersionFetcher::new(
                self.config.update_url.clone(),
                running_version.clone(),
                self.config.request_timeout(),
            )?),
        };

        let strategy = match kind {
            StrategyKind::Silent => {
                std::fs::create_dir_all(&self.config.state_dir)?;
                let settings: Arc<dyn SettingsStore> = match self.settings {
                    Some(settings) => settings,
                    None => Arc::new(FileSettingsStore::open(self.config.settings_path())?),
                };
                let launcher: Arc<dyn InstallerLauncher> = match self.launcher {
                    Some(launcher) => launcher,
                    None => Arc::new(ProcessLauncher::new(self.config.installer_args.clone())),
                };
                PlatformStrategy::SilentInstaller(SilentInstaller::new(
                    settings,
                    launcher,
                    self.config.state_dir.clone(),
                    running_version.clone(),
                    self.config.download_timeout(),
                )?)
            }
            StrategyKind::Passive => PlatformStrategy::PassiveNotifier(PassiveNotifier::new()),
            StrategyKind::Auto => {
                return Err(Error::UnsupportedPlatform("strategy was not resolved".to_string()))
            }
        };

        let (events_tx, _) = create_event_channel();
        let (mut machine, completions) = UpdateStateMachine::new(
            running_version,
            self.config.request_timeout(),
            fetcher,
            strategy,
            events_tx.clone(),
        );
        let pending_on_startup = machine.handle_startup();
        info!(
            "Updater ready: {:?} strategy, running {}, state {}",
            machine.strategy().kind(),
            machine.running_version(),
            machine.state()
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let task = tokio::spawn(run_state_machine(machine, commands_rx, completions, shutdown_rx.clone()));

        let handle = UpdaterHandle {
            commands: commands_tx,
            events: events_tx,
        };

        Ok(RunningUpdater {
            config: self.config,
            handle,
            shutdown_tx,
            shutdown_rx,
            scheduler: None,
            task: Some(task),
            pending_on_startup,
        })
    }
}

/// A running updater.
pub struct RunningUpdater {
    config: UpdaterConfig,
    handle: UpdaterHandle,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    scheduler: Option<UpdaterScheduler>,
    task: Option<JoinHandle<()>>,
    pending_on_startup: bool,
}

impl RunningUpdater {
    /// Handle for issuing requests.
    #[must_use]
    pub fn handle(&self) -> UpdaterHandle {
        self.handle.clone()
    }

    /// Whether an installer from a previous run is waiting.
    #[must_use]
    pub fn pending_update_on_startup(&self) -> bool {
        self.pending_on_startup
    }

    /// Start periodic background checks, if enabled.
    ///
    /// Returns the scheduler's event receiver.
    pub fn start_scheduler(&mut self) -> Option<UpdaterEventsChannel> {
        if !self.config.enabled {
            info!("Background update checks are disabled");
            return None;
        }
        let scheduler = self.scheduler.get_or_insert_with(|| {
            UpdaterScheduler::new(
                self.handle.clone(),
                self.config.check_interval(),
                self.config.initial_delay(),
            )
        });
        scheduler.start();
        Some(scheduler.subscribe())
    }

    /// Run until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the updater encounters a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting updater");
        self.start_scheduler();

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    break;
                }
            }
        }

        self.stop().await;
        Ok(())
    }

    /// Request the updater to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the scheduler and the state machine task.
    pub async fn stop(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Updater shutdown complete");
    }
}

async fn run_state_machine(
    mut machine: UpdateStateMachine,
    mut commands: mpsc::Receiver<Command>,
    mut completions: mpsc::UnboundedReceiver<Completion>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            Some(completion) = completions.recv() => machine.handle_completion(completion),
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                match command {
                    Command::CheckForUpdate(reply) => {
                        let _ = reply.send(machine.check_for_update());
                    }
                    Command::BackgroundCheck(reply) => {
                        let _ = reply.send(machine.background_check_for_update());
                    }
                    Command::PerformUpdate(reply) => {
                        let _ = reply.send(machine.perform_update());
                    }
                    Command::SkipVersion(reply) => {
                        let _ = reply.send(machine.skip_version());
                    }
                    Command::Status(reply) => {
                        let _ = reply.send(machine.status());
                    }
                }
            }
        }
    }
    debug!("Updater task stopped in state {}", machine.state());
}
