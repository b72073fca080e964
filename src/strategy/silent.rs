//! Download-and-launch strategy.

use super::{Announcements, InstallerLauncher, Reaction};
use crate::error::{Error, Result};
use crate::event::{UpdaterEvent, UpdaterEventsSender};
use crate::settings::{SettingsStore, INSTALL_ATTEMPTED, SEEN_VERSION, TARGET_FILE, TARGET_VERSION};
use crate::update::{parse_version, DownloadState, UpdateInfo};
use futures::FutureExt;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// An installer written to its final location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedInstaller {
    /// Version the installer upgrades to.
    pub version: Version,
    /// Where the installer lives.
    pub path: PathBuf,
}

/// Downloads the installer in the background and launches it on request.
pub struct SilentInstaller {
    settings: Arc<dyn SettingsStore>,
    launcher: Arc<dyn InstallerLauncher>,
    client: reqwest::Client,
    stage_dir: PathBuf,
    running_version: Version,
    staged: Option<StagedInstaller>,
    /// Set when a previous automatic install did not take effect; releases
    /// are then announced instead of downloaded.
    fallback: bool,
    announcements: Announcements,
}

impl std::fmt::Debug for SilentInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilentInstaller")
            .field("stage_dir", &self.stage_dir)
            .field("running_version", &self.running_version)
            .field("staged", &self.staged)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl SilentInstaller {
    /// Create a silent installer staging payloads in `stage_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        launcher: Arc<dyn InstallerLauncher>,
        stage_dir: PathBuf,
        running_version: Version,
        download_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("client-updater/", env!("CARGO_PKG_VERSION")))
            .timeout(download_timeout)
            .build()?;

        Ok(Self {
            settings,
            launcher,
            client,
            stage_dir,
            running_version,
            staged: None,
            fallback: false,
            announcements: Announcements::default(),
        })
    }

    /// The installer currently staged, if any.
    #[must_use]
    pub fn staged(&self) -> Option<&StagedInstaller> {
        self.staged.as_ref()
    }

    pub(super) fn handle_startup(&mut self) -> bool {
        let Some(staged) = self.load_staged() else {
            return false;
        };

        if staged.version <= self.running_version {
            info!("Update to {} was installed, removing staged installer", staged.version);
            self.clear_staged(&staged.path);
            return false;
        }

        if self.settings.get(INSTALL_ATTEMPTED).as_deref() == Some("true") {
            warn!(
                "Installer for {} ran but {} is still running, falling back to notifications",
                staged.version, self.running_version
            );
            self.clear_staged(&staged.path);
            self.fallback = true;
            return false;
        }

        if !staged.path.exists() {
            debug!("Staged installer {} has disappeared", staged.path.display());
            self.clear_staged(&staged.path);
            return false;
        }

        info!("Installer for {} is staged and ready", staged.version);
        self.staged = Some(staged);
        true
    }

    pub(super) fn version_info_arrived(&mut self, info: &UpdateInfo, events: &UpdaterEventsSender) -> Reaction {
        if self.seen_version().is_some_and(|seen| info.version() <= &seen) {
            info!("Version {} was skipped by the user", info.version());
            return Reaction::Transition(DownloadState::UpToDate);
        }

        if self.fallback || info.download_url().is_empty() {
            let mut message = format!("New version {} is available.", info.version_string());
            if !info.web_url().is_empty() {
                message.push_str(&format!(" Please download it from {}.", info.web_url()));
            }
            if self.fallback {
                message.insert_str(0, "The previous update could not be installed automatically. ");
            }
            self.announcements.announce(info, message, events);
            return Reaction::Transition(DownloadState::UpdateOnlyAvailableThroughSystem);
        }

        if let Some(staged) = &self.staged {
            if &staged.version == info.version() && staged.path.exists() {
                debug!("Installer for {} already staged at {}", staged.version, staged.path.display());
                return Reaction::Transition(DownloadState::DownloadComplete);
            }
        }

        let target = match target_path(&self.stage_dir, info.download_url()) {
            Ok(target) => target,
            Err(e) => {
                warn!("Cannot stage installer: {}", e);
                return Reaction::Transition(DownloadState::DownloadFailed);
            }
        };

        info!("Downloading {} to {}", info.download_url(), target.display());
        Reaction::Download(
            download_payload(
                self.client.clone(),
                info.download_url().to_string(),
                target,
                info.version().clone(),
            )
            .boxed(),
        )
    }

    pub(super) fn download_finished(&mut self, result: Result<StagedInstaller>) -> DownloadState {
        let staged = match result {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Installer download failed: {}", e);
                return DownloadState::DownloadFailed;
            }
        };

        if let Err(e) = self.record_staged(&staged) {
            warn!("Could not record staged installer: {}", e);
            remove_file(&staged.path);
            return DownloadState::DownloadFailed;
        }

        info!("Installer for {} staged at {}", staged.version, staged.path.display());
        if let Some(previous) = self.staged.replace(staged) {
            if self.staged.as_ref().is_some_and(|s| s.path != previous.path) {
                remove_file(&previous.path);
            }
        }
        DownloadState::DownloadComplete
    }

    pub(super) fn perform_update(&mut self, events: &UpdaterEventsSender) -> Result<bool> {
        let Some(staged) = self.staged.clone() else {
            return Ok(false);
        };

        if self.settings.get(INSTALL_ATTEMPTED).as_deref() == Some("true") {
            debug!("Installer for {} was already launched", staged.version);
            return Ok(false);
        }

        if !staged.path.exists() {
            self.clear_staged(&staged.path);
            return Err(Error::Install(format!(
                "staged installer {} is missing",
                staged.path.display()
            )));
        }

        self.settings.set(INSTALL_ATTEMPTED, "true")?;
        if let Err(e) = self.launcher.launch(&staged.path) {
            self.clear_staged(&staged.path);
            return Err(e);
        }

        let _ = events.send(UpdaterEvent::RequestRestart);
        Ok(true)
    }

    pub(super) fn skip_version(&self, info: &UpdateInfo) -> Result<()> {
        info!("Skipping version {}", info.version());
        self.settings.set(SEEN_VERSION, &info.version().to_string())
    }

    fn seen_version(&self) -> Option<Version> {
        self.settings
            .get(SEEN_VERSION)
            .and_then(|v| parse_version(&v).ok())
    }

    fn load_staged(&self) -> Option<StagedInstaller> {
        let version = parse_version(&self.settings.get(TARGET_VERSION)?).ok()?;
        let path = PathBuf::from(self.settings.get(TARGET_FILE)?);
        Some(StagedInstaller { version, path })
    }

    fn record_staged(&self, staged: &StagedInstaller) -> Result<()> {
        self.settings.set(TARGET_VERSION, &staged.version.to_string())?;
        self.settings.set(TARGET_FILE, &staged.path.to_string_lossy())?;
        self.settings.remove(INSTALL_ATTEMPTED)
    }

    fn clear_staged(&mut self, path: &Path) {
        remove_file(path);
        for key in [TARGET_VERSION, TARGET_FILE, INSTALL_ATTEMPTED] {
            if let Err(e) = self.settings.remove(key) {
                warn!("Could not clear {}: {}", key, e);
            }
        }
        self.staged = None;
    }
}

/// Final location for the installer named by `url`.
fn target_path(stage_dir: &Path, url: &str) -> Result<PathBuf> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Install(format!("invalid download URL '{url}': {e}")))?;
    let name = parsed
        .path_segments()
        .and_then(Iterator::last)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| Error::Install(format!("download URL '{url}' has no file name")))?;
    Ok(stage_dir.join(name))
}

/// Stream `url` into a temporary file next to `target`, then move it into
/// place. The temporary file is deleted on every failure path.
async fn download_payload(
    client: reqwest::Client,
    url: String,
    target: PathBuf,
    version: Version,
) -> Result<StagedInstaller> {
    let dir = target
        .parent()
        .ok_or_else(|| Error::Install(format!("no parent directory for {}", target.display())))?
        .to_path_buf();
    tokio::fs::create_dir_all(&dir).await?;

    let mut response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "installer download returned status {}",
            response.status()
        )));
    }

    let temp = blocking(move || NamedTempFile::new_in(dir).map_err(Error::from)).await?;
    let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
    let mut written = 0usize;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    debug!("Downloaded {} bytes from {}", written, url);

    let path = blocking(move || {
        temp.persist(&target)
            .map_err(|e| Error::Install(format!("cannot write {}: {}", target.display(), e.error)))?;
        Ok(target)
    })
    .await?;

    Ok(StagedInstaller { version, path })
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Install(format!("staging task failed: {e}")))?
}

fn remove_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}
