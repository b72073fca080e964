//! Starting staged installers.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Starts an OS-level install from a staged installer file.
pub trait InstallerLauncher: Send + Sync {
    /// Launch the installer at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`] if the installer could not be started.
    fn launch(&self, path: &Path) -> Result<()>;
}

/// Runs the installer as a detached child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    args: Vec<String>,
}

impl ProcessLauncher {
    /// Create a launcher passing `args` to every installer.
    #[must_use]
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }
}

impl InstallerLauncher for ProcessLauncher {
    fn launch(&self, path: &Path) -> Result<()> {
        info!("Launching installer {} {:?}", path.display(), self.args);
        Command::new(path)
            .args(&self.args)
            .spawn()
            .map(|_child| ())
            .map_err(|e| Error::Install(format!("failed to launch '{}': {e}", path.display())))
    }
}
