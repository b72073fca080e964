//! Updater event system.

use crate::update::DownloadState;
use tokio::sync::broadcast;

/// Events emitted by the updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdaterEvent {
    /// The download state changed.
    DownloadStateChanged {
        /// The new state.
        state: DownloadState,
    },

    /// A new version should be announced to the user.
    NewUpdateAvailable {
        /// Announcement title.
        title: String,
        /// Announcement body.
        message: String,
    },

    /// An installer has been launched and the application should restart.
    RequestRestart,
}

/// Channel for receiving updater events.
pub type UpdaterEventsChannel = broadcast::Receiver<UpdaterEvent>;

/// Sender for updater events.
pub type UpdaterEventsSender = broadcast::Sender<UpdaterEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (UpdaterEventsSender, UpdaterEventsChannel) {
    broadcast::channel(256)
}
