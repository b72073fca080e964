//! Announce-only strategy for systems with their own package manager.

use super::Announcements;
use crate::event::UpdaterEventsSender;
use crate::update::{DownloadState, UpdateInfo};

/// Announces new releases; installation happens through the system.
#[derive(Debug, Default)]
pub struct PassiveNotifier {
    announcements: Announcements,
}

impl PassiveNotifier {
    /// Create a notifier with nothing announced yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn version_info_arrived(&mut self, info: &UpdateInfo, events: &UpdaterEventsSender) -> DownloadState {
        let message = format!(
            "New version {} is available. Please use the system's update tool to install it.",
            info.version_string()
        );
        self.announcements.announce(info, message, events);
        DownloadState::UpdateOnlyAvailableThroughSystem
    }

    /// Announcements are deduplicated, so re-checking after one went out is
    /// harmless and lets a later release be announced too.
    pub(super) fn background_check_for_update(&self, state: DownloadState) -> bool {
        !state.is_in_flight()
    }
}
