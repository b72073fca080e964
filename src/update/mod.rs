//! Update check state machine.
//!
//! This module handles:
//! - Fetching and parsing the release document
//! - Guarding each check with a timeout watchdog
//! - Driving the download state through one check cycle at a time

mod fetch;
mod info;
mod machine;
mod state;
mod watchdog;

pub use fetch::{HttpVersionFetcher, VersionFetcher};
pub use info::{parse_version, UpdateInfo};
pub use machine::{Completion, UpdateStateMachine, UpdateStatus};
pub use state::DownloadState;
pub use watchdog::Watchdog;
