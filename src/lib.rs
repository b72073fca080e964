//! # client-updater
//!
//! Update-check and rollout state machine for desktop clients.
//!
//! The updater periodically asks a release endpoint whether a newer build
//! exists, tracks each check through a small set of download states, bounds
//! every request with a watchdog and hands newly found releases to a
//! platform strategy:
//!
//! - **Silent installer**: download the installer, stage it and launch it on
//!   request, asking the application to restart
//! - **Passive notifier**: announce the release once and leave installation
//!   to the system package manager
//!
//! ## Example
//!
//! ```rust,ignore
//! use client_updater::{UpdaterBuilder, UpdaterConfig};
//!
//! let mut updater = UpdaterBuilder::new(UpdaterConfig::default()).build().await?;
//! let handle = updater.handle();
//! handle.check_for_update().await?;
//! println!("{}", handle.status().await?.message);
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod settings;
pub mod strategy;
pub mod update;
pub mod updater;

pub use config::{StrategyKind, UpdaterConfig};
pub use error::{Error, Result};
pub use event::{UpdaterEvent, UpdaterEventsChannel};
pub use scheduler::UpdaterScheduler;
pub use update::{DownloadState, UpdateInfo, UpdateStatus};
pub use updater::{RunningUpdater, UpdaterBuilder, UpdaterHandle};
