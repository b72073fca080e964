//! Periodic background update checks.

use crate::event::{UpdaterEvent, UpdaterEventsChannel, UpdaterEventsSender};
use crate::updater::UpdaterHandle;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Triggers a background check every `interval` and forwards announcements
/// and restart requests to its own listeners.
///
/// Create one per process at startup and [`stop`](Self::stop) it at
/// shutdown. It holds a handle to the updater, not the updater itself, and
/// keeps no update state of its own.
pub struct UpdaterScheduler {
    updater: UpdaterHandle,
    interval: Duration,
    initial_delay: Duration,
    events: UpdaterEventsSender,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl UpdaterScheduler {
    /// Create a stopped scheduler.
    #[must_use]
    pub fn new(updater: UpdaterHandle, interval: Duration, initial_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            updater,
            interval,
            initial_delay,
            events,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Subscribe to forwarded `NewUpdateAvailable` and `RequestRestart`
    /// events.
    #[must_use]
    pub fn subscribe(&self) -> UpdaterEventsChannel {
        self.events.subscribe()
    }

    /// Whether the timer is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Start the timer. Calling it again while running does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.shutdown_tx.send_replace(false);
        info!(
            "Scheduling update checks every {:?}, first in {:?}",
            self.interval, self.initial_delay
        );

        // Subscribe before spawning so nothing emitted after start is missed.
        let updates = self.updater.subscribe();
        self.tasks.push(tokio::spawn(forward_events(
            updates,
            self.events.clone(),
            self.shutdown_tx.subscribe(),
        )));
        self.tasks.push(tokio::spawn(tick(
            self.updater.clone(),
            self.interval,
            self.initial_delay,
            self.shutdown_tx.subscribe(),
        )));
    }

    /// Stop the timer and wait for it to wind down.
    pub async fn stop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        debug!("Update scheduler stopped");
    }
}

impl Drop for UpdaterScheduler {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn tick(
    updater: UpdaterHandle,
    interval: Duration,
    initial_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval_at(Instant::now() + initial_delay, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = timer.tick() => {
                match updater.background_check_for_update().await {
                    Ok(true) => debug!("Background update check started"),
                    Ok(false) => debug!("Background update check skipped"),
                    Err(e) => {
                        warn!("Stopping update scheduler: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

async fn forward_events(
    mut updates: UpdaterEventsChannel,
    events: UpdaterEventsSender,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            received = updates.recv() => match received {
                Ok(event @ (UpdaterEvent::NewUpdateAvailable { .. } | UpdaterEvent::RequestRestart)) => {
                    let _ = events.send(event);
                }
                Ok(UpdaterEvent::DownloadStateChanged { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Update scheduler missed {} updater events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
