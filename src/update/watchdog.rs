//! Single-shot timeout guard for one update check.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Single-shot timer that reports `generation` when it expires.
///
/// Dropping or disarming the watchdog cancels the timer, so it can never fire
/// for a check that has already reached a terminal state.
#[derive(Debug)]
pub struct Watchdog {
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Arm a watchdog that calls back through `tx` after `timeout`.
    pub fn arm<T, F>(generation: u64, timeout: Duration, tx: mpsc::UnboundedSender<T>, on_fire: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce(u64) -> T + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            debug!("Watchdog for check #{} expired after {:?}", generation, timeout);
            let _ = tx.send(on_fire(generation));
        });
        Self { handle }
    }

    /// Cancel the timer.
    pub fn disarm(self) {
        drop(self);
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
