//! Scheduler tests: periodic background checks and event forwarding.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{ScriptedFetcher, TestHarness};
use client_updater::{StrategyKind, UpdaterEvent, UpdaterScheduler};
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

/// The first tick announces; later ticks re-check without repeating it.
#[tokio::test(start_paused = true)]
async fn test_periodic_checks_forward_one_announcement() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::from_secs(1));
    let mut updater = harness.start(StrategyKind::Passive, fetcher.clone()).await;
    let mut announcements = updater.start_scheduler().unwrap();

    let first = tokio::time::timeout(HOUR, announcements.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, UpdaterEvent::NewUpdateAvailable { ref title, .. } if title == "2.6.0"));
    assert_eq!(fetcher.calls(), 1);

    // Two more ticks at the default ten hour interval.
    tokio::time::sleep(21 * HOUR).await;
    assert_eq!(fetcher.calls(), 3);
    assert!(announcements.try_recv().is_err());

    updater.stop().await;
}

/// Failed checks are retried on the next tick, not sooner.
#[tokio::test(start_paused = true)]
async fn test_failed_check_retried_on_next_tick() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::failing(Duration::from_secs(1));
    let mut updater = harness.start(StrategyKind::Passive, fetcher.clone()).await;
    updater.start_scheduler().unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fetcher.calls(), 1);

    tokio::time::sleep(9 * HOUR).await;
    assert_eq!(fetcher.calls(), 1);

    tokio::time::sleep(HOUR).await;
    assert_eq!(fetcher.calls(), 2);

    updater.stop().await;
}

/// Disabled background checks never start a scheduler.
#[tokio::test(start_paused = true)]
async fn test_disabled_checks() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::ZERO);
    let mut config = harness.config(StrategyKind::Passive);
    config.enabled = false;
    let mut updater = harness
        .builder(config)
        .with_fetcher(fetcher.clone())
        .build()
        .await
        .unwrap();

    assert!(updater.start_scheduler().is_none());
    tokio::time::sleep(24 * HOUR).await;
    assert_eq!(fetcher.calls(), 0);
}

/// Restart requests reach scheduler listeners unchanged.
#[tokio::test(start_paused = true)]
async fn test_restart_request_forwarded() {
    let harness = TestHarness::new();
    harness.stage_installer("2.6.0");
    let fetcher = ScriptedFetcher::offering("2.6.0", "https://x/installer.exe", Duration::ZERO);
    let updater = harness.start(StrategyKind::Silent, fetcher).await;
    let handle = updater.handle();

    let mut scheduler = UpdaterScheduler::new(handle.clone(), 10 * HOUR, HOUR);
    let mut forwarded = scheduler.subscribe();
    scheduler.start();
    assert!(scheduler.is_running());

    assert!(handle.perform_update().await.unwrap());
    let event = tokio::time::timeout(Duration::from_secs(5), forwarded.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, UpdaterEvent::RequestRestart);

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}
