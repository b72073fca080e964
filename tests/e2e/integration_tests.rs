//! Check cycle tests shared by all strategies.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{states, until_terminal, ScriptedFetcher, TestHarness};
use client_updater::{DownloadState, Error, StrategyKind, UpdaterEvent};
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Only one fetch runs no matter how often a check is requested.
#[tokio::test(start_paused = true)]
async fn test_repeated_checks_issue_one_fetch() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::from_secs(10));
    let updater = harness.start(StrategyKind::Passive, fetcher.clone()).await;
    let handle = updater.handle();
    let mut events = handle.subscribe();

    assert!(handle.check_for_update().await.unwrap());
    for _ in 0..10 {
        assert!(!handle.check_for_update().await.unwrap());
    }
    until_terminal(&mut events).await;

    assert_eq!(fetcher.calls(), 1);
}

/// The watchdog fires first and the late answer is thrown away.
#[tokio::test(start_paused = true)]
async fn test_timeout_is_final() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::from_secs(90));
    let updater = harness.start(StrategyKind::Passive, fetcher).await;
    let handle = updater.handle();
    let mut events = handle.subscribe();

    handle.check_for_update().await.unwrap();
    let seen = until_terminal(&mut events).await;
    assert_eq!(
        states(&seen),
        vec![DownloadState::CheckingServer, DownloadState::DownloadTimedOut]
    );

    // Let the abandoned fetch finish.
    tokio::time::sleep(Duration::from_secs(120)).await;

    let status = handle.status().await.unwrap();
    assert_eq!(status.state, DownloadState::DownloadTimedOut);
    assert_eq!(status.message, "Timed out while checking for updates.");
    assert!(status.info.is_none());
    assert!(events.try_recv().is_err(), "late result must not emit events");
}

/// A version server that never answers times out over real HTTP too.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hung_version_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let harness = TestHarness::new();
    let mut config = harness.config(StrategyKind::Passive);
    config.update_url = format!("{}/update", server.uri());
    config.request_timeout_secs = 1;
    let updater = harness.builder(config).build().await.unwrap();
    let handle = updater.handle();
    let mut events = handle.subscribe();

    for _ in 0..3 {
        assert!(handle.check_for_update().await.unwrap());
        let seen = until_terminal(&mut events).await;
        assert_eq!(
            states(&seen),
            vec![DownloadState::CheckingServer, DownloadState::DownloadTimedOut]
        );
    }
}

/// A timed out check does not block the next one.
#[tokio::test(start_paused = true)]
async fn test_check_after_timeout_starts_fresh_cycle() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::from_secs(90));
    let updater = harness.start(StrategyKind::Passive, fetcher.clone()).await;
    let handle = updater.handle();
    let mut events = handle.subscribe();

    handle.check_for_update().await.unwrap();
    until_terminal(&mut events).await;

    fetcher.set_delay(Duration::from_secs(1));
    assert!(handle.check_for_update().await.unwrap());
    let seen = until_terminal(&mut events).await;
    assert_eq!(
        states(&seen),
        vec![
            DownloadState::CheckingServer,
            DownloadState::UpdateOnlyAvailableThroughSystem
        ]
    );
    assert_eq!(fetcher.calls(), 2);
}

/// Network failures end the check without retrying.
#[tokio::test(start_paused = true)]
async fn test_network_failure() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::failing(Duration::from_secs(1));
    let updater = harness.start(StrategyKind::Passive, fetcher.clone()).await;
    let handle = updater.handle();
    let mut events = handle.subscribe();

    handle.check_for_update().await.unwrap();
    let seen = until_terminal(&mut events).await;
    assert_eq!(states(&seen).last(), Some(&DownloadState::DownloadFailed));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(
        handle.status().await.unwrap().message,
        "Could not check for new updates."
    );
}

/// An equal version is up to date and announces nothing.
#[tokio::test(start_paused = true)]
async fn test_same_version_is_up_to_date() {
    for strategy in [StrategyKind::Passive, StrategyKind::Silent] {
        let harness = TestHarness::new();
        let fetcher = ScriptedFetcher::offering("2.5.0", "https://x/installer.exe", Duration::from_secs(1));
        let updater = harness.start(strategy, fetcher).await;
        let handle = updater.handle();
        let mut events = handle.subscribe();

        handle.check_for_update().await.unwrap();
        let seen = until_terminal(&mut events).await;

        assert_eq!(
            states(&seen),
            vec![DownloadState::CheckingServer, DownloadState::UpToDate]
        );
        assert!(!seen
            .iter()
            .any(|e| matches!(e, UpdaterEvent::NewUpdateAvailable { .. })));
        assert!(!handle.perform_update().await.unwrap());
    }
}

/// An older server version is also up to date.
#[tokio::test(start_paused = true)]
async fn test_older_version_is_up_to_date() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.4.9", "", Duration::from_secs(1));
    let updater = harness.start(StrategyKind::Passive, fetcher).await;
    let handle = updater.handle();
    let mut events = handle.subscribe();

    handle.check_for_update().await.unwrap();
    until_terminal(&mut events).await;
    assert_eq!(handle.status().await.unwrap().state, DownloadState::UpToDate);
}

/// Status reads have no side effects.
#[tokio::test(start_paused = true)]
async fn test_status_is_stable() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::from_secs(1));
    let updater = harness.start(StrategyKind::Passive, fetcher).await;
    let handle = updater.handle();
    let mut events = handle.subscribe();

    handle.check_for_update().await.unwrap();
    until_terminal(&mut events).await;

    let first = handle.status().await.unwrap();
    let second = handle.status().await.unwrap();
    assert_eq!(first, second);
}

/// No strategy exists for the OS-native updater platform.
#[tokio::test]
async fn test_unsupported_platform_is_fatal() {
    let harness = TestHarness::new();
    let result = harness
        .builder(harness.config(StrategyKind::Auto))
        .with_target_os("macos")
        .build()
        .await;
    assert!(matches!(result, Err(Error::UnsupportedPlatform(_))));
}

/// `auto` picks the platform strategy.
#[tokio::test]
async fn test_auto_strategy_selection() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::ZERO);
    let updater = harness
        .builder(harness.config(StrategyKind::Auto))
        .with_target_os("linux")
        .with_fetcher(fetcher)
        .build()
        .await
        .unwrap();
    let handle = updater.handle();
    let mut events = handle.subscribe();

    handle.check_for_update().await.unwrap();
    let seen = until_terminal(&mut events).await;
    assert_eq!(
        states(&seen).last(),
        Some(&DownloadState::UpdateOnlyAvailableThroughSystem)
    );
}

/// Requests after shutdown fail cleanly.
#[tokio::test]
async fn test_requests_after_stop() {
    let harness = TestHarness::new();
    let fetcher = ScriptedFetcher::offering("2.6.0", "", Duration::ZERO);
    let mut updater = harness.start(StrategyKind::Passive, fetcher).await;
    let handle = updater.handle();

    updater.stop().await;
    assert!(matches!(handle.check_for_update().await, Err(Error::Shutdown)));
}
