//! End-to-end tests for client-updater.
//!
//! Each test builds a complete updater (state machine task, strategy and,
//! where relevant, scheduler) against scripted or mocked collaborators:
//! - **Check cycle**: re-entrancy, timeouts, failures
//! - **Passive notifier**: one announcement per version
//! - **Silent installer**: download, stage, launch
//! - **Scheduler**: periodic checks and event forwarding
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test e2e
//! ```

mod harness;
mod integration_tests;
mod scheduler;
