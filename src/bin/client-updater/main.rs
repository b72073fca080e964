//! client-updater CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use client_updater::{DownloadState, RunningUpdater, UpdaterBuilder, UpdaterEvent};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("client-updater v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.to_config()?;
    let mut updater = UpdaterBuilder::new(config).build().await?;

    if updater.pending_update_on_startup() {
        info!("An installer from a previous run is ready");
    }

    if cli.once {
        check_once(&mut updater, cli.install).await?;
    } else {
        if let Some(mut announcements) = updater.start_scheduler() {
            tokio::spawn(async move {
                while let Ok(event) = announcements.recv().await {
                    match event {
                        UpdaterEvent::NewUpdateAvailable { title, message } => {
                            println!("{title}: {message}");
                        }
                        UpdaterEvent::RequestRestart => println!("Restart requested to finish the update"),
                        UpdaterEvent::DownloadStateChanged { .. } => {}
                    }
                }
            });
        }
        updater.run().await?;
    }

    info!("Goodbye!");
    Ok(())
}

async fn check_once(updater: &mut RunningUpdater, install: bool) -> color_eyre::Result<()> {
    let handle = updater.handle();
    let mut events = handle.subscribe();

    if handle.check_for_update().await? {
        while let Ok(event) = events.recv().await {
            match event {
                UpdaterEvent::DownloadStateChanged { state } if state.is_terminal() => break,
                UpdaterEvent::NewUpdateAvailable { title, message } => println!("{title}: {message}"),
                _ => {}
            }
        }
    }

    let status = handle.status().await?;
    println!("{}", status.message);
    if let Some(notes) = status.info.as_ref().map(|info| info.notes()).filter(|n| !n.is_empty()) {
        println!("\n{notes}");
    }

    if install && status.state == DownloadState::DownloadComplete {
        if handle.perform_update().await? {
            println!("Installer launched; restart the application to finish the update.");
        } else {
            println!("The installer could not be launched.");
        }
    }

    updater.stop().await;
    Ok(())
}
