mod actuator;
mod commands;
mod config;
mod controller;
mod error;
mod history;
mod metrics;
mod models;
mod pipeline;
mod sources;
mod utils;
mod watchdog;
mod weather;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;

use commands::UserCommand;
use config::DashboardConfig;
use pipeline::{Dashboard, Event};
use sources::DefaultSources;

/// Forward operator commands from stdin into the pipeline
async fn read_commands(events: UnboundedSender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed, no further operator commands");
                return;
            }
            Err(e) => {
                error!("Failed to read command: {}", e);
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<UserCommand>() {
            Ok(command) => {
                if events.send(Event::Command(command)).is_err() {
                    return;
                }
            }
            Err(e) => warn!("Ignoring command '{}': {}", line.trim(), e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match DashboardConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Starting weather dashboard in {} mode (broker {}:{}, topics under {})",
        config.initial_mode, config.broker_host, config.broker_port, config.topic_prefix
    );

    let dashboard = Dashboard::new(&config, DefaultSources::new(config.clone()));

    tokio::spawn(read_commands(dashboard.sender()));

    // Handle Ctrl+C gracefully: the pipeline tears down its source before exiting
    let shutdown = dashboard.sender();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Program terminated by user. Exiting gracefully.");
                let _ = shutdown.send(Event::Command(UserCommand::Quit));
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    match dashboard.run(config.initial_mode).await {
        Ok(()) => {
            info!("Program completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            Err(e.into())
        }
    }
}
