use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use neurotrack_lib::serial::SystemPorts;
use neurotrack_lib::{LinkManager, LinkSettings};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => LinkSettings::load(&path)
            .with_context(|| format!("Loading settings from {}", path.display()))?,
        None => LinkSettings::default(),
    };

    match SystemPorts::available_ports() {
        Ok(ports) => {
            for port in ports {
                log::info!("Found serial port {} ({})", port.port_name, port.product.as_deref().unwrap_or("unknown"));
            }
        }
        Err(e) => log::warn!("Could not enumerate serial ports: {}", e),
    }
    log::info!(
        "Scanning {:?} at {} baud, logging to {}",
        settings.candidate_ports,
        settings.baud_rate,
        settings.log_path.display()
    );

    let manager = LinkManager::new(settings, Arc::new(SystemPorts)).context("Invalid link settings")?;
    let handle = manager.spawn();
    let mut events = handle.subscribe_events();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = events.recv() => match received {
                Ok(processed) => {
                    let event = &processed.event;
                    log::info!(
                        "{} | {} ms | count {} | {} | {}",
                        event.action_label,
                        event.interval_ms,
                        event.session_count,
                        processed.category.feedback(),
                        processed.history.joined()
                    );
                }
                Err(RecvError::Lagged(missed)) => log::warn!("Dropped {} events", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    log::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}
