//! healthwatch - Application Health Check Service
//!
//! Periodically probes configured HTTP applications and sends an e-mail
//! alert whenever any of them is unhealthy.

mod config;
mod logging;
mod monitor;
mod notify;
mod probe;
mod scheduler;
#[cfg(test)]
mod test_support;

use config::{EnvTargetSource, ServiceConfig};
use monitor::Monitor;
use notify::EmailNotifier;
use probe::{Prober, DEFAULT_PROBE_TIMEOUT};
use scheduler::Scheduler;

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = ServiceConfig::load();

    // Initialize logging
    let _log_guard = logging::init(&cfg.log_path)?;

    tracing::info!("Service starting...");
    for warning in &cfg.warnings {
        tracing::warn!("{}", warning);
    }

    let prober = Prober::new(DEFAULT_PROBE_TIMEOUT)?;
    let monitor = Monitor::new(
        Arc::new(EnvTargetSource),
        prober,
        Arc::new(EmailNotifier::new()),
    );
    let scheduler = Scheduler::new(Arc::new(monitor));

    // Interval is read at start; targets and mail settings every cycle.
    scheduler.start(cfg.check_interval()).await;

    tracing::info!("Service started successfully.");

    shutdown_signal().await;

    tracing::info!("Service stopping...");
    scheduler.stop().await;
    tracing::info!("Service stopped.");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
