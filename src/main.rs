//! breaker-guard sidecar.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ loader ──▶ ServiceConfig ──▶ CircuitBreakerManager
//!        │                          │                 │        │
//!        ▼                          ▼                 ▼        ▼
//!     watcher ──reload──▶ apply_circuits        health sweep  per-circuit
//!                                                            probe timers
//!
//!   breaker-cli ──HTTP──▶ admin API (bearer auth) ──▶ manager
//!   Prometheus  ──HTTP──▶ metrics exporter
//! ```

use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use breaker_guard::admin::{run_admin_server, AdminState};
use breaker_guard::config::watcher::ConfigWatcher;
use breaker_guard::config::{load_config, ServiceConfig};
use breaker_guard::lifecycle::signals::wait_for_shutdown;
use breaker_guard::lifecycle::startup::{apply_circuits, build_manager};
use breaker_guard::lifecycle::Shutdown;
use breaker_guard::observability::{logging, metrics};

const CONFIG_ENV: &str = "BREAKER_GUARD_CONFIG";

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    let config = match &path {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?path, "breaker-guard starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let manager = build_manager(&config);

    if config.health.sweep_enabled {
        manager.start_health_sweep(
            Duration::from_millis(config.health.sweep_interval_ms),
            shutdown.subscribe(),
        );
    }

    let shared = Arc::new(ArcSwap::from_pointee(config));

    let _watcher = match &path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let manager = manager.clone();
            let shared = shared.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(new_config) = updates.recv() => {
                            let created = apply_circuits(&manager, &new_config.circuits);
                            tracing::info!(
                                circuits = new_config.circuits.len(),
                                created,
                                "Configuration reloaded"
                            );
                            shared.store(Arc::new(new_config));
                        }
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    let admin = shared.load().admin.clone();
    let server = if admin.enabled {
        let listener = TcpListener::bind(&admin.bind_address).await?;
        let state = AdminState::new(manager.clone(), shared.clone());
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            run_admin_server(listener, state, &shutdown).await
        }))
    } else {
        None
    };

    wait_for_shutdown().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }

    manager.cleanup();
    tracing::info!("Shutdown complete");
    Ok(())
}
