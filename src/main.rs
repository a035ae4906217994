// src/main.rs

//! # marklive entry point
//!
//! Loads configuration, starts the filesystem watch pipeline (watch thread
//! → raw event channel → debouncer task → broadcast hub), and runs the
//! HTTP server until Ctrl-C.

mod config;
mod event;
mod hub;
mod ignore;
mod tree;
mod watcher;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;
use crate::event::RawEvent;
use crate::hub::ReloadHub;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match AppConfig::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing subscriber for logging with environment filter.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // Log to stderr
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default tracing subscriber failed");

    tracing::info!(
        "serving markdown documents from {}",
        config.markdown_dir.display()
    );
    tracing::info!("hot reload enabled; ignoring {:?}", config.ignore);
    tracing::info!("set MARKDOWN_DIR to change the directory, IGNORE_PATTERNS to customize ignores");

    // The hub is built once here and injected everywhere it is needed.
    let hub = Arc::new(ReloadHub::new());

    // Watch thread → raw event channel → debouncer task → hub.
    let (raw_tx, raw_rx) = mpsc::channel::<RawEvent>(100);
    if let Err(e) = watcher::run_watcher(Arc::clone(&config), raw_tx).await {
        // Degraded but alive: documents are still served without reloads.
        tracing::error!("watcher failed to start: {e}");
    }
    let debouncer_hub = Arc::clone(&hub);
    tokio::spawn(async move {
        watcher::run_debouncer(raw_rx, debouncer_hub).await;
    });

    // Shutdown signal channel for graceful shutdown of the server.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(web::start_server(
        Arc::clone(&config),
        Arc::clone(&hub),
        shutdown_rx,
    ));

    tokio::select! {
        result = &mut server => {
            // The server stopping on its own means startup failed, e.g.
            // the listen port could not be bound.
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("web server exited with error: {e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("web server task panicked: {e}");
                    std::process::exit(1);
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Ctrl-C received, initiating shutdown..."),
                Err(e) => tracing::error!("failed to listen for Ctrl-C signal: {e}"),
            }
            if shutdown_tx.send(true).is_err() {
                tracing::error!("failed to send shutdown signal");
            }
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("web server exited with error: {e}"),
                Err(e) => tracing::error!("web server task panicked: {e}"),
            }
        }
    }

    tracing::info!("marklive shut down gracefully.");
    Ok(())
}
