//! Entry point for the linkpulse link checking service
//!
//! Wires the configuration, the controller and the HTTP server together and
//! runs the ordered shutdown once a termination signal arrives.

use anyhow::{Context, Result};
use clap::Parser;
use linkpulse::{Config, Controller, HttpProbe, ShutdownOutcome, Store, api, logger};
use std::{path::PathBuf, sync::Arc};
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
    sync::watch,
};

/// Define command line arguments using clap
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", env = "LINKPULSE_CONFIG")]
    config: Option<PathBuf>,
}

/// This function:
/// 1. Parses command line arguments and loads the configuration
/// 2. Starts the controller and restores the previous state
/// 3. Serves the HTTP API until SIGINT or SIGTERM
/// 4. Stops the server, then drains the controller and saves its state
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let _logger = logger::init(&config.log);
    match cli.config.as_deref() {
        Some(path) if path.exists() => tracing::info!("Config loaded from {}", path.display()),
        Some(path) => tracing::warn!("Config file {} not found, using defaults", path.display()),
        None => tracing::info!("No config file given, using defaults"),
    }

    let probe = HttpProbe::new(&config.probe)?;
    let controller = Arc::new(Controller::start(
        &config,
        Arc::new(Store::new()),
        Arc::new(probe),
    ));
    controller.hydrate().await;

    let listener = TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    tracing::info!("listening on {}", config.server.listen);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let app = api::router(controller.clone());
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            // the server ended on its own; still run the controller shutdown
            match result {
                Ok(Ok(())) => tracing::warn!("HTTP server exited"),
                Ok(Err(e)) => tracing::error!("HTTP server failed: {}", e),
                Err(e) => tracing::error!("HTTP server task ended abnormally: {}", e),
            }
        }
        received = shutdown_signal() => {
            match received {
                Ok(name) => tracing::info!("{} received, shutdown initiated...", name),
                Err(e) => tracing::error!("{:#}, shutdown initiated...", e),
            }
            let _ = stop_tx.send(true);
            match tokio::time::timeout(config.shutdown.server_grace, &mut server).await {
                Ok(_) => tracing::info!("HTTP server stopped"),
                Err(_) => {
                    tracing::warn!(
                        "HTTP server did not stop within {:?}, aborting",
                        config.shutdown.server_grace
                    );
                    server.abort();
                }
            }
        }
    }

    controller.begin_shutdown();
    match controller.await_shutdown(config.shutdown.timeout).await {
        ShutdownOutcome::Completed => tracing::info!("shutdown complete"),
        ShutdownOutcome::TimedOut => tracing::warn!("shutdown complete, some workers were aborted"),
    }
    Ok(())
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigint = signal(SignalKind::interrupt()).context("watch SIGINT failed")?;
    let mut sigterm = signal(SignalKind::terminate()).context("watch SIGTERM failed")?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}
