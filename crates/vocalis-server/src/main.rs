//! Vocalis TTS Server - HTTP API for chunked speech synthesis

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod state;

use state::AppState;
use vocalis_core::{InferenceAdapter, PythonBridge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vocalis_server=debug,vocalis_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vocalis TTS Server");

    let app_config = config::load_config()?;
    config::print_config(&app_config);

    // The model loads in the background; /health reports progress meanwhile
    let bridge = Arc::new(PythonBridge::from_config(&app_config.engine));
    let loader = Arc::clone(&bridge);
    let voice_sample = app_config.engine.voice_sample_path.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = loader.initialize(&voice_sample) {
            error!("Model initialization failed: {}", e);
        }
    });

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let adapter: Arc<dyn InferenceAdapter> = bridge;
    let state = AppState::new(adapter, app_config);

    let app = api::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(state));

    info!("Server ready. Press Ctrl+C to stop.");
    server.await?;

    Ok(())
}

/// Wait for a shutdown signal and report what was in flight
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }

    if state.status().snapshot().is_processing() {
        info!("Shutting down with a request still in progress");
    }
    info!(
        "Handled {} requests ({} memory cleanups)",
        state.synthesizer.request_count(),
        state.synthesizer.cleanup_count()
    );
}
