use anyhow::{Context, Result};
use axum::serve;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use swarmtrack::core::config::Config;
use swarmtrack::core::routes::build_router;
use swarmtrack::core::state::AppState;
use swarmtrack::core::tracing_init;
use swarmtrack::stores::StoreFactory;
use swarmtrack::tasks;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::from_file(&config_path).context(format!(
        "Failed to load configuration from '{}'. \
        Copy config.example.toml to config.toml and adjust the values.",
        config_path.display()
    ))?;

    tracing_init::init_tracing(&config.logging);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.num_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<()> {
    info!(
        bind = %config.server.bind,
        announce_interval = ?config.tracker.announce_interval,
        reaper_interval = ?config.tracker.reaper_interval,
        batch_update_interval = ?config.tracker.batch_update_interval,
        max_peers = config.tracker.max_peers,
        public = config.tracker.public,
        "Tracker starting"
    );

    let stores = StoreFactory::with_defaults()
        .build(&config.store)
        .context("Failed to initialize stores")?;

    let state = Arc::new(AppState::new(config, stores));

    // Background workers share a shutdown watch so the final batch flush
    // runs before stores close
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = tokio::spawn(tasks::reaper::run(Arc::clone(&state), shutdown_rx.clone()));
    let batch = tokio::spawn(tasks::batch::run(Arc::clone(&state), shutdown_rx));

    let app = build_router(Arc::clone(&state)).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            )
            .layer(TimeoutLayer::new(state.config.server.request_timeout)),
    );

    let listener = TcpListener::bind(state.config.server.bind)
        .await
        .context(format!(
            "Failed to bind listener to {}",
            state.config.server.bind
        ))?;

    info!(address = %state.config.server.bind, "Listener bound, serving announces");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Stopping background tasks");
    let _ = shutdown_tx.send(true);

    if let Err(e) = reaper.await {
        error!(error = %e, "Reaper task failed");
    }
    if let Err(e) = batch.await {
        error!(error = %e, "Batch updater task failed");
    }

    state.stores.close();

    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => info!("Received Ctrl+C"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
