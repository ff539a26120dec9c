// AquaAnalyzer server
// Replays tracker output through the analysis loop and serves the aggregate

use anyhow::Context;
use aqua_eye::{RuntimeSettings, SnapshotStore};
use aqua_server::http::{build_app, ApiState};
use aqua_server::startup::{announce_startup, build_notifier, init_tracing, load_config, start_analysis, Cli};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging)?;

    info!("Starting AquaAnalyzer v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(SnapshotStore::new());
    let settings = Arc::new(RuntimeSettings::from_config(&config.alerts));
    let notifier = build_notifier(&config);

    announce_startup(notifier.as_ref(), &settings, &config).await;

    let (control, analysis) = start_analysis(&config, store.clone(), settings.clone(), notifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = ApiState {
        store,
        settings,
        control: control.clone(),
        stream_poll: config.server.stream_poll_interval(),
        shutdown: shutdown_rx,
    };
    let app = build_app(state, &config.server);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            // Ends open event streams
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutting down AquaAnalyzer...");
    control.stop();
    match tokio::time::timeout(Duration::from_secs(5), analysis).await {
        Ok(Ok(outcome)) => info!("Analysis ended: {:?}", outcome),
        Ok(Err(e)) => error!("Analysis task panicked: {}", e),
        Err(_) => warn!("Analysis did not stop within 5s"),
    }

    info!("AquaAnalyzer stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
