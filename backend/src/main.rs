use std::error::Error;

use taskboard_server::{
    app_state::AppState, data_access::data_context::DataContext, map_routes, settings::Settings,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // ── Settings & logging ─────────────────────────────────────
    let settings = Settings::load()?;
    init_tracing(&settings.log_filter);

    // ── Store ──────────────────────────────────────────────────
    let data_context = DataContext::open(&settings.database_path)?;
    let state = AppState::new(data_context);

    // ── Serve ──────────────────────────────────────────────────
    let address = settings.socket_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "server listening");

    axum::serve(listener, map_routes(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── Shutdown ───────────────────────────────────────────────
    tracing::info!(in_flight = state.background.in_flight(), "draining background writes");
    state.background.drain().await;

    match std::sync::Arc::try_unwrap(state) {
        Ok(state) => state.data_context.close(),
        Err(_) => tracing::warn!("application state still shared at shutdown"),
    }
    tracing::info!("server shutdown complete");
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
