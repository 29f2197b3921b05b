use std::sync::Arc;

use eventsync_core::events::NoticeBus;
use eventsync_core::store::ReconciliationStore;
use eventsync_stream::WsConnector;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use eventsync_app::rest::{MemoryTokenStore, RestClient, TokenStore};
use eventsync_app::view::{EventsView, PushForwarder};
use eventsync_app::{config, middleware, routes, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience)
    let _ = dotenvy::dotenv();

    let config = config::AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    tracing::info!(api = %config.api_base_url, ws = %config.ws_url, "Starting eventsync client");

    let tokens = Arc::new(MemoryTokenStore::new(config.auth_token.clone()));
    let rest = RestClient::new(config.api_base_url.clone(), tokens.clone());

    let session = if tokens.token().is_some() {
        match rest.profile().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(err = %e, "profile lookup failed, using configured user");
                config.session()
            }
        }
    } else {
        config.session()
    };
    tracing::info!(user = %session.email, admin = session.is_admin(), "session ready");

    let store = ReconciliationStore::with_highlight_duration(
        NoticeBus::new(config.notice_bus_capacity),
        config.highlight(),
    );
    let (forwarder, pushes) = PushForwarder::channel();
    let stream = eventsync_stream::connect(
        config.ws_url.clone(),
        config.stream_config(),
        WsConnector,
        forwarder,
    );
    tracing::info!(subscription = %stream.id(), url = stream.url(), "push stream opened");

    let (view, handle) = EventsView::new(store, stream, pushes, rest);
    let shutdown = CancellationToken::new();
    let view_task = tokio::spawn(view.run(shutdown.clone()));

    let state = state::AppState::new(config.clone(), session, handle);
    let app = routes::build_router(state)
        .layer(middleware::request_tracing::trace_layer())
        .layer(middleware::cors::cors_layer());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    view_task.await?;
    tracing::info!("Shut down gracefully");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(err = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(err = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("Received Ctrl+C, shutting down..."); }
        _ = terminate => { tracing::info!("Received SIGTERM, shutting down..."); }
    }
}
