use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod code;
mod config;
mod flusher;
mod handlers;
mod models;
mod store;

use store::LinkStore;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub config: config::AppConfig,
    pub store: Arc<LinkStore>,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; plain env vars work too
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortly=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting Shortly on {}", config.bind_addr());
    if let Some(base_url) = &config.base_url {
        tracing::info!("Base URL: {}", base_url);
    }

    // Rebuild both tables from the snapshot, then start the background saver
    let (store, persist_requests) = LinkStore::load(&config.data_file).await;
    let store = Arc::new(store);
    let flusher = flusher::spawn(store.clone(), persist_requests, config.autosave_interval);
    tracing::info!(
        "Autosaving {} every {:?}",
        store.path().display(),
        config.autosave_interval
    );

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState {
        config,
        store: store.clone(),
    });
    let app = build_router(state);

    // ── Serve ──────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Final flush so nothing counted since the last save is lost. The flusher
    // is stopped first so no background save can land after this one.
    flusher.shutdown().await;
    match store.persist().await {
        Ok(()) => tracing::info!("Links saved, bye"),
        Err(e) => tracing::error!("Final save failed: {e}"),
    }

    Ok(())
}

// ── Router ─────────────────────────────────────────────────────────────────

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::pages::index))
        .route(
            "/shorten",
            get(handlers::links::shorten_page).post(handlers::links::shorten),
        )
        .route("/my", get(handlers::links::my_links))
        .route("/delete/:code", post(handlers::links::delete_link))
        .route("/stats", get(handlers::pages::stats))
        .route("/top", get(handlers::pages::top))
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        // Short-link redirect; the fixed routes above take priority
        .route("/:code", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
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
    tracing::info!("Shutdown signal received");
}
