// Framework bootstrap for the hub runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{ConnectionSettings, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{HubSettings, spawn_hub};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

/// Serves the hub on `listener` with settings taken from the environment.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with_settings(listener, config::hub_settings(), config::connection_settings()).await
}

pub async fn run_with_settings(
    listener: tokio::net::TcpListener,
    hub_settings: HubSettings,
    connection: ConnectionSettings,
) -> Result<()> {
    let address = listener.local_addr()?;

    // Spawn the hub actor; it lives as long as the app state holds its handle.
    let hub = spawn_hub(&hub_settings);
    tracing::debug!(
        tick_ms = hub_settings.tick_interval.as_millis(),
        outbound_capacity = connection.outbound_capacity,
        max_message_size = connection.max_message_size,
        "hub configured"
    );

    let app = app(Arc::new(AppState { hub, connection }));
    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::bind_addr(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}
