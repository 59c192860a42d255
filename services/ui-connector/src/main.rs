// ui-connector: per-hub WebSocket server for agent UIs.

use assist_broker::{Broker, RedisBroker};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ui_connector::{Config, HubState, build_router, generate_hub_id, subscriber};

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "ui-connector starting");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let broker: Arc<dyn Broker> =
        match RedisBroker::connect(&config.redis_host, config.redis_port).await {
            Ok(broker) => Arc::new(broker),
            Err(e) => {
                eprintln!("FATAL: failed to connect to redis: {e}");
                std::process::exit(1);
            }
        };

    let hub_id = generate_hub_id();
    info!(hub_id = %hub_id, "hub identifier assigned");
    let state = HubState::new(hub_id, config.jwt_secret.clone(), broker);

    tokio::spawn(subscriber::run_subscriber(state.clone()));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %config.bind_addr, "ui-connector listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("ui-connector shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
