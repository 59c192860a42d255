// audiohook: intercepts two-channel call audio from the telephony platform
// and drives the conversational-AI backend.

use assist_broker::{Broker, RedisBroker};
use audiohook::dialogflow::auth::TokenSource;
use audiohook::dialogflow::{ConversationAi, DialogflowClient};
use audiohook::publisher::{DurablePublisher, PubSubPublisher};
use audiohook::{AppState, Config, build_router};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "audiohook service starting");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };
    info!(
        profile = %config.conversation_profile_name,
        location = %config.location_id,
        "config loaded"
    );

    let broker: Arc<dyn Broker> =
        match RedisBroker::connect(&config.redis_host, config.redis_port).await {
            Ok(broker) => Arc::new(broker),
            Err(e) => {
                eprintln!("FATAL: failed to connect to redis: {e}");
                std::process::exit(1);
            }
        };

    let tokens = Arc::new(TokenSource::from_env());
    let ai: Arc<dyn ConversationAi> =
        match DialogflowClient::new(&config.project_id, &config.location_id, tokens.clone()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                eprintln!("FATAL: failed to build dialogflow client: {e}");
                std::process::exit(1);
            }
        };
    let durable: Arc<dyn DurablePublisher> = Arc::new(PubSubPublisher::new(
        &config.project_id,
        &config.conversation_event_topic,
        tokens,
    ));

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        ai,
        broker,
        durable,
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "audiohook service listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("audiohook service shut down gracefully");
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
