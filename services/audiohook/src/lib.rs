pub mod audio;
pub mod config;
pub mod dialogflow;
pub mod publisher;
pub mod session;
pub mod summary;
pub mod worker;

pub use config::Config;

use assist_broker::Broker;
use axum::{Router, routing::get};
use dialogflow::ConversationAi;
use publisher::DurablePublisher;
use std::sync::Arc;

/// Shared dependencies for every Audiohook session.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ai: Arc<dyn ConversationAi>,
    pub broker: Arc<dyn Broker>,
    pub durable: Arc<dyn DurablePublisher>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/connect", get(session::ws_audiohook_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
