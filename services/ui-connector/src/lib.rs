pub mod auth;
pub mod config;
pub mod hub;
pub mod protocol;
pub mod subscriber;

pub use config::Config;
pub use hub::{HubState, generate_hub_id};

use axum::{Router, routing::get};

pub fn build_router(state: HubState) -> Router {
    Router::new()
        .route("/ws", get(hub::ws_ui_handler))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn status() -> &'static str {
    "Hello, cross-origin-world!"
}

async fn healthz() -> &'static str {
    "ok"
}
