//! Broker-to-room bridge.
//!
//! The hub subscribes to its own channel space (`<hub_id>:*`) and turns
//! broker messages into WebSocket emits: summaries broadcast hub-wide (the
//! subscribing UI may not yet know the conversation name and so cannot have
//! joined the room), everything else goes to the conversation room.

use crate::hub::HubState;
use assist_broker::{Broker, BrokerMessage, data_types};
use tracing::{debug, error, info, warn};

pub async fn run_subscriber(state: HubState) {
    let pattern = format!("{}:*", state.hub_id);
    let mut subscription = match state.broker.subscribe_pattern(&pattern).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(pattern = %pattern, error = %e, "broker subscription failed");
            return;
        }
    };
    info!(pattern = %pattern, "hub subscribed to broker channels");

    while let Some((channel, payload)) = subscription.recv().await {
        let envelope: BrokerMessage = match serde_json::from_str(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(channel = %channel, error = %e, "undecodable broker message dropped");
                continue;
            }
        };
        debug!(
            channel = %channel,
            data_type = %envelope.data_type,
            conversation = %envelope.conversation_name,
            "broker event received"
        );
        if envelope.data_type == data_types::SUMMARIZATION {
            state.broadcast(&payload).await;
        } else {
            state.emit_to_room(&envelope.conversation_name, &payload).await;
        }
    }
    warn!(pattern = %pattern, "broker subscription ended");
}
