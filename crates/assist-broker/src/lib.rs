// assist-broker: shared broker contract for routing entries and event fan-out.
//
// One broker carries two disjoint keyspaces:
// - key/value: `<conversation_name_stripped>` -> `<hub_id>` routing entries
// - pub/sub:   `<hub_id>:<conversation_name_stripped>` event channels
//
// The production implementation is Redis; tests run against the in-process
// implementation, which preserves the same last-writer-wins and
// pattern-subscription semantics.

use serde::{Deserialize, Serialize};

pub mod memory;
pub mod redis_broker;

pub use memory::MemoryBroker;
pub use redis_broker::RedisBroker;

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

/// Event names carried in the envelope `data_type` field.
pub mod data_types {
    /// Periodic summary; hubs broadcast it to every authenticated connection.
    pub const SUMMARIZATION: &str = "conversation-summarization-received";
    /// Suggestion payloads; hubs emit them to the conversation room only.
    pub const AGENT_ASSIST: &str = "human-agent-assistant-event";
}

/// JSON envelope published on broker channels.
///
/// `conversation_name` is always the location-stripped canonical form; any
/// event-specific fields ride in the flattened payload bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerMessage {
    pub data_type: String,
    pub conversation_name: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// The pub/sub channel an event for `conversation` must be published on once
/// the owning hub is known.
pub fn routing_channel(hub_id: &str, conversation_name_stripped: &str) -> String {
    format!("{hub_id}:{conversation_name_stripped}")
}

/// Strip the `/locations/<id>` segment from a conversation resource name.
///
/// `projects/p/locations/global/conversations/a1` ->
/// `projects/p/conversations/a1`.  Names without a location pass through.
pub fn strip_location(conversation_name: &str) -> String {
    if !conversation_name.contains("/locations/") {
        return conversation_name.to_owned();
    }
    let parts: Vec<&str> = conversation_name.split('/').collect();
    if parts.len() < 4 {
        return conversation_name.to_owned();
    }
    format!(
        "{}/{}/{}/{}",
        parts[0],
        parts[1],
        parts[parts.len() - 2],
        parts[parts.len() - 1]
    )
}

// ---------------------------------------------------------------------------
// Broker contract
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("subscription closed")]
    SubscriptionClosed,
}

/// A live pattern subscription.
///
/// Yields `(channel, payload)` pairs until the subscription or the broker
/// goes away.
pub struct Subscription {
    rx: tokio::sync::mpsc::UnboundedReceiver<(String, String)>,
}

impl Subscription {
    pub fn new(rx: tokio::sync::mpsc::UnboundedReceiver<(String, String)>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<(String, String)> {
        self.rx.recv().await
    }
}

/// Key/value plus publish/subscribe, the two broker roles the bridge needs.
///
/// Routing entries use last-writer-wins writes with no compare-and-swap;
/// publish is at-most-once with no delivery feedback.
#[async_trait::async_trait]
pub trait Broker: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), BrokerError>;
    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError>;
    async fn delete(&self, key: &str) -> Result<(), BrokerError>;
    async fn exists(&self, key: &str) -> Result<bool, BrokerError>;
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError>;
    /// Subscribe to every channel matching `pattern` (`<prefix>:*` form).
    async fn subscribe_pattern(&self, pattern: &str) -> Result<Subscription, BrokerError>;
}
