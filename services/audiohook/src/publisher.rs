//! Durable fallback publisher.
//!
//! Summaries with no live subscriber go to a durable topic instead of the
//! broker.  Publishes are fire-and-forget with a blocking wait for the
//! topic's ack; failures are logged by the caller, never retried.

use crate::dialogflow::auth::TokenSource;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payload published to the durable topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEvent {
    pub conversation_name: String,
    pub genesys_conversation_id: String,
    pub summary: String,
    pub summary_count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("publish rejected with status {0}")]
    Status(u16),
    #[error("auth: {0}")]
    Auth(String),
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait DurablePublisher: Send + Sync {
    async fn publish(&self, event: &SummaryEvent) -> Result<(), PublishError>;
}

/// Publishes over the Pub/Sub REST surface with ambient credentials.
pub struct PubSubPublisher {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    topic_path: String,
}

impl PubSubPublisher {
    pub fn new(project: &str, topic: &str, tokens: Arc<TokenSource>) -> Self {
        PubSubPublisher {
            http: reqwest::Client::new(),
            tokens,
            topic_path: format!("projects/{project}/topics/{topic}"),
        }
    }

    pub fn topic_path(&self) -> &str {
        &self.topic_path
    }
}

#[async_trait::async_trait]
impl DurablePublisher for PubSubPublisher {
    async fn publish(&self, event: &SummaryEvent) -> Result<(), PublishError> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| PublishError::Auth(e.to_string()))?;
        let data = base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(event)?);
        let url = format!("https://pubsub.googleapis.com/v1/{}:publish", self.topic_path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "messages": [{ "data": data }] }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PublishError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_event_serializes_with_camel_case_keys() {
        let event = SummaryEvent {
            conversation_name: "projects/p/locations/global/conversations/a1".to_owned(),
            genesys_conversation_id: "1".to_owned(),
            summary: "caller asked about an order".to_owned(),
            summary_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json["conversationName"],
            "projects/p/locations/global/conversations/a1"
        );
        assert_eq!(json["genesysConversationId"], "1");
        assert_eq!(json["summary"], "caller asked about an order");
        assert_eq!(json["summaryCount"], 2);
    }

    #[test]
    fn topic_path_is_fully_qualified() {
        let tokens = Arc::new(TokenSource::from_env());
        let publisher = PubSubPublisher::new("demo", "aa-conversation-event-topic", tokens);
        assert_eq!(
            publisher.topic_path(),
            "projects/demo/topics/aa-conversation-event-topic"
        );
    }
}
