//! Periodic conversation summarization.
//!
//! One ticker per live conversation.  Each tick requests a summary and
//! routes it: to the broker channel of the hub holding a live subscriber
//! when a routing entry exists, otherwise to the durable topic.  The ticker
//! stops when the orchestrator signals close.

use crate::dialogflow::ConversationAi;
use crate::publisher::{DurablePublisher, SummaryEvent};
use assist_broker::{Broker, BrokerMessage, data_types, routing_channel, strip_location};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct TickerDeps {
    pub ai: Arc<dyn ConversationAi>,
    pub broker: Arc<dyn Broker>,
    pub durable: Arc<dyn DurablePublisher>,
    /// Full conversation resource name (with location).
    pub conversation_name: String,
    pub interval: Duration,
}

/// The platform conversation id embedded in a stripped resource name.
pub fn genesys_conversation_id(conversation_name_stripped: &str) -> String {
    let id = conversation_name_stripped
        .rsplit('/')
        .next()
        .unwrap_or(conversation_name_stripped);
    id.strip_prefix('a').unwrap_or(id).to_owned()
}

pub async fn run_summary_ticker(deps: TickerDeps, mut stop: watch::Receiver<bool>) {
    let stripped = strip_location(&deps.conversation_name);
    let genesys_id = genesys_conversation_id(&stripped);
    info!(
        conversation = %deps.conversation_name,
        interval_secs = deps.interval.as_secs(),
        "summarization ticker started"
    );

    let mut ticker = tokio::time::interval(deps.interval);
    // The first tick of a tokio interval fires immediately; consume it so
    // the first summary lands one full interval into the call.
    ticker.tick().await;

    let mut summary_count: u64 = 0;
    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if *stop.borrow() {
                    break;
                }
                summary_count += 1;
                match deps.ai.suggest_conversation_summary(&deps.conversation_name).await {
                    Ok(Some(summary)) => {
                        route_summary(&deps, &stripped, &genesys_id, &summary.text, summary_count)
                            .await;
                    }
                    Ok(None) => {
                        warn!(conversation = %stripped, count = summary_count, "no summary produced");
                    }
                    Err(e) => {
                        warn!(conversation = %stripped, error = %e, "summary request failed");
                    }
                }
            }
        }
    }
    info!(conversation = %stripped, "summarization ticker stopped");
}

async fn route_summary(
    deps: &TickerDeps,
    stripped: &str,
    genesys_id: &str,
    summary_text: &str,
    summary_count: u64,
) {
    let hub_id = match deps.broker.get(stripped).await {
        Ok(hub_id) => hub_id,
        Err(e) => {
            warn!(error = %e, "routing lookup failed, falling back to durable topic");
            None
        }
    };

    match hub_id {
        Some(hub_id) => {
            // The `data` document carries the full (location-qualified)
            // conversation name; the envelope carries the stripped form the
            // hubs key rooms by.
            let data = serde_json::json!({
                "conversationName": deps.conversation_name,
                "genesysConversationId": genesys_id,
                "payload": { "summary": { "text": summary_text, "textSections": {} } },
                "summaryCount": summary_count,
            });
            let mut payload = serde_json::Map::new();
            payload.insert(
                "genesys_conversation_id".to_owned(),
                serde_json::Value::String(genesys_id.to_owned()),
            );
            payload.insert(
                "data".to_owned(),
                serde_json::Value::String(data.to_string()),
            );
            let envelope = BrokerMessage {
                data_type: data_types::SUMMARIZATION.to_owned(),
                conversation_name: stripped.to_owned(),
                payload,
            };
            let channel = routing_channel(&hub_id, stripped);
            match serde_json::to_string(&envelope) {
                Ok(json) => match deps.broker.publish(&channel, &json).await {
                    Ok(()) => {
                        info!(channel = %channel, count = summary_count, "summary published");
                    }
                    Err(e) => warn!(channel = %channel, error = %e, "summary publish failed"),
                },
                Err(e) => warn!(error = %e, "summary envelope encode failed"),
            }
        }
        None => {
            info!(
                conversation = %stripped,
                count = summary_count,
                "no live subscriber, publishing summary to durable topic"
            );
            let event = SummaryEvent {
                conversation_name: deps.conversation_name.clone(),
                genesys_conversation_id: genesys_id.to_owned(),
                summary: summary_text.to_owned(),
                summary_count,
            };
            if let Err(e) = deps.durable.publish(&event).await {
                warn!(error = %e, "durable publish failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesys_id_strips_the_normalization_prefix() {
        assert_eq!(
            genesys_conversation_id("projects/p/conversations/a9f1c"),
            "9f1c"
        );
    }

    #[test]
    fn genesys_id_passes_through_unprefixed_ids() {
        assert_eq!(
            genesys_conversation_id("projects/p/conversations/custom-1"),
            "custom-1"
        );
    }
}
