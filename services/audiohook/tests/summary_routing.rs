//! Summary routing: broker channel when a subscriber holds the room,
//! durable topic otherwise.

use assist_broker::{Broker, BrokerMessage, MemoryBroker, data_types};
use audiohook::summary::{TickerDeps, run_summary_ticker};
use bridge_test_utils::{MockConversationAi, RecordingDurablePublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const CONVERSATION: &str = "projects/demo/locations/global/conversations/a42";
const STRIPPED: &str = "projects/demo/conversations/a42";

fn deps(
    ai: Arc<MockConversationAi>,
    broker: Arc<MemoryBroker>,
    durable: Arc<RecordingDurablePublisher>,
) -> TickerDeps {
    TickerDeps {
        ai,
        broker,
        durable,
        conversation_name: CONVERSATION.to_owned(),
        interval: Duration::from_millis(50),
    }
}

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

/// No routing entry: exactly the durable topic, never the broker.
#[tokio::test]
async fn summary_without_subscriber_falls_back_to_durable_topic() {
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    let broker = Arc::new(MemoryBroker::new());
    let durable = Arc::new(RecordingDurablePublisher::new());
    let (stop_tx, stop_rx) = watch::channel(false);

    let ticker = tokio::spawn(run_summary_ticker(
        deps(ai, broker.clone(), durable.clone()),
        stop_rx,
    ));
    wait_for("the first durable summary", || !durable.events().is_empty()).await;
    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), ticker)
        .await
        .expect("ticker did not stop")
        .unwrap();

    let events = durable.events();
    assert_eq!(events[0].summary_count, 1);
    assert_eq!(events[0].conversation_name, CONVERSATION);
    assert_eq!(events[0].genesys_conversation_id, "42");
    assert_eq!(events[0].summary, "the caller discussed an order issue");
    assert!(
        broker.published().is_empty(),
        "no broker publish may happen without a routing entry"
    );
}

/// With a routing entry, the summary goes to the owning hub's channel with
/// the documented envelope.
#[tokio::test]
async fn summary_with_subscriber_publishes_to_the_hub_channel() {
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    let broker = Arc::new(MemoryBroker::new());
    let durable = Arc::new(RecordingDurablePublisher::new());
    broker.set(STRIPPED, "hub-7").await.unwrap();
    let (stop_tx, stop_rx) = watch::channel(false);

    let ticker = tokio::spawn(run_summary_ticker(
        deps(ai, broker.clone(), durable.clone()),
        stop_rx,
    ));
    wait_for("the first broker publish", || !broker.published().is_empty()).await;
    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), ticker)
        .await
        .expect("ticker did not stop")
        .unwrap();

    let published = broker.published();
    let (channel, payload) = &published[0];
    assert_eq!(channel, &format!("hub-7:{STRIPPED}"));

    let envelope: BrokerMessage = serde_json::from_str(payload).unwrap();
    assert_eq!(envelope.data_type, data_types::SUMMARIZATION);
    assert_eq!(envelope.conversation_name, STRIPPED);
    assert_eq!(
        envelope.payload["genesys_conversation_id"],
        serde_json::json!("42")
    );
    // The `data` document carries the full conversation name and the summary.
    let data: serde_json::Value =
        serde_json::from_str(envelope.payload["data"].as_str().unwrap()).unwrap();
    assert_eq!(data["conversationName"], CONVERSATION);
    assert_eq!(data["genesysConversationId"], "42");
    assert_eq!(
        data["payload"]["summary"]["text"],
        "the caller discussed an order issue"
    );
    assert_eq!(data["summaryCount"], 1);

    assert!(
        durable.events().is_empty(),
        "routed summaries must not also hit the durable topic"
    );
}

/// A tick with no summary publishes nowhere but still consumes a count slot.
#[tokio::test]
async fn tick_without_summary_publishes_nothing() {
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    ai.set_summary(None);
    let broker = Arc::new(MemoryBroker::new());
    let durable = Arc::new(RecordingDurablePublisher::new());
    let (stop_tx, stop_rx) = watch::channel(false);

    let ticker = tokio::spawn(run_summary_ticker(
        deps(ai.clone(), broker.clone(), durable.clone()),
        stop_rx,
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Summaries come back once the provider has content; the count keeps
    // increasing across the silent ticks.
    ai.set_summary(Some("caller verified their address"));
    wait_for("a durable summary after the silent ticks", || {
        !durable.events().is_empty()
    })
    .await;
    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), ticker)
        .await
        .expect("ticker did not stop")
        .unwrap();

    assert!(broker.published().is_empty());
    let events = durable.events();
    assert!(
        events[0].summary_count > 1,
        "silent ticks must still advance the summary count"
    );
    assert_eq!(events[0].summary, "caller verified their address");
}
