//! Summary fallback: with no UI subscriber anywhere, summaries go to the
//! durable topic and the broker stays silent.

use assist_broker::MemoryBroker;
use audiohook::{AppState, Config, build_router};
use audiohook_protocol::MessageType;
use bridge_test_utils::{AudiohookClient, MockConversationAi, RecordingDurablePublisher};
use std::sync::Arc;
use std::time::Duration;

const API_KEY: &str = "e2e-key";

fn bridge_config() -> Config {
    Config {
        api_key: API_KEY.to_owned(),
        conversation_profile_name:
            "projects/demo/locations/global/conversationProfiles/cp-test".to_owned(),
        project_id: "demo".to_owned(),
        location_id: "global".to_owned(),
        ui_connector_endpoint: "http://127.0.0.1:8081".to_owned(),
        redis_host: "127.0.0.1".to_owned(),
        redis_port: 6379,
        bind_addr: "127.0.0.1:0".to_owned(),
        log_level: "info".to_owned(),
        timeout_secs: 2,
        rate: 8000,
        chunk_size: 1600,
        max_lookback_secs: 3,
        summary_interval_secs: 1,
        conversation_event_topic: "aa-conversation-event-topic".to_owned(),
    }
}

#[tokio::test]
async fn summary_without_subscriber_goes_to_the_durable_topic() {
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    let broker = Arc::new(MemoryBroker::new());
    let durable = Arc::new(RecordingDurablePublisher::new());
    let state = AppState {
        config: Arc::new(bridge_config()),
        ai: ai.clone(),
        broker: broker.clone(),
        durable: durable.clone(),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    let mut call = AudiohookClient::connect(&format!("ws://{addr}/connect"), API_KEY)
        .await
        .unwrap();
    call.send_open("lonely").await.unwrap();
    call.recv_until(MessageType::Opened).await;
    call.recv_until(MessageType::Resume).await;

    // First tick lands one interval after open.
    let mut delivered = false;
    for _ in 0..100 {
        if !durable.events().is_empty() {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(delivered, "the summary must reach the durable topic");

    let events = durable.events();
    assert_eq!(events[0].summary_count, 1);
    assert_eq!(
        events[0].conversation_name,
        "projects/demo/locations/global/conversations/alonely"
    );
    assert_eq!(events[0].genesys_conversation_id, "lonely");
    assert!(
        broker.published().is_empty(),
        "no broker publish may happen without a routing entry"
    );

    call.send_control(MessageType::Close).await.unwrap();
    call.recv_until(MessageType::Closed).await;

    // The ticker stops at close: no further summaries accumulate.  The
    // short settle window lets any tick racing the stop signal land first.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let count_at_close = durable.events().len();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(durable.events().len(), count_at_close);
}
