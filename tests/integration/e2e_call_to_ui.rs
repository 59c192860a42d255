//! Full-plane flow: telephony session in, AI events out to agent UIs.
//!
//! Both services run in-process over one shared broker, with the
//! conversational-AI facade scripted.

use assist_broker::{Broker, MemoryBroker, data_types};
use audiohook::{AppState, Config, build_router as build_audiohook_router};
use audiohook_protocol::MessageType;
use bridge_test_utils::{
    AudiohookClient, MockConversationAi, RecordingDurablePublisher, UiClient, mint_jwt,
};
use std::sync::Arc;
use std::time::Duration;
use ui_connector::{HubState, build_router as build_hub_router, generate_hub_id, subscriber};

const API_KEY: &str = "e2e-key";
const SECRET: &str = "e2e-secret";
const CONVERSATION_FULL: &str = "projects/demo/locations/global/conversations/aconv1";
const ROOM: &str = "projects/demo/conversations/aconv1";

struct Bridge {
    audiohook_url: String,
    hub_url: String,
    ai: Arc<MockConversationAi>,
    broker: Arc<MemoryBroker>,
    durable: Arc<RecordingDurablePublisher>,
}

fn bridge_config(summary_interval_secs: u64) -> Config {
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
        summary_interval_secs,
        conversation_event_topic: "aa-conversation-event-topic".to_owned(),
    }
}

async fn spawn_bridge(summary_interval_secs: u64) -> Bridge {
    let broker = Arc::new(MemoryBroker::new());
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    let durable = Arc::new(RecordingDurablePublisher::new());

    let state = AppState {
        config: Arc::new(bridge_config(summary_interval_secs)),
        ai: ai.clone(),
        broker: broker.clone(),
        durable: durable.clone(),
    };
    let audiohook_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let audiohook_addr = audiohook_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(audiohook_listener, build_audiohook_router(state))
            .await
            .unwrap();
    });

    let hub_state = HubState::new(generate_hub_id(), SECRET.to_owned(), broker.clone());
    tokio::spawn(subscriber::run_subscriber(hub_state.clone()));
    let hub_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hub_addr = hub_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(hub_listener, build_hub_router(hub_state))
            .await
            .unwrap();
    });

    Bridge {
        audiohook_url: format!("ws://{audiohook_addr}/connect"),
        hub_url: format!("ws://{hub_addr}/ws"),
        ai,
        broker,
        durable,
    }
}

/// A UI client that joined the conversation room receives the periodic
/// summary over the broker plane; nothing hits the durable topic.
#[tokio::test]
async fn summary_reaches_the_joined_agent_ui() {
    let bridge = spawn_bridge(1).await;

    let mut ui = UiClient::connect(&bridge.hub_url).await.unwrap();
    ui.authenticate(&mint_jwt(SECRET, 3600)).await.unwrap();
    let ack = ui.join_conversation(CONVERSATION_FULL).await.unwrap();
    assert_eq!(ack["conversationName"], ROOM);

    let mut call = AudiohookClient::connect(&bridge.audiohook_url, API_KEY)
        .await
        .unwrap();
    call.send_open("conv1").await.unwrap();
    call.recv_until(MessageType::Opened).await;
    // Routing entry already exists, so resume is prompt.
    call.recv_until(MessageType::Resume).await;

    // The summarization ticker (1 s interval) routes through the broker to
    // the hub, which broadcasts it.
    let event = ui.recv_json().await;
    assert_eq!(event["data_type"], data_types::SUMMARIZATION);
    assert_eq!(event["conversation_name"], ROOM);
    let data: serde_json::Value =
        serde_json::from_str(event["data"].as_str().unwrap()).unwrap();
    assert_eq!(data["conversationName"], CONVERSATION_FULL);
    assert_eq!(data["genesysConversationId"], "conv1");
    assert_eq!(data["summaryCount"], 1);

    assert!(
        bridge.durable.events().is_empty(),
        "a routed summary must not also use the durable topic"
    );

    call.send_control(MessageType::Close).await.unwrap();
    call.recv_until(MessageType::Closed).await;
    let mut completed = false;
    for _ in 0..100 {
        if bridge.ai.completed() == vec![CONVERSATION_FULL.to_owned()] {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(completed, "close must complete the conversation");
}

/// The suggestion amplification path: an event published on the owning
/// hub's channel reaches the room member and nobody else.
#[tokio::test]
async fn suggestion_events_route_to_the_room_only() {
    let bridge = spawn_bridge(600).await;

    let mut in_room = UiClient::connect(&bridge.hub_url).await.unwrap();
    in_room.authenticate(&mint_jwt(SECRET, 3600)).await.unwrap();
    in_room.join_conversation(CONVERSATION_FULL).await.unwrap();

    let mut bystander = UiClient::connect(&bridge.hub_url).await.unwrap();
    bystander
        .authenticate(&mint_jwt(SECRET, 3600))
        .await
        .unwrap();

    // Resolve the owning hub through the routing entry, the way the REST
    // proxy amplifies analyze-content suggestions.
    let hub_id = bridge.broker.get(ROOM).await.unwrap().expect("routing entry");
    let envelope = serde_json::json!({
        "data_type": data_types::AGENT_ASSIST,
        "conversation_name": ROOM,
        "human_agent_suggestion_results": [{"suggestArticlesResponse": {}}],
    });
    bridge
        .broker
        .publish(&format!("{hub_id}:{ROOM}"), &envelope.to_string())
        .await
        .unwrap();

    let event = in_room.recv_json().await;
    assert_eq!(event["data_type"], data_types::AGENT_ASSIST);
    assert!(event["human_agent_suggestion_results"].is_array());
    assert!(
        bystander
            .try_recv_json(Duration::from_millis(300))
            .await
            .is_none(),
        "suggestions are room-scoped, not broadcast"
    );
}
