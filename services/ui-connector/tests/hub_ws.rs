//! Hub WebSocket behavior: auth, room membership, routing entries, fan-out.

use assist_broker::{Broker, BrokerMessage, MemoryBroker, data_types, routing_channel};
use bridge_test_utils::{UiClient, mint_jwt};
use std::sync::Arc;
use std::time::Duration;
use ui_connector::{HubState, build_router, subscriber};

const SECRET: &str = "hub-secret";
const ROOM: &str = "projects/demo/conversations/a42";

struct Harness {
    url: String,
    hub_id: String,
    broker: Arc<MemoryBroker>,
}

async fn spawn_hub() -> Harness {
    let broker = Arc::new(MemoryBroker::new());
    let hub_id = format!("hub-{}", uuid::Uuid::new_v4());
    let state = HubState::new(hub_id.clone(), SECRET.to_owned(), broker.clone());
    tokio::spawn(subscriber::run_subscriber(state.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    Harness {
        url: format!("ws://{addr}/ws"),
        hub_id,
        broker,
    }
}

#[tokio::test]
async fn invalid_token_gets_unauthenticated_and_refusal() {
    let harness = spawn_hub().await;
    let mut client = UiClient::connect(&harness.url).await.unwrap();
    client.authenticate("garbage-token").await.unwrap();

    let event = client.recv_json().await;
    assert_eq!(event["event"], "unauthenticated");
}

#[tokio::test]
async fn join_normalizes_the_room_and_writes_the_routing_entry() {
    let harness = spawn_hub().await;
    let mut client = UiClient::connect(&harness.url).await.unwrap();
    client.authenticate(&mint_jwt(SECRET, 3600)).await.unwrap();

    // Location-qualified name normalizes to the stripped form.
    let ack = client
        .join_conversation("projects/demo/locations/global/conversations/a42")
        .await
        .unwrap();
    assert_eq!(ack["event"], "join-conversation");
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["conversationName"], ROOM);

    assert_eq!(
        harness.broker.get(ROOM).await.unwrap().as_deref(),
        Some(harness.hub_id.as_str())
    );

    let ack = client.leave_conversation(ROOM).await.unwrap();
    assert_eq!(ack["event"], "leave-conversation");
    assert_eq!(harness.broker.get(ROOM).await.unwrap(), None);
}

#[tokio::test]
async fn disconnect_reclaims_routing_entries() {
    let harness = spawn_hub().await;
    let mut client = UiClient::connect(&harness.url).await.unwrap();
    client.authenticate(&mint_jwt(SECRET, 3600)).await.unwrap();
    client.join_conversation(ROOM).await.unwrap();
    assert!(harness.broker.exists(ROOM).await.unwrap());

    client.close().await;
    let mut reclaimed = false;
    for _ in 0..100 {
        if !harness.broker.exists(ROOM).await.unwrap() {
            reclaimed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reclaimed, "disconnect must delete the routing entry");
}

#[tokio::test]
async fn room_events_reach_members_and_summaries_broadcast() {
    let harness = spawn_hub().await;

    let mut in_room = UiClient::connect(&harness.url).await.unwrap();
    in_room.authenticate(&mint_jwt(SECRET, 3600)).await.unwrap();
    in_room.join_conversation(ROOM).await.unwrap();

    let mut bystander = UiClient::connect(&harness.url).await.unwrap();
    bystander
        .authenticate(&mint_jwt(SECRET, 3600))
        .await
        .unwrap();

    // Room-scoped suggestion event: member only.
    let suggestion = BrokerMessage {
        data_type: data_types::AGENT_ASSIST.to_owned(),
        conversation_name: ROOM.to_owned(),
        payload: serde_json::Map::new(),
    };
    harness
        .broker
        .publish(
            &routing_channel(&harness.hub_id, ROOM),
            &serde_json::to_string(&suggestion).unwrap(),
        )
        .await
        .unwrap();

    let event = in_room.recv_json().await;
    assert_eq!(event["data_type"], data_types::AGENT_ASSIST);
    assert_eq!(event["conversation_name"], ROOM);
    assert!(
        bystander
            .try_recv_json(Duration::from_millis(300))
            .await
            .is_none(),
        "room events must not leak outside the room"
    );

    // Summaries broadcast to every authenticated connection.
    let summary = BrokerMessage {
        data_type: data_types::SUMMARIZATION.to_owned(),
        conversation_name: ROOM.to_owned(),
        payload: serde_json::Map::new(),
    };
    harness
        .broker
        .publish(
            &routing_channel(&harness.hub_id, ROOM),
            &serde_json::to_string(&summary).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        in_room.recv_json().await["data_type"],
        data_types::SUMMARIZATION
    );
    assert_eq!(
        bystander.recv_json().await["data_type"],
        data_types::SUMMARIZATION
    );
}

#[tokio::test]
async fn events_for_other_hubs_are_not_delivered() {
    let harness = spawn_hub().await;
    let mut client = UiClient::connect(&harness.url).await.unwrap();
    client.authenticate(&mint_jwt(SECRET, 3600)).await.unwrap();
    client.join_conversation(ROOM).await.unwrap();

    let message = BrokerMessage {
        data_type: data_types::AGENT_ASSIST.to_owned(),
        conversation_name: ROOM.to_owned(),
        payload: serde_json::Map::new(),
    };
    harness
        .broker
        .publish(
            &routing_channel("some-other-hub", ROOM),
            &serde_json::to_string(&message).unwrap(),
        )
        .await
        .unwrap();

    assert!(
        client.try_recv_json(Duration::from_millis(300)).await.is_none(),
        "another hub's channel must not reach this hub's clients"
    );
}
