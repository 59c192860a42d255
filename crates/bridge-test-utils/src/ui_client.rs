//! Agent UI test client for the subscription hub.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct UiClient {
    ws: WsStream,
}

impl UiClient {
    pub async fn connect(url: &str) -> Result<Self, tokio_tungstenite::tungstenite::Error> {
        let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
        Ok(UiClient { ws })
    }

    pub async fn send_json(
        &mut self,
        value: &serde_json::Value,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.ws.send(Message::Text(value.to_string().into())).await
    }

    /// Present the bearer token as the handshake frame.
    pub async fn authenticate(
        &mut self,
        token: &str,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.send_json(&serde_json::json!({ "auth": { "token": token } }))
            .await
    }

    /// Join a room and return the hub's ack.
    pub async fn join_conversation(
        &mut self,
        conversation_name: &str,
    ) -> Result<serde_json::Value, tokio_tungstenite::tungstenite::Error> {
        self.send_json(&serde_json::json!({
            "action": "join-conversation",
            "conversationName": conversation_name,
        }))
        .await?;
        Ok(self.recv_json().await)
    }

    pub async fn leave_conversation(
        &mut self,
        conversation_name: &str,
    ) -> Result<serde_json::Value, tokio_tungstenite::tungstenite::Error> {
        self.send_json(&serde_json::json!({
            "action": "leave-conversation",
            "conversationName": conversation_name,
        }))
        .await?;
        Ok(self.recv_json().await)
    }

    /// Receive the next JSON frame.  Panics on timeout or close so test
    /// failures point at the missing event.
    pub async fn recv_json(&mut self) -> serde_json::Value {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a hub message")
                .expect("hub closed the connection")
                .expect("websocket error");
            match frame {
                Message::Text(text) => {
                    return serde_json::from_str(&text).expect("hub sent invalid JSON");
                }
                _ => continue,
            }
        }
    }

    /// `None` when nothing arrives within `wait` (used to assert silence).
    pub async fn try_recv_json(&mut self, wait: Duration) -> Option<serde_json::Value> {
        match tokio::time::timeout(wait, self.ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                Some(serde_json::from_str(&text).expect("hub sent invalid JSON"))
            }
            _ => None,
        }
    }

    /// Close the client side of the socket.
    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
