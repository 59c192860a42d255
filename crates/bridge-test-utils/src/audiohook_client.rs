//! Audiohook test client.
//!
//! Speaks the client side of the Audiohook v2 protocol against a bridge
//! under test: text control frames with client-side sequence numbering and
//! raw interleaved binary audio.

use audiohook_protocol::{
    AUDIOHOOK_VERSION, MediaItem, MessageType, Parameters, ProtocolMessage,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use uuid::Uuid;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct AudiohookClient {
    ws: WsStream,
    session_id: String,
    seq: u64,
    last_server_seq: u64,
}

impl AudiohookClient {
    /// Connect to `/connect` with the API key header the bridge requires.
    pub async fn connect(
        url: &str,
        api_key: &str,
    ) -> Result<Self, tokio_tungstenite::tungstenite::Error> {
        let mut request = url.into_client_request()?;
        request.headers_mut().insert(
            "x-api-key",
            api_key.parse().expect("api key is a valid header value"),
        );
        let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
        Ok(AudiohookClient {
            ws,
            session_id: Uuid::new_v4().to_string(),
            seq: 0,
            last_server_seq: 0,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn next_message(&mut self, kind: MessageType, parameters: Parameters) -> ProtocolMessage {
        self.seq += 1;
        ProtocolMessage {
            version: AUDIOHOOK_VERSION.to_owned(),
            kind,
            seq: self.seq,
            clientseq: self.last_server_seq,
            id: self.session_id.clone(),
            parameters,
        }
    }

    async fn send(
        &mut self,
        message: ProtocolMessage,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let json = serde_json::to_string(&message).expect("serialize control message");
        self.ws.send(Message::Text(json.into())).await
    }

    pub async fn send_open(
        &mut self,
        conversation_id: &str,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let parameters = Parameters {
            conversation_id: Some(conversation_id.to_owned()),
            media: Some(vec![MediaItem::pcmu_stereo()]),
            ..Parameters::default()
        };
        let message = self.next_message(MessageType::Open, parameters);
        self.send(message).await
    }

    pub async fn send_control(
        &mut self,
        kind: MessageType,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let message = self.next_message(kind, Parameters::default());
        self.send(message).await
    }

    /// Send an arbitrary text frame (for malformed-input tests).
    pub async fn send_raw_text(
        &mut self,
        text: &str,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.ws.send(Message::Text(text.to_owned().into())).await
    }

    /// Send one interleaved binary audio frame.
    pub async fn send_audio(
        &mut self,
        frame: &[u8],
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.ws.send(Message::Binary(frame.to_vec().into())).await
    }

    /// Receive the next control message, skipping any non-text frames.
    /// Panics on timeout so test failures point at the missing message.
    pub async fn recv_control(&mut self) -> ProtocolMessage {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a control message")
                .expect("connection closed while waiting for a control message")
                .expect("websocket error");
            match frame {
                Message::Text(text) => {
                    let message: ProtocolMessage =
                        serde_json::from_str(&text).expect("parse control message");
                    if message.seq > self.last_server_seq {
                        self.last_server_seq = message.seq;
                    }
                    return message;
                }
                _ => continue,
            }
        }
    }

    /// Receive until a message of `kind` arrives; returns it.
    pub async fn recv_until(&mut self, kind: MessageType) -> ProtocolMessage {
        loop {
            let message = self.recv_control().await;
            if message.kind == kind {
                return message;
            }
        }
    }

    /// True when the server closes the transport within the timeout.
    pub async fn wait_for_close(&mut self) -> bool {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.ws.next()).await {
                Ok(None) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(_))) => return true,
                Err(_) => return false,
            }
        }
    }
}
