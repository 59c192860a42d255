// audiohook-protocol: Audiohook v2 wire types and the sequence-numbering codec.
//
// The Audiohook control channel is JSON over WebSocket text frames; audio
// arrives on binary frames as interleaved two-channel PCMU.  Every control
// message shares one envelope shape with a `type` discriminator and a
// `parameters` bag.

use serde::{Deserialize, Serialize};

/// Protocol version string carried on every outbound message.
pub const AUDIOHOOK_VERSION: &str = "2";

/// The all-zero conversation id the client sends on a connection probe.
pub const PROBE_CONVERSATION_ID: &str = "00000000-0000-0000-0000-000000000000";

// ---------------------------------------------------------------------------
// Message envelope
// ---------------------------------------------------------------------------

/// Control message kinds. Inbound: `open`, `close`, `ping`, `paused`,
/// `resumed`, `discarded`. Outbound: `opened`, `closed`, `pong`, `resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Open,
    Opened,
    Ping,
    Pong,
    Resume,
    Resumed,
    Paused,
    Discarded,
    Close,
    Closed,
}

/// One negotiated media item.
///
/// The server only ever accepts two-channel interleaved PCMU at 8 kHz with
/// `external` (customer) first and `internal` (agent) second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub media_type: String,
    pub format: String,
    pub channels: Vec<String>,
    pub rate: u32,
}

impl MediaItem {
    /// The single media shape this server negotiates.
    pub fn pcmu_stereo() -> Self {
        MediaItem {
            media_type: "audio".to_owned(),
            format: "PCMU".to_owned(),
            channels: vec!["external".to_owned(), "internal".to_owned()],
            rate: 8000,
        }
    }
}

/// Reference to the monitored participant carried in `open` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ani: Option<String>,
    #[serde(default)]
    pub ani_name: Option<String>,
    #[serde(default)]
    pub dnis: Option<String>,
}

/// The `parameters` bag.
///
/// Every known field is optional; unknown fields round-trip through `extra`
/// so a newer client does not break an older server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_paused: Option<bool>,
    /// `discarded` only: when the discarded span began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// `discarded` only: span duration (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A parsed Audiohook control message.
///
/// `seq` is the sender's own monotonic counter; `clientseq` echoes the
/// highest counter the sender has observed from its peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub seq: u64,
    #[serde(default)]
    pub clientseq: u64,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ProtocolMessage {
    /// Conversation id from the parameters, defaulting to the probe id the
    /// way the client does when the field is absent.
    pub fn conversation_id(&self) -> &str {
        self.parameters
            .conversation_id
            .as_deref()
            .unwrap_or(PROBE_CONVERSATION_ID)
    }

    /// True when this `open` denotes a connection probe.
    pub fn is_probe(&self) -> bool {
        self.conversation_id() == PROBE_CONVERSATION_ID
    }
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed control message: {0}")]
    MalformedJson(#[from] serde_json::Error),
    /// Audio frames interleave two one-byte samples; an odd length cannot be
    /// a whole number of sample pairs.
    #[error("audio frame length {0} is not a multiple of 2")]
    OddAudioFrame(usize),
}

/// Parse a text frame into a control message.
pub fn decode_control(text: &str) -> Result<ProtocolMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Validate a binary frame as a two-channel interleaved PCMU payload.
pub fn validate_audio_frame(frame: &[u8]) -> Result<(), ProtocolError> {
    if frame.len() % 2 != 0 {
        return Err(ProtocolError::OddAudioFrame(frame.len()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Codec: session identity and sequence discipline
// ---------------------------------------------------------------------------

/// Per-connection protocol state.
///
/// Holds the server's monotonic sequence counter, the highest sequence
/// observed from the client, and the session id echoed from the first
/// inbound message.  Every outbound message is built here so `seq`
/// assignment has a single site.
#[derive(Debug, Default)]
pub struct AudioHook {
    server_seq: u64,
    client_seq: u64,
    session_id: String,
}

impl AudioHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the peer's `seq` and session `id` from an inbound message.
    pub fn observe(&mut self, message: &ProtocolMessage) {
        if message.seq > self.client_seq {
            self.client_seq = message.seq;
        }
        if !message.id.is_empty() {
            self.session_id = message.id.clone();
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn server_seq(&self) -> u64 {
        self.server_seq
    }

    /// Build an outbound message of the given kind with an empty parameter
    /// bag, advancing the server sequence.
    pub fn message(&mut self, kind: MessageType) -> ProtocolMessage {
        self.server_seq += 1;
        ProtocolMessage {
            version: AUDIOHOOK_VERSION.to_owned(),
            kind,
            seq: self.server_seq,
            clientseq: self.client_seq,
            id: self.session_id.clone(),
            parameters: Parameters::default(),
        }
    }

    /// The `opened` response declaring the negotiated media.
    ///
    /// Always starts paused; the orchestrator sends `resume` once the
    /// subscriber side is ready (or the wait times out).
    pub fn opened_message(&mut self) -> ProtocolMessage {
        let mut message = self.message(MessageType::Opened);
        message.parameters.start_paused = Some(true);
        message.parameters.media = Some(vec![MediaItem::pcmu_stereo()]);
        message
    }

    pub fn resume_message(&mut self) -> ProtocolMessage {
        self.message(MessageType::Resume)
    }

    pub fn pong_message(&mut self) -> ProtocolMessage {
        self.message(MessageType::Pong)
    }

    pub fn closed_message(&mut self) -> ProtocolMessage {
        self.message(MessageType::Closed)
    }
}

/// Pick the acceptable media item from an offer.
///
/// Returns `None` when the client offered a media list containing no
/// two-channel PCMU @ 8 kHz entry; such an offer is rejected with `closed`.
/// An absent offer is treated as acceptable (the probe path sends none).
pub fn select_media(offered: Option<&[MediaItem]>) -> Option<MediaItem> {
    match offered {
        None => Some(MediaItem::pcmu_stereo()),
        Some(items) => items
            .iter()
            .find(|m| {
                m.media_type == "audio"
                    && m.format == "PCMU"
                    && m.rate == 8000
                    && m.channels.len() == 2
            })
            .cloned(),
    }
}
