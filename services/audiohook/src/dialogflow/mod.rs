//! Conversational-AI facade.
//!
//! The bridge talks to the provider exclusively through [`ConversationAi`],
//! an object-safe contract over domain types; the orchestrator, workers, and
//! summary ticker never see transport details.  The production
//! implementation lives in [`grpc`]; tests script the trait directly.

use futures_util::Stream;
use std::pin::Pin;
use std::time::Duration;

pub mod auth;
pub mod grpc;
pub mod proto;

pub use grpc::DialogflowClient;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationProfile {
    pub name: String,
    /// Empty when the profile does not pin a language.
    pub language_code: String,
    /// Speech-to-text model from the profile; empty when unset.
    pub stt_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    HumanAgent,
    EndUser,
}

impl ParticipantRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantRole::HumanAgent => "HUMAN_AGENT",
            ParticipantRole::EndUser => "END_USER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub role: ParticipantRole,
}

/// Recognition input configuration sent in the first streaming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub model: String,
}

/// Derive the recognition config from the conversation profile the way the
/// provider documents for telephony audio: µ-law input, enhanced phone-call
/// model unless the profile overrides it.
pub fn audio_config(profile: &ConversationProfile, rate: u32) -> AudioConfig {
    let language_code = if profile.language_code.is_empty() {
        "en-US".to_owned()
    } else {
        profile.language_code.clone()
    };
    let model = if profile.stt_model.is_empty() {
        "phone_call".to_owned()
    } else {
        profile.stt_model.clone()
    };
    AudioConfig {
        sample_rate_hertz: rate,
        language_code,
        model,
    }
}

/// One outbound item on a streaming-recognition call.
///
/// A session is `Config`, then any number of `Audio` payloads, then one
/// `Final` marking the client half-close.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeRequest {
    Config {
        participant: String,
        config: AudioConfig,
    },
    Audio(Vec<u8>),
    Final,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
    pub confidence: f32,
    /// Offset of the speech end within the current RPC session.
    pub speech_end_offset: Duration,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalyzeResponse {
    pub recognition: Option<RecognitionResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub text: String,
}

pub type AnalyzeRequestStream = Pin<Box<dyn Stream<Item = AnalyzeRequest> + Send>>;
pub type AnalyzeResponseStream =
    Pin<Box<dyn Stream<Item = Result<AnalyzeResponse, AiError>> + Send>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Provider failure taxonomy.
///
/// The first three map to the recognition worker's restart/idle behavior;
/// `NotFound` on a conversation means "not yet created".
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("recognition duration cap reached")]
    OutOfRange,
    #[error("precondition failed: {0}")]
    FailedPrecondition(String),
    #[error("quota exhausted: {0}")]
    ResourceExhausted(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("provider: {0}")]
    Provider(String),
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait ConversationAi: Send + Sync {
    async fn get_conversation_profile(
        &self,
        name: &str,
    ) -> Result<ConversationProfile, AiError>;

    async fn get_conversation(&self, name: &str) -> Result<Conversation, AiError>;

    async fn create_conversation(
        &self,
        profile: &ConversationProfile,
        conversation_id: &str,
    ) -> Result<Conversation, AiError>;

    async fn list_participants(
        &self,
        conversation_name: &str,
    ) -> Result<Vec<Participant>, AiError>;

    async fn create_participant(
        &self,
        conversation_name: &str,
        role: ParticipantRole,
    ) -> Result<Participant, AiError>;

    /// One long-lived recognition call.  The returned stream yields interim
    /// and final results until the provider half-closes or fails.
    async fn streaming_analyze_content(
        &self,
        requests: AnalyzeRequestStream,
    ) -> Result<AnalyzeResponseStream, AiError>;

    async fn complete_conversation(&self, conversation_name: &str) -> Result<(), AiError>;

    /// May return `None` early in a call when the provider has nothing to
    /// summarize yet.
    async fn suggest_conversation_summary(
        &self,
        conversation_name: &str,
    ) -> Result<Option<ConversationSummary>, AiError>;
}

// ---------------------------------------------------------------------------
// Naming helpers
// ---------------------------------------------------------------------------

/// Full conversation resource name for a normalized conversation id.
pub fn conversation_name(project: &str, location: &str, conversation_id: &str) -> String {
    format!("projects/{project}/locations/{location}/conversations/{conversation_id}")
}

/// Conversation ids must start with a letter; the platform's UUID-shaped ids
/// get an `a` prefix.
pub fn normalize_conversation_id(conversation_id: &str) -> String {
    format!("a{conversation_id}")
}

pub fn find_participant_by_role(
    role: ParticipantRole,
    participants: &[Participant],
) -> Option<&Participant> {
    participants.iter().find(|p| p.role == role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_config_defaults_language_and_model() {
        let bare = ConversationProfile {
            name: "p".to_owned(),
            language_code: String::new(),
            stt_model: String::new(),
        };
        let config = audio_config(&bare, 8000);
        assert_eq!(config.language_code, "en-US");
        assert_eq!(config.model, "phone_call");
        assert_eq!(config.sample_rate_hertz, 8000);
    }

    #[test]
    fn audio_config_honors_profile_overrides() {
        let profile = ConversationProfile {
            name: "p".to_owned(),
            language_code: "fr-FR".to_owned(),
            stt_model: "telephony".to_owned(),
        };
        let config = audio_config(&profile, 8000);
        assert_eq!(config.language_code, "fr-FR");
        assert_eq!(config.model, "telephony");
    }

    #[test]
    fn conversation_names_carry_project_location_and_prefixed_id() {
        let id = normalize_conversation_id("9f1c-2d");
        assert_eq!(id, "a9f1c-2d");
        assert_eq!(
            conversation_name("demo", "global", &id),
            "projects/demo/locations/global/conversations/a9f1c-2d"
        );
    }

    #[test]
    fn participants_are_found_by_role() {
        let list = vec![
            Participant {
                name: "p/agent".to_owned(),
                role: ParticipantRole::HumanAgent,
            },
            Participant {
                name: "p/user".to_owned(),
                role: ParticipantRole::EndUser,
            },
        ];
        assert_eq!(
            find_participant_by_role(ParticipantRole::EndUser, &list).map(|p| p.name.as_str()),
            Some("p/user")
        );
        assert!(find_participant_by_role(ParticipantRole::HumanAgent, &list).is_some());
        assert!(find_participant_by_role(ParticipantRole::HumanAgent, &[]).is_none());
    }
}
