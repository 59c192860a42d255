//! Wire messages for the consumed subset of the Dialogflow v2beta1 API.
//!
//! Declared in-crate with `prost` derives so the build needs no protoc;
//! field tags follow the published service definition.  Fields the bridge
//! never reads are omitted (protobuf skips unknown fields on decode).

/// `google.cloud.dialogflow.v2beta1.AudioEncoding`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
#[repr(i32)]
pub enum AudioEncoding {
    Unspecified = 0,
    Linear16 = 1,
    Flac = 2,
    Mulaw = 3,
    Amr = 4,
    AmrWb = 5,
    OggOpus = 6,
    SpeexWithHeaderByte = 7,
}

/// `google.cloud.dialogflow.v2beta1.SpeechModelVariant`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
#[repr(i32)]
pub enum SpeechModelVariant {
    Unspecified = 0,
    UseBestAvailable = 1,
    UseStandard = 2,
    UseEnhanced = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InputAudioConfig {
    #[prost(enumeration = "AudioEncoding", tag = "1")]
    pub audio_encoding: i32,
    #[prost(int32, tag = "2")]
    pub sample_rate_hertz: i32,
    #[prost(string, tag = "3")]
    pub language_code: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub model: ::prost::alloc::string::String,
    #[prost(enumeration = "SpeechModelVariant", tag = "10")]
    pub model_variant: i32,
    #[prost(bool, tag = "17")]
    pub enable_automatic_punctuation: bool,
}

/// `google.cloud.dialogflow.v2beta1.Participant.Role`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
#[repr(i32)]
pub enum ParticipantRole {
    Unspecified = 0,
    HumanAgent = 1,
    AutomatedAgent = 2,
    EndUser = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Participant {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(enumeration = "ParticipantRole", tag = "2")]
    pub role: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Conversation {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub lifecycle_state: i32,
    #[prost(string, tag = "3")]
    pub conversation_profile: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpeechToTextConfig {
    #[prost(enumeration = "SpeechModelVariant", tag = "1")]
    pub speech_model_variant: i32,
    #[prost(string, tag = "2")]
    pub model: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConversationProfile {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub display_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "9")]
    pub stt_config: ::core::option::Option<SpeechToTextConfig>,
    #[prost(string, tag = "10")]
    pub language_code: ::prost::alloc::string::String,
}

// ---------------------------------------------------------------------------
// Unary request/response messages
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetConversationProfileRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetConversationRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateConversationRequest {
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub conversation: ::core::option::Option<Conversation>,
    #[prost(string, tag = "3")]
    pub conversation_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CompleteConversationRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListParticipantsRequest {
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub page_size: i32,
    #[prost(string, tag = "3")]
    pub page_token: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListParticipantsResponse {
    #[prost(message, repeated, tag = "1")]
    pub participants: ::prost::alloc::vec::Vec<Participant>,
    #[prost(string, tag = "2")]
    pub next_page_token: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateParticipantRequest {
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub participant: ::core::option::Option<Participant>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SuggestConversationSummaryRequest {
    #[prost(string, tag = "1")]
    pub conversation: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub latest_message: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub context_size: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Summary {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SuggestConversationSummaryResponse {
    #[prost(message, optional, tag = "1")]
    pub summary: ::core::option::Option<Summary>,
}

// ---------------------------------------------------------------------------
// Streaming messages
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingAnalyzeContentRequest {
    #[prost(string, tag = "1")]
    pub participant: ::prost::alloc::string::String,
    #[prost(oneof = "streaming_analyze_content_request::Config", tags = "2")]
    pub config: ::core::option::Option<streaming_analyze_content_request::Config>,
    #[prost(oneof = "streaming_analyze_content_request::Input", tags = "6")]
    pub input: ::core::option::Option<streaming_analyze_content_request::Input>,
    #[prost(bool, tag = "19")]
    pub enable_debugging_info: bool,
}

pub mod streaming_analyze_content_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Config {
        #[prost(message, tag = "2")]
        AudioConfig(super::InputAudioConfig),
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Input {
        #[prost(bytes, tag = "6")]
        InputAudio(::prost::alloc::vec::Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingRecognitionResult {
    #[prost(int32, tag = "1")]
    pub message_type: i32,
    #[prost(string, tag = "2")]
    pub transcript: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub is_final: bool,
    #[prost(float, tag = "4")]
    pub confidence: f32,
    #[prost(message, optional, tag = "8")]
    pub speech_end_offset: ::core::option::Option<::prost_types::Duration>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingAnalyzeContentResponse {
    #[prost(message, optional, tag = "1")]
    pub recognition_result: ::core::option::Option<StreamingRecognitionResult>,
}
