//! gRPC implementation of [`ConversationAi`] against the Dialogflow API.
//!
//! Endpoints are region-scoped: any location other than `global` maps to
//! `{location}-dialogflow.googleapis.com`.  Per-request Bearer tokens come
//! from the ambient [`TokenSource`].

use super::auth::TokenSource;
use super::proto;
use super::{
    AiError, AnalyzeRequest, AnalyzeRequestStream, AnalyzeResponse, AnalyzeResponseStream,
    AudioConfig, Conversation, ConversationAi, ConversationProfile, ConversationSummary,
    Participant, ParticipantRole, RecognitionResult,
};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, ClientTlsConfig};
use tonic_prost::ProstCodec;
use tracing::debug;

/// Region-scoped API host.
pub fn api_endpoint(location: &str) -> String {
    if location == "global" {
        "dialogflow.googleapis.com".to_owned()
    } else {
        format!("{location}-dialogflow.googleapis.com")
    }
}

fn status_to_error(status: tonic::Status) -> AiError {
    match status.code() {
        tonic::Code::OutOfRange => AiError::OutOfRange,
        tonic::Code::FailedPrecondition => {
            AiError::FailedPrecondition(status.message().to_owned())
        }
        tonic::Code::ResourceExhausted => AiError::ResourceExhausted(status.message().to_owned()),
        tonic::Code::NotFound => AiError::NotFound(status.message().to_owned()),
        tonic::Code::Unavailable | tonic::Code::DeadlineExceeded => {
            AiError::Transport(status.message().to_owned())
        }
        _ => AiError::Provider(format!("{}: {}", status.code(), status.message())),
    }
}

pub struct DialogflowClient {
    channel: Channel,
    tokens: Arc<TokenSource>,
    project: String,
    location: String,
}

impl DialogflowClient {
    pub fn new(
        project: &str,
        location: &str,
        tokens: Arc<TokenSource>,
    ) -> Result<Self, AiError> {
        let host = api_endpoint(location);
        debug!(endpoint = %host, "dialogflow endpoint resolved");
        let tls = ClientTlsConfig::new().with_native_roots();
        let channel = Channel::from_shared(format!("https://{host}"))
            .map_err(|e| AiError::Transport(format!("bad endpoint {host}: {e}")))?
            .tls_config(tls)
            .map_err(|e| AiError::Transport(format!("tls config: {e}")))?
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .connect_lazy();
        Ok(DialogflowClient {
            channel,
            tokens,
            project: project.to_owned(),
            location: location.to_owned(),
        })
    }

    fn location_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }

    async fn authed_request<T>(&self, message: T) -> Result<tonic::Request<T>, AiError> {
        let token = self.tokens.token().await?;
        let mut request = tonic::Request::new(message);
        let value = MetadataValue::try_from(format!("Bearer {token}"))
            .map_err(|e| AiError::Transport(format!("bearer metadata: {e}")))?;
        request.metadata_mut().insert("authorization", value);
        Ok(request)
    }

    async fn unary<M1, M2>(&self, path: &'static str, message: M1) -> Result<M2, AiError>
    where
        M1: prost::Message + Send + Sync + 'static,
        M2: prost::Message + Default + Send + Sync + 'static,
    {
        let request = self.authed_request(message).await?;
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| AiError::Transport(format!("service not ready: {e}")))?;
        let codec: ProstCodec<M1, M2> = ProstCodec::default();
        let response = grpc
            .unary(request, PathAndQuery::from_static(path), codec)
            .await
            .map_err(status_to_error)?;
        Ok(response.into_inner())
    }
}

fn to_proto_request(request: AnalyzeRequest) -> proto::StreamingAnalyzeContentRequest {
    use proto::streaming_analyze_content_request::{Config, Input};
    match request {
        AnalyzeRequest::Config {
            participant,
            config,
        } => proto::StreamingAnalyzeContentRequest {
            participant,
            config: Some(Config::AudioConfig(to_proto_audio_config(&config))),
            ..Default::default()
        },
        AnalyzeRequest::Audio(bytes) => proto::StreamingAnalyzeContentRequest {
            input: Some(Input::InputAudio(bytes)),
            ..Default::default()
        },
        AnalyzeRequest::Final => proto::StreamingAnalyzeContentRequest::default(),
    }
}

fn to_proto_audio_config(config: &AudioConfig) -> proto::InputAudioConfig {
    proto::InputAudioConfig {
        audio_encoding: proto::AudioEncoding::Mulaw as i32,
        sample_rate_hertz: config.sample_rate_hertz as i32,
        language_code: config.language_code.clone(),
        model: config.model.clone(),
        model_variant: proto::SpeechModelVariant::UseEnhanced as i32,
        enable_automatic_punctuation: true,
    }
}

fn from_proto_response(response: proto::StreamingAnalyzeContentResponse) -> AnalyzeResponse {
    AnalyzeResponse {
        recognition: response.recognition_result.map(|result| {
            let offset = result
                .speech_end_offset
                .map(|d| {
                    Duration::new(d.seconds.max(0) as u64, d.nanos.max(0) as u32)
                })
                .unwrap_or_default();
            RecognitionResult {
                transcript: result.transcript,
                is_final: result.is_final,
                confidence: result.confidence,
                speech_end_offset: offset,
            }
        }),
    }
}

fn from_proto_participant(participant: proto::Participant) -> Option<Participant> {
    let role = match proto::ParticipantRole::try_from(participant.role) {
        Ok(proto::ParticipantRole::HumanAgent) => ParticipantRole::HumanAgent,
        Ok(proto::ParticipantRole::EndUser) => ParticipantRole::EndUser,
        _ => return None,
    };
    Some(Participant {
        name: participant.name,
        role,
    })
}

#[async_trait::async_trait]
impl ConversationAi for DialogflowClient {
    async fn get_conversation_profile(
        &self,
        name: &str,
    ) -> Result<ConversationProfile, AiError> {
        let profile: proto::ConversationProfile = self
            .unary(
                "/google.cloud.dialogflow.v2beta1.ConversationProfiles/GetConversationProfile",
                proto::GetConversationProfileRequest {
                    name: name.to_owned(),
                },
            )
            .await?;
        Ok(ConversationProfile {
            language_code: profile.language_code,
            stt_model: profile.stt_config.map(|c| c.model).unwrap_or_default(),
            name: profile.name,
        })
    }

    async fn get_conversation(&self, name: &str) -> Result<Conversation, AiError> {
        let conversation: proto::Conversation = self
            .unary(
                "/google.cloud.dialogflow.v2beta1.Conversations/GetConversation",
                proto::GetConversationRequest {
                    name: name.to_owned(),
                },
            )
            .await?;
        Ok(Conversation {
            name: conversation.name,
        })
    }

    async fn create_conversation(
        &self,
        profile: &ConversationProfile,
        conversation_id: &str,
    ) -> Result<Conversation, AiError> {
        let conversation: proto::Conversation = self
            .unary(
                "/google.cloud.dialogflow.v2beta1.Conversations/CreateConversation",
                proto::CreateConversationRequest {
                    parent: self.location_path(),
                    conversation: Some(proto::Conversation {
                        conversation_profile: profile.name.clone(),
                        ..Default::default()
                    }),
                    conversation_id: conversation_id.to_owned(),
                },
            )
            .await?;
        Ok(Conversation {
            name: conversation.name,
        })
    }

    async fn list_participants(
        &self,
        conversation_name: &str,
    ) -> Result<Vec<Participant>, AiError> {
        let response: proto::ListParticipantsResponse = self
            .unary(
                "/google.cloud.dialogflow.v2beta1.Participants/ListParticipants",
                proto::ListParticipantsRequest {
                    parent: conversation_name.to_owned(),
                    ..Default::default()
                },
            )
            .await?;
        Ok(response
            .participants
            .into_iter()
            .filter_map(from_proto_participant)
            .collect())
    }

    async fn create_participant(
        &self,
        conversation_name: &str,
        role: ParticipantRole,
    ) -> Result<Participant, AiError> {
        let proto_role = match role {
            ParticipantRole::HumanAgent => proto::ParticipantRole::HumanAgent,
            ParticipantRole::EndUser => proto::ParticipantRole::EndUser,
        };
        let created: proto::Participant = self
            .unary(
                "/google.cloud.dialogflow.v2beta1.Participants/CreateParticipant",
                proto::CreateParticipantRequest {
                    parent: conversation_name.to_owned(),
                    participant: Some(proto::Participant {
                        role: proto_role as i32,
                        ..Default::default()
                    }),
                },
            )
            .await?;
        Ok(Participant {
            name: created.name,
            role,
        })
    }

    async fn streaming_analyze_content(
        &self,
        requests: AnalyzeRequestStream,
    ) -> Result<AnalyzeResponseStream, AiError> {
        let request = self
            .authed_request(requests.map(to_proto_request))
            .await?;
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| AiError::Transport(format!("service not ready: {e}")))?;
        let codec: ProstCodec<
            proto::StreamingAnalyzeContentRequest,
            proto::StreamingAnalyzeContentResponse,
        > = ProstCodec::default();
        let response = grpc
            .streaming(
                request,
                PathAndQuery::from_static(
                    "/google.cloud.dialogflow.v2beta1.Participants/StreamingAnalyzeContent",
                ),
                codec,
            )
            .await
            .map_err(status_to_error)?;

        let stream = response
            .into_inner()
            .map(|item| item.map(from_proto_response).map_err(status_to_error));
        Ok(Box::pin(stream))
    }

    async fn complete_conversation(&self, conversation_name: &str) -> Result<(), AiError> {
        let _: proto::Conversation = self
            .unary(
                "/google.cloud.dialogflow.v2beta1.Conversations/CompleteConversation",
                proto::CompleteConversationRequest {
                    name: conversation_name.to_owned(),
                },
            )
            .await?;
        Ok(())
    }

    async fn suggest_conversation_summary(
        &self,
        conversation_name: &str,
    ) -> Result<Option<ConversationSummary>, AiError> {
        let response: proto::SuggestConversationSummaryResponse = self
            .unary(
                "/google.cloud.dialogflow.v2beta1.Conversations/SuggestConversationSummary",
                proto::SuggestConversationSummaryRequest {
                    conversation: conversation_name.to_owned(),
                    ..Default::default()
                },
            )
            .await?;
        Ok(response
            .summary
            .filter(|s| !s.text.is_empty())
            .map(|s| ConversationSummary { text: s.text }))
    }
}
