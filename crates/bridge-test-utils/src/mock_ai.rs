//! Scripted in-process implementation of the conversational-AI facade.
//!
//! Conversations and participants live in hash maps; streaming-recognition
//! sessions record every request they receive and play back a per-session
//! script of responses keyed by how many audio payloads have arrived.

use audiohook::dialogflow::{
    AiError, AnalyzeRequest, AnalyzeRequestStream, AnalyzeResponse, AnalyzeResponseStream,
    Conversation, ConversationAi, ConversationProfile, ConversationSummary, Participant,
    ParticipantRole, RecognitionResult,
};
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Build a final recognition response ending at `offset_ms`.
pub fn final_response(transcript: &str, offset_ms: u64) -> AnalyzeResponse {
    AnalyzeResponse {
        recognition: Some(RecognitionResult {
            transcript: transcript.to_owned(),
            is_final: true,
            confidence: 0.9,
            speech_end_offset: Duration::from_millis(offset_ms),
        }),
    }
}

/// Build an interim recognition response ending at `offset_ms`.
pub fn interim_response(transcript: &str, offset_ms: u64) -> AnalyzeResponse {
    AnalyzeResponse {
        recognition: Some(RecognitionResult {
            transcript: transcript.to_owned(),
            is_final: false,
            confidence: 0.0,
            speech_end_offset: Duration::from_millis(offset_ms),
        }),
    }
}

/// Terminal errors a scripted session can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    OutOfRange,
    ResourceExhausted,
    FailedPrecondition,
}

impl MockError {
    fn to_ai(self) -> AiError {
        match self {
            MockError::OutOfRange => AiError::OutOfRange,
            MockError::ResourceExhausted => AiError::ResourceExhausted("scripted".to_owned()),
            MockError::FailedPrecondition => AiError::FailedPrecondition("scripted".to_owned()),
        }
    }
}

/// What one streaming session does.
///
/// `responses` fire in order once the cumulative count of audio requests
/// reaches each threshold.  With no script the session just absorbs audio
/// and half-closes when the client does.
#[derive(Debug, Default, Clone)]
pub struct SessionScript {
    pub responses: Vec<(usize, AnalyzeResponse)>,
    pub error_after: Option<(usize, MockError)>,
}

/// Every request one streaming session received, in arrival order.
#[derive(Debug, Default)]
pub struct RecordedSession {
    requests: Mutex<Vec<AnalyzeRequest>>,
}

impl RecordedSession {
    pub fn requests(&self) -> Vec<AnalyzeRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn audio_payloads(&self) -> Vec<Vec<u8>> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                AnalyzeRequest::Audio(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn first_audio(&self) -> Option<Vec<u8>> {
        self.audio_payloads().into_iter().next()
    }

    pub fn audio_concat(&self) -> Vec<u8> {
        self.audio_payloads().concat()
    }
}

pub struct MockConversationAi {
    project: String,
    location: String,
    profile: ConversationProfile,
    profile_requests: Mutex<Vec<String>>,
    conversations: Mutex<HashSet<String>>,
    participants: Mutex<HashMap<String, Vec<Participant>>>,
    completed: Mutex<Vec<String>>,
    summary_text: Mutex<Option<String>>,
    scripts: Mutex<VecDeque<SessionScript>>,
    sessions: Mutex<Vec<Arc<RecordedSession>>>,
}

impl Default for MockConversationAi {
    fn default() -> Self {
        Self::new("demo", "global")
    }
}

impl MockConversationAi {
    pub fn new(project: &str, location: &str) -> Self {
        MockConversationAi {
            project: project.to_owned(),
            location: location.to_owned(),
            profile: ConversationProfile {
                name: format!(
                    "projects/{project}/locations/{location}/conversationProfiles/cp-test"
                ),
                language_code: "en-US".to_owned(),
                stt_model: "phone_call".to_owned(),
            },
            profile_requests: Mutex::new(Vec::new()),
            conversations: Mutex::new(HashSet::new()),
            participants: Mutex::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
            summary_text: Mutex::new(Some("the caller discussed an order issue".to_owned())),
            scripts: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Queue the script for the next streaming session (FIFO).
    pub fn push_script(&self, script: SessionScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Replace the canned summary; `None` makes the provider return nothing.
    pub fn set_summary(&self, text: Option<&str>) {
        *self.summary_text.lock().unwrap() = text.map(ToOwned::to_owned);
    }

    pub fn conversations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.conversations.lock().unwrap().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn participants_for(&self, conversation_name: &str) -> Vec<Participant> {
        self.participants
            .lock()
            .unwrap()
            .get(conversation_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn profile_requests(&self) -> Vec<String> {
        self.profile_requests.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> Vec<Arc<RecordedSession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ConversationAi for MockConversationAi {
    async fn get_conversation_profile(
        &self,
        name: &str,
    ) -> Result<ConversationProfile, AiError> {
        self.profile_requests.lock().unwrap().push(name.to_owned());
        Ok(self.profile.clone())
    }

    async fn get_conversation(&self, name: &str) -> Result<Conversation, AiError> {
        if self.conversations.lock().unwrap().contains(name) {
            Ok(Conversation {
                name: name.to_owned(),
            })
        } else {
            Err(AiError::NotFound(name.to_owned()))
        }
    }

    async fn create_conversation(
        &self,
        _profile: &ConversationProfile,
        conversation_id: &str,
    ) -> Result<Conversation, AiError> {
        let name = format!(
            "projects/{}/locations/{}/conversations/{conversation_id}",
            self.project, self.location
        );
        self.conversations.lock().unwrap().insert(name.clone());
        Ok(Conversation { name })
    }

    async fn list_participants(
        &self,
        conversation_name: &str,
    ) -> Result<Vec<Participant>, AiError> {
        Ok(self.participants_for(conversation_name))
    }

    async fn create_participant(
        &self,
        conversation_name: &str,
        role: ParticipantRole,
    ) -> Result<Participant, AiError> {
        let mut participants = self.participants.lock().unwrap();
        let list = participants
            .entry(conversation_name.to_owned())
            .or_default();
        let participant = Participant {
            name: format!(
                "{conversation_name}/participants/{}-{}",
                role.as_str().to_lowercase(),
                list.len() + 1
            ),
            role,
        };
        list.push(participant.clone());
        Ok(participant)
    }

    async fn streaming_analyze_content(
        &self,
        mut requests: AnalyzeRequestStream,
    ) -> Result<AnalyzeResponseStream, AiError> {
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let session = Arc::new(RecordedSession::default());
        self.sessions.lock().unwrap().push(session.clone());

        let (tx, rx) = mpsc::unbounded_channel::<Result<AnalyzeResponse, AiError>>();
        tokio::spawn(async move {
            let mut pending = script.responses;
            let error_after = script.error_after;
            let mut audio_count = 0usize;

            while let Some(request) = requests.next().await {
                let is_audio = matches!(request, AnalyzeRequest::Audio(_));
                session.requests.lock().unwrap().push(request);
                if is_audio {
                    audio_count += 1;
                }

                while pending
                    .first()
                    .is_some_and(|(threshold, _)| *threshold <= audio_count)
                {
                    let (_, response) = pending.remove(0);
                    if tx.send(Ok(response)).is_err() {
                        return;
                    }
                }

                if let Some((threshold, kind)) = error_after {
                    if audio_count >= threshold {
                        let _ = tx.send(Err(kind.to_ai()));
                        // Dropping `requests` unblocks the worker's pump.
                        return;
                    }
                }
            }
            // Client half-closed; provider side closes cleanly.
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn complete_conversation(&self, conversation_name: &str) -> Result<(), AiError> {
        self.completed
            .lock()
            .unwrap()
            .push(conversation_name.to_owned());
        Ok(())
    }

    async fn suggest_conversation_summary(
        &self,
        _conversation_name: &str,
    ) -> Result<Option<ConversationSummary>, AiError> {
        Ok(self
            .summary_text
            .lock()
            .unwrap()
            .clone()
            .map(|text| ConversationSummary { text }))
    }
}
