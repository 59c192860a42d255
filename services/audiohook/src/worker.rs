//! Restartable recognition worker, one per role.
//!
//! Each worker drives a sequence of streaming-recognition RPC sessions
//! against the provider.  A session is one `Config` request, audio payloads,
//! then a `Final` half-close; the provider caps session duration near 120 s,
//! so the worker forces a half-close at 110 s of recognized speech and
//! replays a bounded look-back window when the next session starts.
//!
//! Gates: `closed` idles the worker until `resumed`; `terminate` ends it.

use crate::audio::{AudioStream, ChunkRead};
use crate::dialogflow::{
    AiError, AnalyzeRequest, AnalyzeResponse, AudioConfig, ConversationAi, Participant,
};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

/// Force a client half-close once recognized speech passes this offset,
/// pre-empting the provider's hard duration cap.
const FORCED_HALF_CLOSE_OFFSET_MS: u64 = 110_000;

/// Gate re-check cadence while the stream is paused.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerRole {
    Agent,
    Customer,
}

impl SpeakerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            SpeakerRole::Agent => "agent",
            SpeakerRole::Customer => "customer",
        }
    }
}

/// A recognition result forwarded to the session observer, tagged by role.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub role: SpeakerRole,
    pub transcript: String,
    pub is_final: bool,
    pub speech_end_offset_ms: u64,
    pub confidence: f32,
}

/// Everything a worker needs; cloned when the orchestrator respawns a worker
/// after `resumed`.
#[derive(Clone)]
pub struct WorkerContext {
    pub ai: Arc<dyn ConversationAi>,
    pub stream: Arc<AudioStream>,
    pub participant: Participant,
    pub audio_config: AudioConfig,
    pub role: SpeakerRole,
    pub results: mpsc::UnboundedSender<TranscriptSegment>,
    pub max_lookback_secs: u64,
}

/// Worker entry point.  Returns when `terminate` is observed.
pub async fn run_worker(ctx: WorkerContext) {
    debug!(
        role = ctx.role.as_str(),
        participant = %ctx.participant.name,
        "recognition worker started"
    );
    while !ctx.stream.is_terminated() {
        if ctx.stream.is_closed() {
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
            continue;
        }
        run_rpc_session(&ctx).await;
    }
    debug!(role = ctx.role.as_str(), "recognition worker terminated");
}

/// One RPC session: replay the look-back, stream live audio, consume results
/// until the provider half-closes or fails.
async fn run_rpc_session(ctx: &WorkerContext) {
    let replay = ctx.stream.begin_restart(ctx.max_lookback_secs);
    debug!(
        role = ctx.role.as_str(),
        restart = ctx.stream.restart_counter(),
        replay_bytes = replay.len(),
        "starting recognition session"
    );

    let (request_tx, request_rx) = mpsc::channel::<AnalyzeRequest>(32);
    if request_tx
        .send(AnalyzeRequest::Config {
            participant: ctx.participant.name.clone(),
            config: ctx.audio_config.clone(),
        })
        .await
        .is_err()
    {
        return;
    }

    let mut responses = match ctx
        .ai
        .streaming_analyze_content(Box::pin(ReceiverStream::new(request_rx)))
        .await
    {
        Ok(responses) => responses,
        Err(e) => {
            handle_session_error(ctx, &e);
            return;
        }
    };

    let pump = tokio::spawn(pump_requests(ctx.stream.clone(), request_tx, replay));

    while let Some(item) = responses.next().await {
        match item {
            Ok(response) => handle_response(ctx, response),
            Err(e) => {
                handle_session_error(ctx, &e);
                break;
            }
        }
    }

    // Dropping the response stream tears down the request side, so the pump
    // cannot stay blocked on a dead channel.
    drop(responses);
    let _ = pump.await;
}

/// Feed audio into the request channel until a gate flips, the forced
/// half-close offset is reached, or the queue runs dry.
async fn pump_requests(
    stream: Arc<AudioStream>,
    request_tx: mpsc::Sender<AnalyzeRequest>,
    replay: Vec<u8>,
) {
    // The replay is a single payload: the first audio request of a session
    // is exactly the unprocessed suffix of the retained log.
    if !replay.is_empty() {
        debug!(replay_bytes = replay.len(), "replaying look-back audio");
        if request_tx
            .send(AnalyzeRequest::Audio(replay))
            .await
            .is_err()
        {
            return;
        }
    }

    loop {
        if stream.is_closed() || stream.is_final() || stream.is_terminated() {
            break;
        }
        if stream.speech_end_offset_ms() > FORCED_HALF_CLOSE_OFFSET_MS {
            debug!("forcing half-close ahead of provider duration cap");
            stream.set_is_final();
            break;
        }
        match stream.next_chunk().await {
            ChunkRead::Data(data) => {
                if request_tx.send(AnalyzeRequest::Audio(data)).await.is_err() {
                    return;
                }
            }
            // An idle queue ends this session; the outer loop starts the
            // next one unless the stream was paused meanwhile.
            ChunkRead::TimedOut => break,
            ChunkRead::Ended => break,
        }
    }

    let _ = request_tx.send(AnalyzeRequest::Final).await;
}

fn handle_response(ctx: &WorkerContext, response: AnalyzeResponse) {
    let Some(recognition) = response.recognition else {
        return;
    };
    let transcript = recognition.transcript.trim();
    if transcript.chars().count() < 2 {
        debug!(role = ctx.role.as_str(), "skipping empty recognition result");
        return;
    }

    let offset = recognition.speech_end_offset;
    // Interim offsets mirror at whole-second granularity; finals keep the
    // sub-second part for the restart boundary.
    ctx.stream.set_speech_end_offset_ms(offset.as_secs() * 1000);

    let speech_end_offset_ms = if recognition.is_final {
        let offset_ms = offset.as_millis() as u64;
        ctx.stream.record_final(offset_ms);
        offset_ms
    } else {
        offset.as_secs() * 1000
    };

    let _ = ctx.results.send(TranscriptSegment {
        role: ctx.role,
        transcript: transcript.to_owned(),
        is_final: recognition.is_final,
        speech_end_offset_ms,
        confidence: recognition.confidence,
    });
}

fn handle_session_error(ctx: &WorkerContext, error: &AiError) {
    match error {
        AiError::OutOfRange => {
            warn!(
                role = ctx.role.as_str(),
                "recognition session hit the provider duration cap"
            );
        }
        AiError::FailedPrecondition(message) | AiError::ResourceExhausted(message) => {
            warn!(
                role = ctx.role.as_str(),
                error = %message,
                "recognition session closed by provider"
            );
        }
        other => {
            error!(
                role = ctx.role.as_str(),
                error = %other,
                "recognition session failed"
            );
        }
    }
    // All session errors park the worker until the next resume.
    ctx.stream.set_closed(true);
}
