//! Per-WebSocket session orchestrator.
//!
//! One orchestrator owns the transport socket, the protocol codec, both
//! per-role audio streams, and the task handles spawned for a real
//! conversation.  All outbound control messages are built and sent from the
//! transport task, so the server sequence number has a single writer.

use crate::audio::{AudioStream, demux_frame};
use crate::config::Config;
use crate::dialogflow::{
    AiError, ConversationAi, Participant, ParticipantRole, audio_config, conversation_name,
    find_participant_by_role, normalize_conversation_id,
};
use crate::summary::{self, TickerDeps};
use crate::worker::{SpeakerRole, TranscriptSegment, WorkerContext, run_worker};
use crate::AppState;
use assist_broker::{Broker, strip_location};
use audiohook_protocol::{self as protocol, AudioHook, MessageType, ProtocolMessage};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How many broker polls to make for a routing entry before resuming anyway.
const AWAIT_BROKER_COUNTER: u32 = 2;
const AWAIT_BROKER_INTERVAL: Duration = Duration::from_millis(500);

/// Out-of-band directives from concurrent tasks to the transport task.
enum Outbound {
    Resume,
}

/// State held once a real (non-probe) conversation is open.
struct OpenConversation {
    conversation_name: String,
    agent_ctx: WorkerContext,
    customer_ctx: WorkerContext,
    agent_worker: JoinHandle<()>,
    customer_worker: JoinHandle<()>,
    summary_ticker: JoinHandle<()>,
    ticker_stop: watch::Sender<bool>,
}

pub async fn ws_audiohook_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if presented != Some(state.config.api_key.as_str()) {
        warn!("audiohook upgrade rejected: missing or wrong API key");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_audiohook_socket(socket, state))
        .into_response()
}

async fn handle_audiohook_socket(mut socket: WebSocket, state: AppState) {
    let config = state.config.clone();
    let agent_stream = Arc::new(AudioStream::new(config.rate, config.chunk_size));
    let customer_stream = Arc::new(AudioStream::new(config.rate, config.chunk_size));
    let mut codec = AudioHook::new();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let (results_tx, mut results_rx) = mpsc::unbounded_channel::<TranscriptSegment>();
    let mut open_conversation: Option<OpenConversation> = None;

    info!("audiohook client connected");

    loop {
        tokio::select! {
            Some(directive) = outbound_rx.recv() => match directive {
                Outbound::Resume => {
                    if send_message(&mut socket, codec.resume_message()).await.is_err() {
                        break;
                    }
                }
            },
            Some(segment) = results_rx.recv() => log_segment(&segment),
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let control = match protocol::decode_control(&text) {
                            Ok(control) => control,
                            Err(e) => {
                                warn!(error = %e, "dropping malformed control frame");
                                continue;
                            }
                        };
                        codec.observe(&control);
                        debug!(kind = ?control.kind, seq = control.seq, "control message");

                        match control.kind {
                            MessageType::Open => {
                                if protocol::select_media(control.parameters.media.as_deref())
                                    .is_none()
                                {
                                    warn!("no acceptable media offered, closing session");
                                    let _ = send_message(&mut socket, codec.closed_message()).await;
                                    break;
                                }
                                if control.is_probe() {
                                    info!("connection probe, no conversation created");
                                    if send_message(&mut socket, codec.opened_message())
                                        .await
                                        .is_err()
                                    {
                                        break;
                                    }
                                } else if open_conversation.is_none() {
                                    match process_open(
                                        &state,
                                        control.conversation_id(),
                                        &agent_stream,
                                        &customer_stream,
                                        &results_tx,
                                        &outbound_tx,
                                    )
                                    .await
                                    {
                                        Ok(open) => {
                                            open_conversation = Some(open);
                                            if send_message(&mut socket, codec.opened_message())
                                                .await
                                                .is_err()
                                            {
                                                break;
                                            }
                                        }
                                        Err(e) => {
                                            error!(error = %e, "conversation open failed");
                                            let _ = send_message(
                                                &mut socket,
                                                codec.closed_message(),
                                            )
                                            .await;
                                            break;
                                        }
                                    }
                                } else {
                                    warn!("duplicate open ignored");
                                }
                            }
                            MessageType::Ping => {
                                if send_message(&mut socket, codec.pong_message()).await.is_err() {
                                    break;
                                }
                            }
                            MessageType::Close => {
                                if let Some(open) = open_conversation.take() {
                                    close_conversation(
                                        &mut socket,
                                        &state,
                                        &mut codec,
                                        &agent_stream,
                                        &customer_stream,
                                        open,
                                        config.timeout_secs,
                                    )
                                    .await;
                                } else {
                                    // Probe teardown; nothing to complete.
                                    let _ = send_message(&mut socket, codec.closed_message()).await;
                                }
                                break;
                            }
                            MessageType::Paused => {
                                agent_stream.set_closed(true);
                                customer_stream.set_closed(true);
                                debug!("audio stream paused");
                            }
                            MessageType::Resumed => {
                                agent_stream.set_closed(false);
                                customer_stream.set_closed(false);
                                if let Some(open) = open_conversation.as_mut() {
                                    if open.agent_worker.is_finished() {
                                        open.agent_worker =
                                            tokio::spawn(run_worker(open.agent_ctx.clone()));
                                    }
                                    if open.customer_worker.is_finished() {
                                        open.customer_worker =
                                            tokio::spawn(run_worker(open.customer_ctx.clone()));
                                    }
                                }
                                debug!("audio stream resumed");
                            }
                            MessageType::Discarded => {
                                info!(
                                    start = control.parameters.start.as_deref().unwrap_or(""),
                                    duration =
                                        control.parameters.duration.as_deref().unwrap_or(""),
                                    "audio discarded while paused"
                                );
                            }
                            other => {
                                warn!(kind = ?other, "unexpected inbound message kind, dropped");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(frame))) => {
                        handle_audio_frame(
                            &frame,
                            &agent_stream,
                            &customer_stream,
                            open_conversation.is_some(),
                        );
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("audiohook transport closed");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Teardown for sessions that ended without the close exchange (transport
    // error or peer vanish).  The conversation is left incomplete on the
    // provider side on purpose.
    if let Some(open) = open_conversation.take() {
        agent_stream.set_closed(true);
        customer_stream.set_closed(true);
        agent_stream.set_terminate();
        customer_stream.set_terminate();
        join_conversation_tasks(open, Duration::from_secs(config.timeout_secs)).await;
    }
    info!("audiohook session ended");
}

/// Handle a real `open`: make sure conversation and participants exist at
/// the provider, spawn both workers and the summary ticker, and start the
/// await-subscriber task that eventually emits `resume`.
async fn process_open(
    state: &AppState,
    conversation_id: &str,
    agent_stream: &Arc<AudioStream>,
    customer_stream: &Arc<AudioStream>,
    results_tx: &mpsc::UnboundedSender<TranscriptSegment>,
    outbound_tx: &mpsc::UnboundedSender<Outbound>,
) -> Result<OpenConversation, AiError> {
    let config = &state.config;
    let ai = state.ai.clone();

    let profile = ai
        .get_conversation_profile(&config.conversation_profile_name)
        .await?;
    let agent_audio_config = audio_config(&profile, config.rate);
    let customer_audio_config = agent_audio_config.clone();

    let normalized_id = normalize_conversation_id(conversation_id);
    let name = conversation_name(&config.project_id, &config.location_id, &normalized_id);
    match ai.get_conversation(&name).await {
        Ok(_) => {}
        Err(AiError::NotFound(_)) => {
            info!(conversation_id = %normalized_id, "conversation not found, creating");
            ai.create_conversation(&profile, &normalized_id).await?;
        }
        Err(e) => return Err(e),
    }

    let participants = ai.list_participants(&name).await?;
    let participant_agent =
        match find_participant_by_role(ParticipantRole::HumanAgent, &participants) {
            Some(participant) => participant.clone(),
            None => {
                ai.create_participant(&name, ParticipantRole::HumanAgent)
                    .await?
            }
        };
    let participant_user = match find_participant_by_role(ParticipantRole::EndUser, &participants)
    {
        Some(participant) => participant.clone(),
        None => ai.create_participant(&name, ParticipantRole::EndUser).await?,
    };
    info!(
        conversation = %name,
        agent = %participant_agent.name,
        user = %participant_user.name,
        "conversation ready, starting recognition workers"
    );

    let agent_ctx = worker_context(
        state,
        agent_stream,
        participant_agent,
        agent_audio_config,
        SpeakerRole::Agent,
        results_tx,
    );
    let customer_ctx = worker_context(
        state,
        customer_stream,
        participant_user,
        customer_audio_config,
        SpeakerRole::Customer,
        results_tx,
    );
    let agent_worker = tokio::spawn(run_worker(agent_ctx.clone()));
    let customer_worker = tokio::spawn(run_worker(customer_ctx.clone()));

    let (ticker_stop, ticker_stop_rx) = watch::channel(false);
    let summary_ticker = tokio::spawn(summary::run_summary_ticker(
        TickerDeps {
            ai: ai.clone(),
            broker: state.broker.clone(),
            durable: state.durable.clone(),
            conversation_name: name.clone(),
            interval: Duration::from_secs(config.summary_interval_secs),
        },
        ticker_stop_rx,
    ));

    // The UI side has up to ~1 s to take the room before audio resumes;
    // resume goes out either way.
    let broker = state.broker.clone();
    let stripped = strip_location(&name);
    let outbound = outbound_tx.clone();
    tokio::spawn(async move {
        let found = await_subscriber(broker.as_ref(), &stripped).await;
        debug!(subscriber_found = found, "resuming audio stream");
        let _ = outbound.send(Outbound::Resume);
    });

    Ok(OpenConversation {
        conversation_name: name,
        agent_ctx,
        customer_ctx,
        agent_worker,
        customer_worker,
        summary_ticker,
        ticker_stop,
    })
}

fn worker_context(
    state: &AppState,
    stream: &Arc<AudioStream>,
    participant: Participant,
    audio_config: crate::dialogflow::AudioConfig,
    role: SpeakerRole,
    results_tx: &mpsc::UnboundedSender<TranscriptSegment>,
) -> WorkerContext {
    WorkerContext {
        ai: state.ai.clone(),
        stream: stream.clone(),
        participant,
        audio_config,
        role,
        results: results_tx.clone(),
        max_lookback_secs: state.config.max_lookback_secs,
    }
}

/// Poll the broker for a routing entry, up to the bounded wait.
pub async fn await_subscriber(broker: &dyn Broker, conversation_name_stripped: &str) -> bool {
    let mut counter = AWAIT_BROKER_COUNTER;
    let mut exists = broker
        .exists(conversation_name_stripped)
        .await
        .unwrap_or(false);
    while !exists && counter > 0 {
        tokio::time::sleep(AWAIT_BROKER_INTERVAL).await;
        exists = broker
            .exists(conversation_name_stripped)
            .await
            .unwrap_or(false);
        counter -= 1;
    }
    exists
}

/// Graceful close of a real conversation.
async fn close_conversation(
    socket: &mut WebSocket,
    state: &AppState,
    codec: &mut AudioHook,
    agent_stream: &Arc<AudioStream>,
    customer_stream: &Arc<AudioStream>,
    open: OpenConversation,
    timeout_secs: u64,
) {
    agent_stream.set_closed(true);
    customer_stream.set_closed(true);
    agent_stream.set_terminate();
    customer_stream.set_terminate();

    let _ = send_message(socket, codec.closed_message()).await;

    if let Err(e) = state
        .ai
        .complete_conversation(&open.conversation_name)
        .await
    {
        error!(conversation = %open.conversation_name, error = %e, "complete conversation failed");
    }

    join_conversation_tasks(open, Duration::from_secs(timeout_secs)).await;
}

async fn join_conversation_tasks(open: OpenConversation, grace: Duration) {
    let OpenConversation {
        conversation_name,
        agent_worker,
        customer_worker,
        summary_ticker,
        ticker_stop,
        ..
    } = open;
    let _ = ticker_stop.send(true);

    let joins = async {
        let _ = agent_worker.await;
        let _ = customer_worker.await;
        let _ = summary_ticker.await;
    };
    if tokio::time::timeout(grace, joins).await.is_err() {
        warn!(conversation = %conversation_name, "workers did not stop within the grace period");
    }
}

fn handle_audio_frame(
    frame: &[u8],
    agent_stream: &AudioStream,
    customer_stream: &AudioStream,
    opened: bool,
) {
    if let Err(e) = protocol::validate_audio_frame(frame) {
        warn!(error = %e, "dropping audio frame");
        return;
    }
    if !opened {
        debug!(len = frame.len(), "audio frame before open, ignoring");
        return;
    }
    let (customer, agent) = demux_frame(frame);
    customer_stream.fill_buffer(customer);
    agent_stream.fill_buffer(agent);
}

fn log_segment(segment: &TranscriptSegment) {
    if segment.is_final {
        info!(
            role = segment.role.as_str(),
            transcript = %segment.transcript,
            confidence = segment.confidence,
            end_offset_ms = segment.speech_end_offset_ms,
            "final transcript"
        );
    } else {
        info!(
            role = segment.role.as_str(),
            transcript = %segment.transcript,
            end_offset_ms = segment.speech_end_offset_ms,
            "interim transcript"
        );
    }
}

async fn send_message(socket: &mut WebSocket, message: ProtocolMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(&message) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            error!(error = %e, "outbound message failed to serialize");
            Ok(())
        }
    }
}
