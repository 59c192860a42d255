//! Recognition worker behavior across RPC session boundaries.

use audiohook::audio::AudioStream;
use audiohook::dialogflow::{AudioConfig, Participant, ParticipantRole};
use audiohook::worker::{SpeakerRole, WorkerContext, run_worker};
use bridge_test_utils::{MockConversationAi, MockError, SessionScript, final_response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn worker_ctx(
    ai: Arc<MockConversationAi>,
    stream: Arc<AudioStream>,
) -> (
    WorkerContext,
    mpsc::UnboundedReceiver<audiohook::worker::TranscriptSegment>,
) {
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let ctx = WorkerContext {
        ai,
        stream,
        participant: Participant {
            name: "projects/demo/conversations/a1/participants/end_user-1".to_owned(),
            role: ParticipantRole::EndUser,
        },
        audio_config: AudioConfig {
            sample_rate_hertz: 8000,
            language_code: "en-US".to_owned(),
            model: "phone_call".to_owned(),
        },
        role: SpeakerRole::Customer,
        results: results_tx,
        max_lookback_secs: 3,
    };
    (ctx, results_rx)
}

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn stop_worker(stream: &AudioStream, handle: JoinHandle<()>) {
    stream.set_terminate();
    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("worker did not observe terminate")
        .expect("worker panicked");
}

/// After a final at 500 ms, the next session's first audio request is
/// exactly the retained-log suffix past the 4000 processed bytes.
#[tokio::test]
async fn restart_after_final_replays_exactly_the_unprocessed_suffix() {
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    ai.push_script(SessionScript {
        responses: vec![(1, final_response("I need help with my order", 500))],
        ..SessionScript::default()
    });
    let stream = Arc::new(AudioStream::new(8000, 1600));
    let (ctx, mut results_rx) = worker_ctx(ai.clone(), stream.clone());

    let audio: Vec<u8> = (0..8000u32).map(|i| (i % 251) as u8).collect();
    stream.fill_buffer(audio.clone());
    let handle = tokio::spawn(run_worker(ctx));

    wait_for("a second recognition session with audio", || {
        ai.sessions().len() >= 2 && ai.sessions()[1].first_audio().is_some()
    })
    .await;
    stop_worker(&stream, handle).await;

    let sessions = ai.sessions();
    // Session 1 saw the live audio, no replay (nothing processed yet).
    assert_eq!(sessions[0].first_audio().unwrap(), audio);
    // Session 2 starts with the suffix after the final boundary, in one payload.
    assert_eq!(sessions[1].first_audio().unwrap(), audio[4000..].to_vec());

    let segment = results_rx.recv().await.expect("transcript forwarded");
    assert!(segment.is_final);
    assert_eq!(segment.transcript, "I need help with my order");
    assert_eq!(segment.speech_end_offset_ms, 500);
    assert_eq!(segment.role, SpeakerRole::Customer);
}

/// Bytes produced while the stream is paused survive in the queue and reach
/// the RPC session started after resume.
#[tokio::test]
async fn audio_fed_while_paused_is_delivered_after_resume() {
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    let stream = Arc::new(AudioStream::new(8000, 1600));
    stream.set_closed(true);
    let (ctx, _results_rx) = worker_ctx(ai.clone(), stream.clone());
    let handle = tokio::spawn(run_worker(ctx));

    // 1 s of audio while paused; no session may consume it yet.
    stream.fill_buffer(vec![0x42; 8000]);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(ai.session_count(), 0, "paused worker must not open sessions");

    stream.set_closed(false);
    wait_for("the post-resume session to carry the paused audio", || {
        ai.sessions()
            .iter()
            .any(|s| s.audio_concat() == vec![0x42; 8000])
    })
    .await;
    stop_worker(&stream, handle).await;
}

/// A provider error parks the worker (closed gate) until the next resume.
#[tokio::test]
async fn provider_error_parks_worker_until_resume() {
    let ai = Arc::new(MockConversationAi::new("demo", "global"));
    ai.push_script(SessionScript {
        error_after: Some((1, MockError::OutOfRange)),
        ..SessionScript::default()
    });
    let stream = Arc::new(AudioStream::new(8000, 1600));
    let (ctx, _results_rx) = worker_ctx(ai.clone(), stream.clone());
    let handle = tokio::spawn(run_worker(ctx));

    stream.fill_buffer(vec![1; 800]);
    wait_for("the error to close the stream", || stream.is_closed()).await;

    // Parked: no further sessions while closed.
    let sessions_after_error = ai.session_count();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(ai.session_count(), sessions_after_error);

    // Resume restarts recognition.
    stream.set_closed(false);
    wait_for("a session after resume", || {
        ai.session_count() > sessions_after_error
    })
    .await;
    stop_worker(&stream, handle).await;
}
