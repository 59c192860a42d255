//! Per-role audio streams and the two-channel demultiplexer.
//!
//! Binary Audiohook frames interleave one customer byte and one agent byte
//! per sample pair.  Each role owns an [`AudioStream`]: an unbounded inbound
//! queue written by the transport task, a retained chronological byte log
//! used for restart look-back, and the gate flags shared with the
//! recognition worker.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long the consumer blocks on the inbound queue before yielding control
/// back to the gate checks.
pub const QUEUE_RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Split an interleaved frame into `(customer, agent)` byte streams.
///
/// Even indices are the external (customer) channel, odd indices the
/// internal (agent) channel.  Callers must have validated an even length.
pub fn demux_frame(frame: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut customer = Vec::with_capacity(frame.len() / 2);
    let mut agent = Vec::with_capacity(frame.len() / 2);
    for pair in frame.chunks_exact(2) {
        customer.push(pair[0]);
        agent.push(pair[1]);
    }
    (customer, agent)
}

/// Outcome of one queue read.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkRead {
    /// One or more chunks drained from the queue, already appended to the
    /// retained log.
    Data(Vec<u8>),
    /// Nothing arrived within [`QUEUE_RECV_TIMEOUT`].
    TimedOut,
    /// The producer side is gone.
    Ended,
}

/// One role's audio stream.
///
/// Shared between the transport task (producer, gate writer) and the
/// recognition worker (consumer, offset writer).  All times are
/// milliseconds of processed audio; at 8 kHz µ-law one millisecond is
/// exactly eight bytes.
pub struct AudioStream {
    rate: u32,
    chunk_size: usize,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    /// Append-only log of every consumed byte, for restart look-back.
    retained: Mutex<Vec<u8>>,
    closed: AtomicBool,
    terminate: AtomicBool,
    is_final: AtomicBool,
    restart_counter: AtomicU32,
    /// Cumulative processed time across restarts; non-decreasing.
    last_start_time_ms: AtomicU64,
    /// Offset of the last final result within the current RPC session.
    is_final_offset_ms: AtomicU64,
    /// Offset of the most recent interim result within the current session.
    speech_end_offset_ms: AtomicU64,
}

impl AudioStream {
    pub fn new(rate: u32, chunk_size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        AudioStream {
            rate,
            chunk_size,
            tx,
            rx: tokio::sync::Mutex::new(rx),
            retained: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
            is_final: AtomicBool::new(false),
            restart_counter: AtomicU32::new(0),
            last_start_time_ms: AtomicU64::new(0),
            is_final_offset_ms: AtomicU64::new(0),
            speech_end_offset_ms: AtomicU64::new(0),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    // -- producer side ------------------------------------------------------

    /// Append a chunk from the wire.  Never blocks; chunks queued while the
    /// stream is paused are delivered to the next RPC session.
    pub fn fill_buffer(&self, chunk: Vec<u8>) {
        let _ = self.tx.send(chunk);
    }

    // -- gates --------------------------------------------------------------

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    pub fn set_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    pub fn is_final(&self) -> bool {
        self.is_final.load(Ordering::SeqCst)
    }

    pub fn set_is_final(&self) {
        self.is_final.store(true, Ordering::SeqCst);
    }

    // -- offsets ------------------------------------------------------------

    pub fn speech_end_offset_ms(&self) -> u64 {
        self.speech_end_offset_ms.load(Ordering::SeqCst)
    }

    pub fn set_speech_end_offset_ms(&self, offset_ms: u64) {
        self.speech_end_offset_ms.store(offset_ms, Ordering::SeqCst);
    }

    /// Record a final recognition result ending at `offset_ms` within the
    /// current RPC session.
    pub fn record_final(&self, offset_ms: u64) {
        self.is_final_offset_ms.store(offset_ms, Ordering::SeqCst);
        self.is_final.store(true, Ordering::SeqCst);
    }

    pub fn last_start_time_ms(&self) -> u64 {
        self.last_start_time_ms.load(Ordering::SeqCst)
    }

    pub fn restart_counter(&self) -> u32 {
        self.restart_counter.load(Ordering::SeqCst)
    }

    pub fn retained_len(&self) -> usize {
        self.retained.lock().unwrap().len()
    }

    // -- restart ------------------------------------------------------------

    /// Prepare a new RPC session and return the look-back replay payload.
    ///
    /// Folds the last final offset into the cumulative processed time, then
    /// takes the suffix of the retained log past the processed byte index,
    /// capped at `max_lookback_secs` of audio.  An empty return means the
    /// session starts fresh from live input only.
    pub fn begin_restart(&self, max_lookback_secs: u64) -> Vec<u8> {
        self.restart_counter.fetch_add(1, Ordering::SeqCst);
        self.is_final.store(false, Ordering::SeqCst);

        let total_processed_ms = self.last_start_time_ms.load(Ordering::SeqCst)
            + self.is_final_offset_ms.swap(0, Ordering::SeqCst);
        self.last_start_time_ms
            .store(total_processed_ms, Ordering::SeqCst);

        // One byte per sample at 8-bit µ-law.
        let processed_bytes = (total_processed_ms * u64::from(self.rate) / 1000) as usize;
        if processed_bytes == 0 {
            return Vec::new();
        }

        let retained = self.retained.lock().unwrap();
        let unprocessed = retained.len().saturating_sub(processed_bytes);
        let lookback_cap = (max_lookback_secs * u64::from(self.rate)) as usize;
        let need = unprocessed.min(lookback_cap);
        retained[retained.len() - need..].to_vec()
    }

    // -- consumer side ------------------------------------------------------

    /// Read the next batch of audio from the inbound queue.
    ///
    /// Blocks up to [`QUEUE_RECV_TIMEOUT`] for the first chunk, then drains
    /// whatever else is immediately available so one request carries a
    /// contiguous run.  Consumed bytes are appended to the retained log.
    pub async fn next_chunk(&self) -> ChunkRead {
        let mut rx = self.rx.lock().await;
        let first = match tokio::time::timeout(QUEUE_RECV_TIMEOUT, rx.recv()).await {
            Err(_) => return ChunkRead::TimedOut,
            Ok(None) => return ChunkRead::Ended,
            Ok(Some(chunk)) => chunk,
        };

        let mut data = first;
        while let Ok(chunk) = rx.try_recv() {
            data.extend_from_slice(&chunk);
        }
        drop(rx);

        self.retained.lock().unwrap().extend_from_slice(&data);
        ChunkRead::Data(data)
    }
}
