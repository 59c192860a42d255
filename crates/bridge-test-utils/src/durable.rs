//! Recording stand-in for the durable fallback publisher.

use audiohook::publisher::{DurablePublisher, PublishError, SummaryEvent};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct RecordingDurablePublisher {
    events: Mutex<Vec<SummaryEvent>>,
    failing: AtomicBool,
}

impl RecordingDurablePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SummaryEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Make subsequent publishes fail (broker-outage style).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DurablePublisher for RecordingDurablePublisher {
    async fn publish(&self, event: &SummaryEvent) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Status(503));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
