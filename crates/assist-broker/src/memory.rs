//! In-process broker used by tests and single-process deployments.
//!
//! Same contract as the Redis implementation: last-writer-wins key/value,
//! at-most-once pub/sub, trailing-star pattern subscriptions.

use crate::{Broker, BrokerError, Subscription};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct MemoryBroker {
    kv: Mutex<HashMap<String, String>>,
    subscribers: Mutex<Vec<(String, mpsc::UnboundedSender<(String, String)>)>>,
    published: Mutex<Vec<(String, String)>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(channel, payload)` publish seen so far, in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

fn pattern_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => channel == pattern,
    }
}

#[async_trait::async_trait]
impl Broker for MemoryBroker {
    async fn set(&self, key: &str, value: &str) -> Result<(), BrokerError> {
        self.kv
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), BrokerError> {
        self.kv.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BrokerError> {
        Ok(self.kv.lock().unwrap().contains_key(key))
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        self.published
            .lock()
            .unwrap()
            .push((channel.to_owned(), payload.to_owned()));
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|(pattern, tx)| {
            if pattern_matches(pattern, channel) {
                tx.send((channel.to_owned(), payload.to_owned())).is_ok()
            } else {
                !tx.is_closed()
            }
        });
        Ok(())
    }

    async fn subscribe_pattern(&self, pattern: &str) -> Result<Subscription, BrokerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap()
            .push((pattern.to_owned(), tx));
        Ok(Subscription::new(rx))
    }
}
