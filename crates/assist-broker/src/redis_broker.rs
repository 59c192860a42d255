//! Redis-backed broker.
//!
//! Key/value commands go through a `ConnectionManager` (auto-reconnecting);
//! each pattern subscription holds its own pub/sub connection and forwards
//! messages through an unbounded channel so slow consumers never stall the
//! Redis read loop.

use crate::{Broker, BrokerError, Subscription};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::warn;

pub struct RedisBroker {
    client: redis::Client,
    manager: redis::aio::ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(host: &str, port: u16) -> Result<Self, BrokerError> {
        let client = redis::Client::open(format!("redis://{host}:{port}/"))?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { client, manager })
    }
}

#[async_trait::async_trait]
impl Broker for RedisBroker {
    async fn set(&self, key: &str, value: &str) -> Result<(), BrokerError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let mut conn = self.manager.clone();
        Ok(redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await?)
    }

    async fn delete(&self, key: &str) -> Result<(), BrokerError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BrokerError> {
        let mut conn = self.manager.clone();
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(count != 0)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        let mut conn = self.manager.clone();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn subscribe_pattern(&self, pattern: &str) -> Result<Subscription, BrokerError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pattern = pattern.to_owned();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(message) = stream.next().await {
                let channel = message.get_channel_name().to_owned();
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "non-UTF8 broker payload dropped");
                        continue;
                    }
                };
                if tx.send((channel, payload)).is_err() {
                    // Subscriber gone; tear down the pub/sub connection.
                    break;
                }
            }
        });

        Ok(Subscription::new(rx))
    }
}
