//! In-process topic over a tokio broadcast channel
//!
//! Every subscription sees every message; `Subscription::recv` drops the
//! ones addressed to some other destination.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::capability::EventPublisher;
use crate::coordination::ManagedResource;
use crate::domain::{BusMessage, Delivery};
use crate::error::{QuoteSyncError, Result};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub struct ChannelPublisher {
    sender: Mutex<Option<broadcast::Sender<BusMessage>>>,
    delivery: Delivery,
}

impl ChannelPublisher {
    pub fn new(delivery: Delivery, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
            delivery,
        }
    }

    fn sender(&self) -> Option<broadcast::Sender<BusMessage>> {
        self.sender.lock().ok().and_then(|guard| guard.clone())
    }

    /// Register a consumer under `name`
    ///
    /// Fails with `PublishUnavailable` once the topic has been closed.
    pub fn subscribe(&self, name: &str) -> Result<Subscription> {
        let sender = self.sender().ok_or_else(|| {
            QuoteSyncError::PublishUnavailable("topic is closed".to_string())
        })?;
        debug!("Subscriber {} joined topic", name);
        Ok(Subscription {
            name: name.to_string(),
            receiver: sender.subscribe(),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender().map_or(0, |s| s.receiver_count())
    }

    /// Drop the sender; subscribers drain what is buffered, then see the end
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            if guard.take().is_some() {
                info!("Channel topic closed");
            }
        }
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, origin: &str, payload: serde_json::Value) -> Result<()> {
        let sender = self.sender().ok_or_else(|| {
            QuoteSyncError::PublishUnavailable("topic is closed".to_string())
        })?;

        let message = BusMessage::new(origin, &self.delivery, &payload);
        match sender.send(message) {
            Ok(receivers) => {
                debug!(receivers, delivery = %self.delivery, "Published {}", origin);
            }
            Err(_) => {
                info!(delivery = %self.delivery, "No subscribers for {}, message dropped", origin);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ManagedResource for ChannelPublisher {
    fn name(&self) -> &str {
        "channel-bus"
    }

    async fn release(&self) {
        self.close();
    }
}

/// Receiving half of a subscription
pub struct Subscription {
    name: String,
    receiver: broadcast::Receiver<BusMessage>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next message for this subscriber, `None` once the topic is closed
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.is_addressed_to(&self.name) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber {} lagged, skipped {} messages", self.name, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) if message.is_addressed_to(&self.name) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber {} lagged, skipped {} messages", self.name, skipped);
                }
                Err(_) => return None,
            }
        }
    }
}
