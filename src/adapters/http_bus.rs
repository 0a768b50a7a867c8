//! HTTP topic publisher
//!
//! Posts each `BusMessage` as JSON to a topic endpoint (an SNS-style HTTP
//! subscription, a webhook relay, ...).

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, instrument};

use crate::capability::EventPublisher;
use crate::domain::{BusMessage, Delivery};
use crate::error::{QuoteSyncError, Result};

#[derive(Clone)]
pub struct HttpTopicPublisher {
    client: Client,
    topic_url: String,
    delivery: Delivery,
}

impl HttpTopicPublisher {
    pub fn new(topic_url: &str, delivery: Delivery) -> Result<Self> {
        let client = Client::builder().build().map_err(|e| {
            QuoteSyncError::PublishUnavailable(format!("failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            topic_url: topic_url.to_string(),
            delivery,
        })
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }
}

#[async_trait]
impl EventPublisher for HttpTopicPublisher {
    #[instrument(skip(self, payload), fields(delivery = %self.delivery))]
    async fn publish(&self, origin: &str, payload: serde_json::Value) -> Result<()> {
        let message = BusMessage::new(origin, &self.delivery, &payload);

        let resp = self
            .client
            .post(&self.topic_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                error!("Topic request failed: {}", e);
                QuoteSyncError::PublishUnavailable(format!(
                    "failed to reach topic {}: {}",
                    self.topic_url, e
                ))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Topic rejected message: {} - {}", status, body);
            return Err(QuoteSyncError::PublishUnavailable(format!(
                "topic returned HTTP {}: {}",
                status, body
            )));
        }

        debug!(message_id = %message.message_id, "Published {}", origin);
        Ok(())
    }
}
