//! Inbound notifications
//!
//! A notification names the instrument to refresh. It arrives either as a
//! bare JSON body or wrapped in a transport envelope whose single record
//! carries that body as a string.

use serde::Deserialize;

use crate::error::{QuoteSyncError, Result};

/// Inbound trigger for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    symbol: String,
}

#[derive(Deserialize)]
struct NotificationBody {
    symbol: String,
}

impl Notification {
    /// Build a notification, rejecting blank symbols
    pub fn new(symbol: impl Into<String>) -> Result<Self> {
        let symbol = symbol.into();
        let trimmed = symbol.trim();
        if trimmed.is_empty() {
            return Err(QuoteSyncError::Decode("symbol must not be empty".to_string()));
        }
        Ok(Self {
            symbol: trimmed.to_string(),
        })
    }

    /// Decode `{ "symbol": string }`; unknown fields are ignored
    pub fn decode(body: &str) -> Result<Self> {
        let parsed: NotificationBody = serde_json::from_str(body)
            .map_err(|e| QuoteSyncError::Decode(format!("invalid notification body: {e}")))?;
        Self::new(parsed.symbol)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Transport envelope: `{ "Records": [ { "Sns": { "Message": "<body>" } } ] }`
#[derive(Debug, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(rename = "Records")]
    records: Vec<EnvelopeRecord>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeRecord {
    #[serde(rename = "Sns")]
    sns: EnvelopeMessage,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMessage {
    #[serde(rename = "Message")]
    message: String,
}

impl NotificationEnvelope {
    /// Extract the notification body from an envelope holding exactly one record
    pub fn decode(raw: &str) -> Result<Notification> {
        let envelope: NotificationEnvelope = serde_json::from_str(raw)
            .map_err(|e| QuoteSyncError::Decode(format!("invalid envelope: {e}")))?;

        match envelope.records.as_slice() {
            [record] => Notification::decode(&record.sns.message),
            [] => Err(QuoteSyncError::Decode("envelope has no records".to_string())),
            records => Err(QuoteSyncError::Decode(format!(
                "envelope has {} records, expected exactly one",
                records.len()
            ))),
        }
    }
}
