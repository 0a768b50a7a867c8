use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical name of the event announcing a refreshed quote
pub const QUOTE_UPDATED: &str = "quote_updated";

/// OHLCV snapshot for one instrument
///
/// All six fields are required; a source that cannot provide every one of
/// them reports the quote as absent instead of building a partial value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Stored instrument record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Instrument {
    /// Record created by the first quote persisted for a symbol
    pub fn from_quote(symbol: &str, quote: Quote) -> Self {
        Self {
            id: symbol.to_string(),
            symbol: symbol.to_string(),
            name: None,
            isin: None,
            quote: Some(quote),
            deleted_at: None,
        }
    }

    /// Soft-deleted records are invisible to every read
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Outbound payload published once per successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub symbol: String,
    pub quote: Quote,
}

impl UpdateEvent {
    pub fn new(symbol: impl Into<String>, quote: Quote) -> Self {
        Self {
            symbol: symbol.into(),
            quote,
        }
    }

    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "symbol": self.symbol,
            "quote": self.quote,
        })
    }
}
