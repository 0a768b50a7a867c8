//! Capability contracts consumed by the pipeline
//!
//! Each contract is satisfied by more than one backend; the pipeline only
//! ever sees `Arc<dyn Trait>`.

use async_trait::async_trait;

use crate::domain::{Instrument, Quote};
use crate::error::Result;

/// Fetches the latest quote for a symbol
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `Ok(None)` means the source answered but had nothing for the symbol.
    /// Transport and malformed-response failures are `SourceUnavailable`.
    async fn fetch(&self, symbol: &str) -> Result<Option<Quote>>;
}

/// Persists and reads instrument quotes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Backend label for logs
    fn backend(&self) -> &'static str;

    /// Upsert: create the record when missing, otherwise overwrite its quote
    async fn persist(&self, symbol: &str, quote: &Quote) -> Result<()>;

    /// Live record by id, `NotFound` when missing or soft-deleted
    async fn get_by_id(&self, id: &str) -> Result<Instrument>;

    /// Live record by symbol, `NotFound` when missing or soft-deleted
    async fn get_by_symbol(&self, symbol: &str) -> Result<Instrument>;

    /// Stored quote for a live instrument
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let instrument = self.get_by_symbol(symbol).await?;
        instrument.quote.ok_or_else(|| {
            crate::error::QuoteSyncError::NotFound(format!("no quote stored for {symbol}"))
        })
    }
}

/// Sends structured messages to the event bus
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Delivery mode (direct or fan-out) is fixed by the backend's configuration
    /// and carried on the message, never chosen by the caller.
    async fn publish(&self, origin: &str, payload: serde_json::Value) -> Result<()>;
}
