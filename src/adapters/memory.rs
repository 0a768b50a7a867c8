//! In-process key-value instrument table
//!
//! Records are keyed by id; `persist` uses the symbol as the key, the same
//! way the document store does. A symbol lookup returns the most recently
//! written live record carrying that symbol.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::capability::QuoteStore;
use crate::domain::{Instrument, Quote};
use crate::error::{QuoteSyncError, Result};

struct Row {
    instrument: Instrument,
    /// Write order, bumped on every seed and persist
    revision: u64,
}

#[derive(Default)]
pub struct MemoryQuoteStore {
    table: DashMap<String, Row>,
    revisions: AtomicU64,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a record, replacing any existing one with the same id
    pub fn seed(&self, instrument: Instrument) {
        let revision = self.next_revision();
        self.table
            .insert(instrument.id.clone(), Row { instrument, revision });
    }

    fn next_revision(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark a record deleted; reads stop seeing it
    pub fn soft_delete(&self, id: &str) -> bool {
        match self.table.get_mut(id) {
            Some(mut row) => {
                row.instrument.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn persist(&self, symbol: &str, quote: &Quote) -> Result<()> {
        let revision = self.next_revision();
        self.table
            .entry(symbol.to_string())
            .and_modify(|row| {
                row.instrument.quote = Some(*quote);
                row.revision = revision;
            })
            .or_insert_with(|| Row {
                instrument: Instrument::from_quote(symbol, *quote),
                revision,
            });
        debug!("Stored quote for {}", symbol);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Instrument> {
        self.table
            .get(id)
            .map(|row| row.instrument.clone())
            .filter(Instrument::is_live)
            .ok_or_else(|| QuoteSyncError::NotFound(format!("instrument {id}")))
    }

    async fn get_by_symbol(&self, symbol: &str) -> Result<Instrument> {
        self.table
            .iter()
            .filter(|row| row.instrument.symbol == symbol && row.instrument.is_live())
            .max_by_key(|row| row.revision)
            .map(|row| row.instrument.clone())
            .ok_or_else(|| QuoteSyncError::NotFound(format!("instrument with symbol {symbol}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(close: f64) -> Quote {
        Quote {
            timestamp: 1,
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close,
            volume: 1000.0,
        }
    }

    #[tokio::test]
    async fn test_persist_is_upsert() {
        let store = MemoryQuoteStore::new();
        store.persist("NN.AS", &quote(10.5)).await.unwrap();
        store.persist("NN.AS", &quote(12.0)).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get_quote("NN.AS").await.unwrap().close, 12.0);
    }

    #[tokio::test]
    async fn test_persist_keeps_other_fields() {
        let store = MemoryQuoteStore::new();
        store.seed(Instrument {
            id: "NN.AS".into(),
            symbol: "NN.AS".into(),
            name: Some("NN Group".into()),
            isin: Some("NL0010773842".into()),
            quote: None,
            deleted_at: None,
        });

        store.persist("NN.AS", &quote(10.5)).await.unwrap();

        let instrument = store.get_by_id("NN.AS").await.unwrap();
        assert_eq!(instrument.name.as_deref(), Some("NN Group"));
        assert_eq!(instrument.quote, Some(quote(10.5)));
    }

    #[tokio::test]
    async fn test_soft_deleted_is_not_found() {
        let store = MemoryQuoteStore::new();
        store.persist("AAPL", &quote(1.0)).await.unwrap();
        assert!(store.soft_delete("AAPL"));

        assert_eq!(store.get_by_id("AAPL").await.unwrap_err().kind(), "not_found");
        assert_eq!(store.get_by_symbol("AAPL").await.unwrap_err().kind(), "not_found");
        assert!(!store.soft_delete("MSFT"));
    }

    #[tokio::test]
    async fn test_missing_quote_is_not_found() {
        let store = MemoryQuoteStore::new();
        assert_eq!(store.get_quote("TSLA").await.unwrap_err().kind(), "not_found");

        store.seed(Instrument {
            id: "i-1".into(),
            symbol: "TSLA".into(),
            name: None,
            isin: None,
            quote: None,
            deleted_at: None,
        });
        assert_eq!(store.get_by_symbol("TSLA").await.unwrap().id, "i-1");
        assert_eq!(store.get_quote("TSLA").await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_symbol_lookup_prefers_latest_write() {
        let store = MemoryQuoteStore::new();
        store.seed(Instrument {
            id: "i-1".into(),
            symbol: "TSLA".into(),
            name: Some("Tesla".into()),
            isin: None,
            quote: None,
            deleted_at: None,
        });

        // Persist keys by symbol, so this creates a second TSLA record
        store.persist("TSLA", &quote(250.0)).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_quote("TSLA").await.unwrap(), quote(250.0));
        assert_eq!(store.get_by_symbol("TSLA").await.unwrap().id, "TSLA");

        // Re-seeding the alias makes it the latest write again
        store.seed(Instrument {
            id: "i-1".into(),
            symbol: "TSLA".into(),
            name: Some("Tesla".into()),
            isin: None,
            quote: Some(quote(251.0)),
            deleted_at: None,
        });
        assert_eq!(store.get_by_symbol("TSLA").await.unwrap().id, "i-1");

        assert!(store.soft_delete("i-1"));
        assert_eq!(store.get_quote("TSLA").await.unwrap(), quote(250.0));
    }
}
