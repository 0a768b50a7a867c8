//! Quote synchronization pipeline
//!
//! decode → fetch → (skip when absent) → persist → publish.
//! Fail-fast: nothing is retried here, and every failure reaches the caller
//! with its kind intact. Persist always completes before publish starts.

use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::capability::{EventPublisher, QuoteSource, QuoteStore};
use crate::domain::{Notification, NotificationEnvelope, UpdateEvent, QUOTE_UPDATED};
use crate::error::{QuoteSyncError, Result};

use super::metrics::PipelineMetrics;

/// Result of one successful run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Quote persisted and the update event published
    Updated(UpdateEvent),
    /// Source had no quote; nothing was written or published
    Skipped { symbol: String },
}

impl PipelineOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            PipelineOutcome::Updated(event) => &event.symbol,
            PipelineOutcome::Skipped { symbol } => symbol,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PipelineOutcome::Skipped { .. })
    }
}

pub struct QuoteSyncPipeline {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn QuoteStore>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<PipelineMetrics>,
}

impl QuoteSyncPipeline {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        store: Arc<dyn QuoteStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            source,
            store,
            publisher,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Read path for the stored quote
    pub fn store(&self) -> &Arc<dyn QuoteStore> {
        &self.store
    }

    /// Run from a bare notification body, `{"symbol": "..."}`
    pub async fn run(&self, raw: &str) -> Result<PipelineOutcome> {
        self.metrics.inc_received();
        match Notification::decode(raw) {
            Ok(notification) => self.execute(&notification).await,
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Run from a transport envelope wrapping the notification body
    pub async fn run_envelope(&self, raw: &str) -> Result<PipelineOutcome> {
        self.metrics.inc_received();
        match NotificationEnvelope::decode(raw) {
            Ok(notification) => self.execute(&notification).await,
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Run for an already decoded notification
    pub async fn process(&self, notification: &Notification) -> Result<PipelineOutcome> {
        self.metrics.inc_received();
        self.execute(notification).await
    }

    #[instrument(skip(self, notification), fields(symbol = %notification.symbol()))]
    async fn execute(&self, notification: &Notification) -> Result<PipelineOutcome> {
        match self.sync(notification.symbol()).await {
            Ok(PipelineOutcome::Skipped { symbol }) => {
                self.metrics.inc_skipped();
                info!(outcome = "skipped", "No quote found for {}", symbol);
                Ok(PipelineOutcome::Skipped { symbol })
            }
            Ok(outcome) => {
                self.metrics.inc_updated();
                info!(outcome = "updated", "Quote synchronized");
                Ok(outcome)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn sync(&self, symbol: &str) -> Result<PipelineOutcome> {
        let Some(quote) = self.source.fetch(symbol).await? else {
            return Ok(PipelineOutcome::Skipped {
                symbol: symbol.to_string(),
            });
        };

        self.store.persist(symbol, &quote).await?;

        let event = UpdateEvent::new(symbol, quote);
        self.publisher
            .publish(QUOTE_UPDATED, event.to_payload())
            .await?;

        Ok(PipelineOutcome::Updated(event))
    }

    fn fail(&self, e: QuoteSyncError) -> QuoteSyncError {
        self.metrics.record_failure(&e);
        error!(kind = e.kind(), "Pipeline run failed: {}", e);
        e
    }
}
