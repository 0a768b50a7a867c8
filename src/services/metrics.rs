use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::QuoteSyncError;

/// Pipeline counters for observability
///
/// Skips are counted apart from failures so an absent quote never looks
/// like an outage on a dashboard.
pub struct PipelineMetrics {
    /// Notifications accepted for processing
    pub notifications_received: AtomicU64,
    /// Runs that persisted and published a quote
    pub quotes_updated: AtomicU64,
    /// Runs that ended without a quote
    pub quotes_skipped: AtomicU64,
    /// Failed runs, by error kind
    failures: DashMap<&'static str, u64>,
    started_at: i64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            notifications_received: AtomicU64::new(0),
            quotes_updated: AtomicU64::new(0),
            quotes_skipped: AtomicU64::new(0),
            failures: DashMap::new(),
            started_at: Utc::now().timestamp(),
        }
    }

    pub fn inc_received(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_updated(&self) {
        self.quotes_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.quotes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: &QuoteSyncError) {
        *self.failures.entry(error.kind()).or_insert(0) += 1;
    }

    pub fn failures(&self, kind: &str) -> u64 {
        self.failures.get(kind).map_or(0, |count| *count)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.iter().map(|entry| *entry.value()).sum()
    }

    /// Prometheus text exposition
    pub fn render_prometheus(&self) -> String {
        let uptime = (Utc::now().timestamp() - self.started_at).max(0);

        let mut out = format!(
            r#"# HELP quote_sync_uptime_seconds Uptime in seconds
# TYPE quote_sync_uptime_seconds counter
quote_sync_uptime_seconds {}

# HELP quote_sync_notifications_received_total Notifications accepted for processing
# TYPE quote_sync_notifications_received_total counter
quote_sync_notifications_received_total {}

# HELP quote_sync_quotes_updated_total Quotes persisted and published
# TYPE quote_sync_quotes_updated_total counter
quote_sync_quotes_updated_total {}

# HELP quote_sync_quotes_skipped_total Runs that found no quote for the symbol
# TYPE quote_sync_quotes_skipped_total counter
quote_sync_quotes_skipped_total {}

# HELP quote_sync_failures_total Failed runs by error kind
# TYPE quote_sync_failures_total counter
"#,
            uptime,
            self.notifications_received.load(Ordering::Relaxed),
            self.quotes_updated.load(Ordering::Relaxed),
            self.quotes_skipped.load(Ordering::Relaxed),
        );

        let mut failures: Vec<(&'static str, u64)> = self
            .failures
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        failures.sort_unstable();
        for (kind, count) in failures {
            out.push_str(&format!("quote_sync_failures_total{{kind=\"{kind}\"}} {count}\n"));
        }

        out
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
