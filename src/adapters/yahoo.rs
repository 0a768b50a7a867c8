//! Yahoo Finance v8 chart adapter
//!
//! `GET {base}/finance/chart/{symbol}?interval=1d`, decoded into the first
//! OHLCV point of the first chart result.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::capability::QuoteSource;
use crate::domain::Quote;
use crate::error::{QuoteSyncError, Result};

pub const DEFAULT_YAHOO_BASE: &str = "https://query2.finance.yahoo.com/v8";
pub const DEFAULT_INTERVAL: &str = "1d";

// ==================== Response Schema ====================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

/// Yahoo reports missing points as `null`
#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn first(series: &[Option<f64>]) -> Option<f64> {
    series.first().copied().flatten()
}

impl QuoteSeries {
    fn first_point(&self, timestamp: i64) -> Option<Quote> {
        Some(Quote {
            timestamp,
            open: first(&self.open)?,
            high: first(&self.high)?,
            low: first(&self.low)?,
            close: first(&self.close)?,
            volume: first(&self.volume)?,
        })
    }
}

/// Decode a chart response body
///
/// `Ok(None)` when the response is well-formed but carries no complete
/// data point (empty or null result, empty timestamps, null values).
/// A body that does not match the chart shape is `SourceUnavailable`.
pub fn decode_chart(body: &[u8]) -> Result<Option<Quote>> {
    let response: ChartResponse = serde_json::from_slice(body).map_err(|e| {
        QuoteSyncError::SourceUnavailable(format!("unexpected chart response: {e}"))
    })?;

    let Some(result) = response.chart.result.as_ref().and_then(|r| r.first()) else {
        return Ok(None);
    };
    let Some(&timestamp) = result.timestamp.first() else {
        return Ok(None);
    };
    let Some(series) = result.indicators.quote.first() else {
        return Ok(None);
    };

    Ok(series.first_point(timestamp))
}

// ==================== Client ====================

/// Quote source backed by the Yahoo Finance chart endpoint
#[derive(Clone)]
pub struct YahooQuoteSource {
    http: Client,
    base_url: Url,
    interval: String,
}

impl YahooQuoteSource {
    pub fn new(base_url: &str, interval: &str, user_agent: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            QuoteSyncError::InvalidConfig(vec![format!("invalid source base_url '{base_url}': {e}")])
        })?;
        if base_url.cannot_be_a_base() {
            return Err(QuoteSyncError::InvalidConfig(vec![format!(
                "source base_url '{base_url}' cannot be a base URL"
            )]));
        }

        let http = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                QuoteSyncError::SourceUnavailable(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url,
            interval: interval.to_string(),
        })
    }

    /// Chart URL for a symbol; the symbol is percent-encoded as one path segment
    pub fn chart_url(&self, symbol: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["finance", "chart", symbol]);
        }
        url.query_pairs_mut().append_pair("interval", &self.interval);
        url
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    #[instrument(skip(self))]
    async fn fetch(&self, symbol: &str) -> Result<Option<Quote>> {
        let url = self.chart_url(symbol);

        let resp = self.http.get(url.clone()).send().await.map_err(|e| {
            QuoteSyncError::SourceUnavailable(format!("failed to fetch {}: {}", url, e))
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QuoteSyncError::SourceUnavailable(format!(
                "GET {} returned HTTP {}",
                url, status
            )));
        }

        let body = resp.bytes().await.map_err(|e| {
            QuoteSyncError::SourceUnavailable(format!("failed to read {}: {}", url, e))
        })?;

        let quote = decode_chart(&body)?;
        debug!(found = quote.is_some(), "Decoded chart for {}", symbol);
        Ok(quote)
    }
}
