//! End-to-end runs over the in-process backends: memory store, channel bus,
//! and a scripted quote source, driven through the HTTP router.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use quote_sync::adapters::{ChannelPublisher, MemoryQuoteStore};
use quote_sync::domain::{Delivery, Instrument};
use quote_sync::services::router;
use quote_sync::{
    Capabilities, CapabilityRegistry, Quote, QuoteSource, QuoteStore, QuoteSyncError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Source answering from a fixed table; `FAIL` is unreachable
struct ScriptedSource {
    quotes: HashMap<String, Quote>,
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch(&self, symbol: &str) -> quote_sync::Result<Option<Quote>> {
        if symbol == "FAIL" {
            return Err(QuoteSyncError::SourceUnavailable("upstream timeout".into()));
        }
        Ok(self.quotes.get(symbol).copied())
    }
}

fn nn_quote() -> Quote {
    Quote {
        timestamp: 1,
        open: 10.0,
        high: 11.0,
        low: 9.0,
        close: 10.5,
        volume: 1000.0,
    }
}

struct Harness {
    store: Arc<MemoryQuoteStore>,
    bus: Arc<ChannelPublisher>,
    app: axum::Router,
}

fn harness(delivery: Delivery) -> Harness {
    let source = ScriptedSource {
        quotes: HashMap::from([("NN.AS".to_string(), nn_quote())]),
    };
    let store = Arc::new(MemoryQuoteStore::new());
    let bus = Arc::new(ChannelPublisher::new(delivery, 16));

    let registry = CapabilityRegistry::with_capabilities(Capabilities {
        source: Arc::new(source),
        store: Arc::clone(&store) as Arc<dyn QuoteStore>,
        publisher: Arc::clone(&bus) as Arc<dyn quote_sync::EventPublisher>,
    });
    let app = router(Arc::new(registry.pipeline()));

    Harness { store, bus, app }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn notification_updates_store_and_fans_out() {
    let h = harness(Delivery::Fanout);
    let mut portfolio = h.bus.subscribe("portfolio").unwrap();
    let mut alerts = h.bus.subscribe("alerts").unwrap();

    let (status, body) = send(&h.app, "POST", "/notifications", r#"{"symbol":"NN.AS"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "updated");
    assert_eq!(body["symbol"], "NN.AS");
    assert_eq!(body["quote"]["close"], 10.5);

    tokio_test::assert_ok!(h.store.get_quote("NN.AS").await);
    assert_eq!(h.store.get_quote("NN.AS").await.unwrap(), nn_quote());

    for sub in [&mut portfolio, &mut alerts] {
        let message = sub.try_recv().expect("fan-out message");
        assert_eq!(message.attributes.source, "quote_updated");
        assert_eq!(message.attributes.exchange_type, "fanout");
        assert_eq!(
            message.payload().unwrap(),
            json!({"symbol": "NN.AS", "quote": serde_json::to_value(nn_quote()).unwrap()})
        );
    }
}

#[tokio::test]
async fn direct_delivery_reaches_one_destination() {
    let h = harness(Delivery::Direct {
        destination: "portfolio".to_string(),
    });
    let mut portfolio = h.bus.subscribe("portfolio").unwrap();
    let mut alerts = h.bus.subscribe("alerts").unwrap();

    let envelope = json!({
        "Records": [{"Sns": {"Message": "{\"symbol\":\"NN.AS\"}"}}]
    });
    let (status, body) = send(&h.app, "POST", "/events", &envelope.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "updated");

    let message = portfolio.try_recv().expect("direct message");
    assert_eq!(message.attributes.destination, "portfolio");
    assert_eq!(message.attributes.exchange_type, "direct");
    assert!(alerts.try_recv().is_none());
}

#[tokio::test]
async fn unknown_symbol_is_skipped_without_side_effects() {
    let h = harness(Delivery::Fanout);
    let mut sub = h.bus.subscribe("portfolio").unwrap();

    let (status, body) = send(&h.app, "POST", "/notifications", r#"{"symbol":"MSFT"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "skipped", "symbol": "MSFT"}));
    assert!(h.store.is_empty());
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn failures_map_to_status_codes() {
    let h = harness(Delivery::Fanout);

    let (status, body) = send(&h.app, "POST", "/notifications", r#"{"sym":"NN.AS"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "decode_error");

    let (status, body) = send(&h.app, "POST", "/notifications", r#"{"symbol":"FAIL"}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "source_unavailable");

    let (status, body) = send(&h.app, "POST", "/events", r#"{"Records":[]}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "decode_error");

    assert!(h.store.is_empty());
}

#[tokio::test]
async fn quote_read_path_honours_soft_delete() {
    let h = harness(Delivery::Fanout);

    let (status, body) = send(&h.app, "GET", "/quotes/NN.AS", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    send(&h.app, "POST", "/notifications", r#"{"symbol":"NN.AS"}"#).await;
    let (status, body) = send(&h.app, "GET", "/quotes/NN.AS", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quote"]["open"], 10.0);

    assert!(h.store.soft_delete("NN.AS"));
    let (status, _) = send(&h.app, "GET", "/quotes/NN.AS", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn seeded_record_keeps_descriptive_fields() {
    let h = harness(Delivery::Fanout);
    h.store.seed(Instrument {
        id: "NN.AS".to_string(),
        symbol: "NN.AS".to_string(),
        name: Some("NN Group".to_string()),
        isin: Some("NL0010773842".to_string()),
        quote: None,
        deleted_at: None,
    });

    send(&h.app, "POST", "/notifications", r#"{"symbol":"NN.AS"}"#).await;

    let instrument = h.store.get_by_id("NN.AS").await.unwrap();
    assert_eq!(instrument.isin.as_deref(), Some("NL0010773842"));
    assert_eq!(instrument.quote, Some(nn_quote()));
}

#[tokio::test]
async fn metrics_separate_skips_from_failures() {
    let h = harness(Delivery::Fanout);
    send(&h.app, "POST", "/notifications", r#"{"symbol":"NN.AS"}"#).await;
    send(&h.app, "POST", "/notifications", r#"{"symbol":"MSFT"}"#).await;
    send(&h.app, "POST", "/notifications", r#"{"symbol":"FAIL"}"#).await;

    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
    )
    .unwrap();

    assert!(text.contains("quote_sync_notifications_received_total 3"));
    assert!(text.contains("quote_sync_quotes_updated_total 1"));
    assert!(text.contains("quote_sync_quotes_skipped_total 1"));
    assert!(text.contains("quote_sync_failures_total{kind=\"source_unavailable\"} 1"));
}
