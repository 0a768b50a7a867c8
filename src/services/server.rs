//! Inbound HTTP surface
//!
//! Notifications arrive as POST bodies; each request is one pipeline run.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use super::pipeline::{PipelineOutcome, QuoteSyncPipeline};
use crate::error::{QuoteSyncError, Result};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<QuoteSyncPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<QuoteSyncPipeline>) -> Self {
        Self { pipeline }
    }
}

pub fn router(pipeline: Arc<QuoteSyncPipeline>) -> Router {
    Router::new()
        .route("/notifications", post(notification_handler))
        .route("/events", post(envelope_handler))
        .route("/quotes/:symbol", get(quote_handler))
        .route("/healthz", get(liveness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(AppState::new(pipeline))
}

/// Serve until `shutdown` resolves, then let in-flight requests finish
pub async fn serve<F>(bind: &str, pipeline: Arc<QuoteSyncPipeline>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

impl IntoResponse for QuoteSyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            QuoteSyncError::Decode(_) => StatusCode::BAD_REQUEST,
            QuoteSyncError::NotFound(_) => StatusCode::NOT_FOUND,
            QuoteSyncError::LifecycleClosed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

fn outcome_response(outcome: PipelineOutcome) -> Response {
    let body = match outcome {
        PipelineOutcome::Updated(event) => json!({
            "status": "updated",
            "symbol": event.symbol,
            "quote": event.quote,
        }),
        PipelineOutcome::Skipped { symbol } => json!({
            "status": "skipped",
            "symbol": symbol,
        }),
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn notification_handler(State(state): State<AppState>, body: String) -> Response {
    match state.pipeline.run(&body).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => e.into_response(),
    }
}

async fn envelope_handler(State(state): State<AppState>, body: String) -> Response {
    match state.pipeline.run_envelope(&body).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => e.into_response(),
    }
}

async fn quote_handler(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> std::result::Result<Json<serde_json::Value>, QuoteSyncError> {
    let quote = state.pipeline.store().get_quote(&symbol).await?;
    Ok(Json(json!({ "symbol": symbol, "quote": quote })))
}

/// Liveness probe
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.pipeline.metrics().render_prometheus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = [
            (QuoteSyncError::Decode("x".into()), StatusCode::BAD_REQUEST),
            (QuoteSyncError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                QuoteSyncError::LifecycleClosed {
                    resource: "postgres".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (QuoteSyncError::SourceUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (QuoteSyncError::StoreUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (QuoteSyncError::PublishUnavailable("x".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            let kind = err.kind();
            let response = err.into_response();
            assert_eq!(response.status(), expected, "kind: {kind}");

            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body["error"], kind);
        }
    }

    #[tokio::test]
    async fn test_healthz() {
        use crate::capability::{MockEventPublisher, MockQuoteSource, MockQuoteStore};

        let pipeline = QuoteSyncPipeline::new(
            Arc::new(MockQuoteSource::new()),
            Arc::new(MockQuoteStore::new()),
            Arc::new(MockEventPublisher::new()),
        );
        let response = router(Arc::new(pipeline))
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
