use std::convert::Infallible;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::buffer::BatchBuffer;
use crate::track;

#[derive(Clone)]
pub struct State {
    pub buffer: Arc<BatchBuffer>,
}

async fn index() -> &'static str {
    "analytics-ingest"
}

pub fn router(buffer: Arc<BatchBuffer>, concurrency_limit: usize) -> Router {
    let state = State { buffer };

    Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(index))
        .route(
            "/v1/events",
            post(track::track_event)
                .with_state(state)
                .layer::<_, Infallible>(ConcurrencyLimitLayer::new(concurrency_limit)),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use event_store::test_utils::MemoryStore;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn app() -> (Router, Arc<BatchBuffer>) {
        let store = Arc::new(MemoryStore::new());
        let buffer = Arc::new(BatchBuffer::new(store, 10, Duration::from_secs(60), 100));
        (router(buffer.clone(), 10), buffer)
    }

    #[tokio::test]
    async fn index() {
        let (app, _buffer) = app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"analytics-ingest");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_without_queueing() {
        let (app, buffer) = app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/events")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["accepted"], false);
        assert!(buffer.is_empty());
    }
}
