use std::convert::Infallible;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::endpoint;
use crate::recommender::Recommender;

#[derive(Clone)]
pub struct State {
    pub recommender: Arc<Recommender>,
}

async fn index() -> &'static str {
    "reco-service"
}

pub fn router(recommender: Arc<Recommender>, concurrency_limit: usize) -> Router {
    let state = State { recommender };

    Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(index))
        .route(
            "/v1/recommendations",
            post(endpoint::get_recommendations)
                .with_state(state)
                .layer::<_, Infallible>(ConcurrencyLimitLayer::new(concurrency_limit)),
        )
        .layer(TraceLayer::new_for_http())
}
