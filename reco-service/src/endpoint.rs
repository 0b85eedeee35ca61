use axum::extract::State;
use axum::{debug_handler, Json};
use metrics::counter;
use tracing::instrument;

use crate::api::{GetRecommendationsRequest, GetRecommendationsResponse};
use crate::recommender::RecommendationQuery;
use crate::router;

#[instrument(skip_all, fields(user_id, feed_type, limit))]
#[debug_handler]
pub async fn get_recommendations(
    State(state): State<router::State>,
    Json(request): Json<GetRecommendationsRequest>,
) -> Json<GetRecommendationsResponse> {
    counter!("reco_requests_total").increment(1);

    let query = RecommendationQuery::from(request);
    let span = tracing::Span::current();
    span.record("user_id", query.user_id.as_str());
    span.record("feed_type", query.feed_type.as_str());
    span.record("limit", query.limit);

    let items = state.recommender.recommend(&query).await;
    Json(GetRecommendationsResponse { items })
}
