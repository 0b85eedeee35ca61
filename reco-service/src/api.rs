use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;

/// Body of `POST /v1/recommendations`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct GetRecommendationsRequest {
    pub user_id: Option<String>,
    pub feed_type: Option<String>,
    /// Defaults to 10 when missing or zero.
    pub limit: Option<u32>,
    #[serde(default)]
    pub exclude_post_ids: Vec<String>,
    pub context_post_id: Option<String>,
    #[serde(default)]
    pub context_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GetRecommendationsResponse {
    pub items: Vec<Candidate>,
}
