use std::fmt;

use event_store::StoreError;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why a post was recommended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    #[serde(rename = "similar_by_tags")]
    SimilarByTags,
    #[serde(rename = "trending_views_24h")]
    TrendingViews24h,
    #[serde(rename = "trending_views_72h")]
    TrendingViews72h,
    #[serde(rename = "trending_by_views_7d")]
    TrendingByViews7d,
}

impl Reason {
    /// Label for a trending window. Windows other than 24h and 7d are
    /// reported with the 72h label.
    pub fn for_trending_window(window_hours: u32) -> Self {
        match window_hours {
            24 => Reason::TrendingViews24h,
            168 => Reason::TrendingByViews7d,
            _ => Reason::TrendingViews72h,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::SimilarByTags => "similar_by_tags",
            Reason::TrendingViews24h => "trending_views_24h",
            Reason::TrendingViews72h => "trending_views_72h",
            Reason::TrendingByViews7d => "trending_by_views_7d",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub post_id: String,
    pub score: f64,
    pub reason: Reason,
}

impl Candidate {
    pub fn new(post_id: impl Into<String>, score: f64, reason: Reason) -> Self {
        Self {
            post_id: post_id.into(),
            score,
            reason,
        }
    }
}

/// A stage that could not reach the event store contributes nothing.
pub fn or_empty(stage: &'static str, result: Result<Vec<Candidate>, StoreError>) -> Vec<Candidate> {
    match result {
        Ok(candidates) => candidates,
        Err(err) => {
            counter!("reco_stage_failures_total", "stage" => stage).increment(1);
            warn!(stage, "recommendation stage failed: {}", err);
            Vec::new()
        }
    }
}
