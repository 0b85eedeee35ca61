//! Builds a recommendation list by running the candidate sources in order of
//! relevance until the requested number of posts is reached.
//!
//! The order is: posts sharing the context tags, posts similar to what the
//! user watched, posts similar to what the user liked, then trending posts.
//! Every source only sees the remaining quota and skips posts that are
//! excluded by the request or already chosen by an earlier source.

use std::collections::HashSet;
use std::sync::Arc;

use event_store::EventReader;
use metrics::{counter, histogram};
use tracing::{debug, instrument};

use crate::api::GetRecommendationsRequest;
use crate::cache::{CacheKey, RecommendationCache};
use crate::candidate::{or_empty, Candidate};
use crate::content::ContentMetadata;
use crate::personalize::{liked_based, trending_fallback, watch_based};
use crate::similar::similar_by_tags;

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_FEED_TYPE: &str = "HOME";

/// A request with defaults applied and blank values removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationQuery {
    pub user_id: String,
    pub feed_type: String,
    pub limit: usize,
    pub exclude_ids: Vec<String>,
    pub context_post_id: String,
    pub context_tags: Vec<String>,
}

impl From<GetRecommendationsRequest> for RecommendationQuery {
    fn from(request: GetRecommendationsRequest) -> Self {
        let feed_type = trimmed(request.feed_type);
        let limit = match request.limit {
            None | Some(0) => DEFAULT_LIMIT,
            Some(limit) => limit as usize,
        };

        Self {
            user_id: trimmed(request.user_id),
            feed_type: if feed_type.is_empty() {
                DEFAULT_FEED_TYPE.to_string()
            } else {
                feed_type
            },
            limit,
            exclude_ids: non_blank(request.exclude_post_ids),
            context_post_id: trimmed(request.context_post_id),
            context_tags: non_blank(request.context_tags),
        }
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

impl RecommendationQuery {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            &self.user_id,
            &self.feed_type,
            &self.context_post_id,
            &self.context_tags,
            &self.exclude_ids,
        )
    }
}

/// Candidates picked so far, with the set of ids later sources must skip.
struct Selection {
    limit: usize,
    chosen: Vec<Candidate>,
    excluded: HashSet<String>,
}

impl Selection {
    fn new(query: &RecommendationQuery) -> Self {
        let mut excluded: HashSet<String> = query.exclude_ids.iter().cloned().collect();
        // A post is never recommended from its own page.
        if !query.context_post_id.is_empty() {
            excluded.insert(query.context_post_id.clone());
        }

        Self {
            limit: query.limit,
            // The limit comes straight from the client.
            chosen: Vec::new(),
            excluded,
        }
    }

    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.chosen.len())
    }

    fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    fn absorb(&mut self, stage: &'static str, candidates: Vec<Candidate>) {
        let before = self.chosen.len();
        for candidate in candidates {
            if self.is_full() {
                break;
            }
            if self.excluded.insert(candidate.post_id.clone()) {
                self.chosen.push(candidate);
            }
        }
        debug!(stage, added = self.chosen.len() - before, "stage done");
    }
}

pub struct Recommender {
    reader: Arc<dyn EventReader>,
    content: Arc<dyn ContentMetadata>,
    cache: RecommendationCache,
}

impl Recommender {
    pub fn new(
        reader: Arc<dyn EventReader>,
        content: Arc<dyn ContentMetadata>,
        cache: RecommendationCache,
    ) -> Self {
        Self {
            reader,
            content,
            cache,
        }
    }

    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }

    /// Cached result for the query if still fresh, otherwise a newly
    /// computed one, which is then cached. Never fails: sources that cannot
    /// be reached contribute nothing.
    #[instrument(skip_all, fields(user_id = %query.user_id, limit = query.limit))]
    pub async fn recommend(&self, query: &RecommendationQuery) -> Vec<Candidate> {
        let key = query.cache_key();
        if let Some(candidates) = self.cache.get(&key) {
            return candidates;
        }

        let candidates = self.compute(query).await;
        histogram!("reco_candidates_returned").record(candidates.len() as f64);
        self.cache.set(key, candidates.clone());
        candidates
    }

    async fn compute(&self, query: &RecommendationQuery) -> Vec<Candidate> {
        let reader = self.reader.as_ref();
        let content = self.content.as_ref();
        let mut selection = Selection::new(query);

        if !query.context_tags.is_empty() {
            let candidates = similar_by_tags(
                content,
                &query.context_tags,
                selection.remaining(),
                &selection.excluded,
            )
            .await;
            selection.absorb("context_tags", candidates);
        }

        if !selection.is_full() && !query.user_id.is_empty() {
            let result = watch_based(
                reader,
                content,
                &query.user_id,
                selection.remaining(),
                &selection.excluded,
            )
            .await;
            selection.absorb("watch_based", or_empty("watch_based", result));
        }

        if !selection.is_full() && !query.user_id.is_empty() {
            let result = liked_based(
                reader,
                content,
                &query.user_id,
                selection.remaining(),
                &selection.excluded,
            )
            .await;
            selection.absorb("liked_based", or_empty("liked_based", result));
        }

        if !selection.is_full() {
            counter!("reco_trending_fallback_total").increment(1);
            let candidates =
                trending_fallback(reader, selection.remaining(), &selection.excluded).await;
            selection.absorb("trending", candidates);
        }

        selection.chosen
    }
}
