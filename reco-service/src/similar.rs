use std::collections::HashSet;

use metrics::counter;
use tracing::{instrument, warn};

use crate::candidate::{Candidate, Reason};
use crate::content::ContentMetadata;

/// Only this many tags are searched, to bound the requests per call.
pub const MAX_SEARCHED_TAGS: usize = 5;

/// Posts found by searching the content service for each tag in turn.
///
/// The first occurrence of a post wins and the search stops as soon as
/// `limit` posts were found. A failing tag search is logged and skipped.
#[instrument(skip(content, exclude_ids), fields(excluded = exclude_ids.len()))]
pub async fn similar_by_tags(
    content: &dyn ContentMetadata,
    tags: &[String],
    limit: usize,
    exclude_ids: &HashSet<String>,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if limit == 0 {
        return candidates;
    }

    let mut seen = HashSet::new();
    for tag in tags.iter().take(MAX_SEARCHED_TAGS) {
        let post_ids = match content.posts_by_tag(tag, limit).await {
            Ok(post_ids) => post_ids,
            Err(err) => {
                counter!("reco_content_errors_total", "call" => "posts_by_tag").increment(1);
                warn!(tag, "tag search failed: {}", err);
                continue;
            }
        };

        for post_id in post_ids {
            if exclude_ids.contains(&post_id) || !seen.insert(post_id.clone()) {
                continue;
            }
            candidates.push(Candidate::new(post_id, 1.0, Reason::SimilarByTags));
            if candidates.len() >= limit {
                return candidates;
            }
        }
    }
    candidates
}
