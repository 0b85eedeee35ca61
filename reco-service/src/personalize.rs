//! Recommendations derived from a user's own history.
//!
//! Both profiles resolve the tags of posts the user interacted with and look
//! for other posts carrying them. A user whose history yields no tags gets
//! the 72h trending list instead.

use std::collections::HashSet;

use event_store::{EventReader, StoreError};
use metrics::counter;
use tracing::{instrument, warn};

use crate::candidate::{or_empty, Candidate};
use crate::content::ContentMetadata;
use crate::similar::similar_by_tags;
use crate::trending::trending;

const LIKES_WINDOW_DAYS: u32 = 30;
const MAX_LIKED_POSTS: u64 = 10;
/// Only the most recent likes are resolved to tags.
const LIKED_POSTS_FOR_TAGS: usize = 5;

const WATCHES_WINDOW_DAYS: u32 = 14;
const MAX_WATCH_ROWS: u64 = 15;

const MAX_PROFILE_TAGS: usize = 10;
const FALLBACK_WINDOW_HOURS: u32 = 72;

/// Posts similar to the ones the user liked recently.
#[instrument(skip(reader, content, exclude_ids))]
pub async fn liked_based(
    reader: &dyn EventReader,
    content: &dyn ContentMetadata,
    user_id: &str,
    limit: usize,
    exclude_ids: &HashSet<String>,
) -> Result<Vec<Candidate>, StoreError> {
    if user_id.is_empty() {
        return Ok(Vec::new());
    }

    let liked = reader
        .recent_likes(user_id, LIKES_WINDOW_DAYS, MAX_LIKED_POSTS)
        .await?;
    if liked.is_empty() {
        return Ok(Vec::new());
    }

    let tags = profile_tags(content, liked.iter().take(LIKED_POSTS_FOR_TAGS)).await;
    similar_or_trending(reader, content, &tags, limit, exclude_ids).await
}

/// Posts similar to the ones the user watched recently, completed watches
/// weighing in first.
#[instrument(skip(reader, content, exclude_ids))]
pub async fn watch_based(
    reader: &dyn EventReader,
    content: &dyn ContentMetadata,
    user_id: &str,
    limit: usize,
    exclude_ids: &HashSet<String>,
) -> Result<Vec<Candidate>, StoreError> {
    if user_id.is_empty() {
        return Ok(Vec::new());
    }

    let watched = reader
        .recent_watches(user_id, WATCHES_WINDOW_DAYS, MAX_WATCH_ROWS)
        .await?;
    if watched.is_empty() {
        return Ok(Vec::new());
    }

    // A post viewed several times is looked up once.
    let mut seen = HashSet::new();
    let watched = watched.iter().filter(|id| seen.insert(id.as_str()));

    let tags = profile_tags(content, watched).await;
    similar_or_trending(reader, content, &tags, limit, exclude_ids).await
}

/// Trending over 72h, topped up from the last 24h when the longer window
/// runs short. Either window failing contributes nothing.
#[instrument(skip(reader, exclude_ids))]
pub async fn trending_fallback(
    reader: &dyn EventReader,
    limit: usize,
    exclude_ids: &HashSet<String>,
) -> Vec<Candidate> {
    let mut candidates = or_empty("trending_72h", trending(reader, limit, exclude_ids, 72).await);

    if candidates.len() < limit {
        let mut exclude_ids = exclude_ids.clone();
        exclude_ids.extend(candidates.iter().map(|c| c.post_id.clone()));

        let remaining = limit - candidates.len();
        candidates.extend(or_empty(
            "trending_24h",
            trending(reader, remaining, &exclude_ids, 24).await,
        ));
    }

    candidates.truncate(limit);
    candidates
}

/// Union of the tags of `post_ids`, in first-seen order, capped at
/// `MAX_PROFILE_TAGS`. Posts whose tags cannot be fetched are skipped.
async fn profile_tags<'a>(
    content: &dyn ContentMetadata,
    post_ids: impl Iterator<Item = &'a String>,
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for post_id in post_ids {
        if tags.len() >= MAX_PROFILE_TAGS {
            break;
        }
        match content.post_tags(post_id).await {
            Ok(post_tags) => {
                for tag in post_tags {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
            }
            Err(err) => {
                counter!("reco_content_errors_total", "call" => "post_tags").increment(1);
                warn!(post_id, "tag lookup failed: {}", err);
            }
        }
    }

    tags.truncate(MAX_PROFILE_TAGS);
    tags
}

async fn similar_or_trending(
    reader: &dyn EventReader,
    content: &dyn ContentMetadata,
    tags: &[String],
    limit: usize,
    exclude_ids: &HashSet<String>,
) -> Result<Vec<Candidate>, StoreError> {
    if tags.is_empty() {
        trending(reader, limit, exclude_ids, FALLBACK_WINDOW_HOURS).await
    } else {
        Ok(similar_by_tags(content, tags, limit, exclude_ids).await)
    }
}
