use std::collections::HashSet;

use event_store::{EventReader, StoreError};
use tracing::instrument;

use crate::candidate::{Candidate, Reason};

/// Most viewed posts over the trailing `window_hours`, skipping
/// `exclude_ids`. Scored by view count.
///
/// Extra rows are requested to make up for the ones the exclusion removes,
/// so the result only falls short of `limit` when the window itself holds
/// too few posts.
#[instrument(skip(reader, exclude_ids), fields(excluded = exclude_ids.len()))]
pub async fn trending(
    reader: &dyn EventReader,
    limit: usize,
    exclude_ids: &HashSet<String>,
    window_hours: u32,
) -> Result<Vec<Candidate>, StoreError> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let max_rows = limit.saturating_add(exclude_ids.len()) as u64;
    let rows = reader.top_viewed(window_hours, max_rows).await?;
    let reason = Reason::for_trending_window(window_hours);

    Ok(rows
        .into_iter()
        .filter(|row| !row.entity_id.is_empty() && !exclude_ids.contains(&row.entity_id))
        .take(limit)
        .map(|row| Candidate::new(row.entity_id, row.views as f64, reason))
        .collect())
}

#[cfg(test)]
mod tests {
    use event_store::test_utils::MemoryStore;

    use super::*;

    fn excludes(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn ranks_by_views_and_labels_window() {
        let store = MemoryStore::new().with_trending(24, &[("a", 9), ("b", 4), ("c", 1)]);

        let candidates = trending(&store, 2, &HashSet::new(), 24).await.unwrap();

        assert_eq!(
            candidates,
            vec![
                Candidate::new("a", 9.0, Reason::TrendingViews24h),
                Candidate::new("b", 4.0, Reason::TrendingViews24h),
            ]
        );
    }

    #[tokio::test]
    async fn over_fetches_to_compensate_for_excludes() {
        let store =
            MemoryStore::new().with_trending(72, &[("a", 9), ("b", 8), ("c", 7), ("d", 6)]);

        let candidates = trending(&store, 2, &excludes(&["a", "c"]), 72)
            .await
            .unwrap();

        let ids: Vec<_> = candidates.iter().map(|c| c.post_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        assert_eq!(store.trending_requests(), vec![(72, 4)]);
    }

    #[tokio::test]
    async fn unknown_window_uses_default_label() {
        let store = MemoryStore::new().with_trending(48, &[("a", 1)]);

        let candidates = trending(&store, 5, &HashSet::new(), 48).await.unwrap();

        assert_eq!(candidates[0].reason, Reason::TrendingViews72h);
    }

    #[tokio::test]
    async fn zero_limit_skips_the_store() {
        let store = MemoryStore::new().with_trending(72, &[("a", 1)]);

        assert!(trending(&store, 0, &HashSet::new(), 72).await.unwrap().is_empty());
        assert!(store.trending_requests().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_returned() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);

        assert!(matches!(
            trending(&store, 5, &HashSet::new(), 72).await,
            Err(StoreError::QueryError(_))
        ));
    }
}
