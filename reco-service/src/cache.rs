use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::counter;
use time::{Duration, OffsetDateTime};

use crate::candidate::Candidate;
use crate::time::TimeSource;

/// Identifies a recommendation request. Tags and excluded ids are sorted, so
/// the order a client sends them in does not matter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        user_id: &str,
        feed_type: &str,
        context_post_id: &str,
        context_tags: &[String],
        exclude_ids: &[String],
    ) -> Self {
        Self(format!(
            "{user_id}|{feed_type}|{context_post_id}|{}|{}",
            sorted_list(context_tags),
            sorted_list(exclude_ids)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn sorted_list(values: &[String]) -> String {
    let mut values: Vec<&str> = values.iter().map(String::as_str).collect();
    values.sort_unstable();
    values.join(",")
}

struct CacheEntry {
    candidates: Vec<Candidate>,
    expires_at: OffsetDateTime,
}

/// In-process TTL cache of recommendation results.
///
/// Entries are only checked for expiry when read; a stale entry is removed
/// by the lookup that finds it. There is no size bound.
pub struct RecommendationCache {
    ttl: Duration,
    enabled: bool,
    timesource: Arc<dyn TimeSource + Send + Sync>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl RecommendationCache {
    pub fn new(ttl: Duration, enabled: bool, timesource: Arc<dyn TimeSource + Send + Sync>) -> Self {
        Self {
            ttl,
            enabled,
            timesource,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<Candidate>> {
        if !self.enabled {
            return None;
        }

        let now = self.timesource.now();
        let mut entries = self.lock();
        let hit = match entries.get(key) {
            Some(entry) if now <= entry.expires_at => Some(entry.candidates.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };

        if hit.is_some() {
            counter!("reco_cache_hits_total").increment(1);
        } else {
            counter!("reco_cache_misses_total").increment(1);
        }
        hit
    }

    pub fn set(&self, key: CacheKey, candidates: Vec<Candidate>) {
        if !self.enabled {
            return;
        }

        let expires_at = self.timesource.now() + self.ttl;
        self.lock().insert(
            key,
            CacheEntry {
                candidates,
                expires_at,
            },
        );
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Reason;
    use crate::test_utils::ManualClock;

    fn key(user_id: &str, tags: &[&str], excludes: &[&str]) -> CacheKey {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let excludes: Vec<String> = excludes.iter().map(|e| e.to_string()).collect();
        CacheKey::new(user_id, "HOME", "", &tags, &excludes)
    }

    fn items() -> Vec<Candidate> {
        vec![Candidate::new("p1", 1.0, Reason::SimilarByTags)]
    }

    fn cache(clock: &ManualClock, enabled: bool) -> RecommendationCache {
        RecommendationCache::new(Duration::minutes(5), enabled, Arc::new(clock.clone()))
    }

    #[test]
    fn key_ignores_order_of_tags_and_excludes() {
        assert_eq!(
            key("u1", &["b", "a"], &["y", "x"]),
            key("u1", &["a", "b"], &["x", "y"])
        );
        assert_eq!(key("u1", &["b", "a"], &["y", "x"]).as_str(), "u1|HOME||a,b|x,y");
        assert_ne!(key("u1", &[], &[]), key("u2", &[], &[]));
    }

    #[test]
    fn hit_with_reordered_request() {
        let clock = ManualClock::default();
        let cache = cache(&clock, true);

        cache.set(key("u1", &["a", "b"], &["x", "y"]), items());

        assert_eq!(cache.get(&key("u1", &["b", "a"], &["y", "x"])), Some(items()));
    }

    #[test]
    fn users_do_not_share_entries() {
        let clock = ManualClock::default();
        let cache = cache(&clock, true);

        cache.set(key("u1", &[], &[]), items());

        assert_eq!(cache.get(&key("u2", &[], &[])), None);
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_removed() {
        let clock = ManualClock::default();
        let cache = cache(&clock, true);
        cache.set(key("u1", &[], &[]), items());

        clock.advance(Duration::minutes(5));
        assert_eq!(cache.get(&key("u1", &[], &[])), Some(items()));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("u1", &[], &[])), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_overwrites_and_restarts_ttl() {
        let clock = ManualClock::default();
        let cache = cache(&clock, true);
        cache.set(key("u1", &[], &[]), vec![]);

        clock.advance(Duration::minutes(4));
        cache.set(key("u1", &[], &[]), items());
        clock.advance(Duration::minutes(4));

        assert_eq!(cache.get(&key("u1", &[], &[])), Some(items()));
    }

    #[test]
    fn disabled_cache_never_stores() {
        let clock = ManualClock::default();
        let cache = cache(&clock, false);

        cache.set(key("u1", &[], &[]), items());

        assert_eq!(cache.get(&key("u1", &[], &[])), None);
        assert!(cache.is_empty());
    }
}
