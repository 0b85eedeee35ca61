use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::event::Event;
use crate::store::{EntityViews, EventReader, EventWriter};

/// In-memory stand-in for the event store.
///
/// Writes are recorded in arrival order and can be made to fail. Reads
/// serve canned results: trending rows per window, likes and watches per
/// user. Every trending request is logged so tests can check the
/// over-fetch compensation.
#[derive(Default)]
pub struct MemoryStore {
    inserted: Mutex<Vec<Event>>,
    insert_calls: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    trending: Mutex<HashMap<u32, Vec<EntityViews>>>,
    likes: Mutex<HashMap<String, Vec<String>>>,
    watches: Mutex<HashMap<String, Vec<String>>>,
    trending_requests: Mutex<Vec<(u32, u64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trending(self, window_hours: u32, rows: &[(&str, u64)]) -> Self {
        self.trending.lock().unwrap().insert(
            window_hours,
            rows.iter()
                .map(|(id, views)| EntityViews::new(*id, *views))
                .collect(),
        );
        self
    }

    pub fn with_likes(self, user_id: &str, entity_ids: &[&str]) -> Self {
        self.likes.lock().unwrap().insert(
            user_id.to_string(),
            entity_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn with_watches(self, user_id: &str, entity_ids: &[&str]) -> Self {
        self.watches.lock().unwrap().insert(
            user_id.to_string(),
            entity_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Events successfully written so far, in write order.
    pub fn inserted(&self) -> Vec<Event> {
        self.inserted.lock().unwrap().clone()
    }

    /// Number of `insert_batch` calls, failed ones included.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// `(window_hours, max_rows)` of every trending query, in call order.
    pub fn trending_requests(&self) -> Vec<(u32, u64)> {
        self.trending_requests.lock().unwrap().clone()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::QueryError("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EventWriter for MemoryStore {
    async fn insert_batch(&self, events: &[Event]) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteError("store unavailable".to_string()));
        }
        self.inserted.lock().unwrap().extend_from_slice(events);
        Ok(())
    }
}

#[async_trait]
impl EventReader for MemoryStore {
    async fn top_viewed(
        &self,
        window_hours: u32,
        max_rows: u64,
    ) -> Result<Vec<EntityViews>, StoreError> {
        self.trending_requests
            .lock()
            .unwrap()
            .push((window_hours, max_rows));
        self.check_reads()?;

        let rows = self
            .trending
            .lock()
            .unwrap()
            .get(&window_hours)
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .take(usize::try_from(max_rows).unwrap_or(usize::MAX))
            .collect())
    }

    async fn recent_likes(
        &self,
        user_id: &str,
        _window_days: u32,
        max_entities: u64,
    ) -> Result<Vec<String>, StoreError> {
        self.check_reads()?;
        let likes = self.likes.lock().unwrap().get(user_id).cloned();
        Ok(likes
            .unwrap_or_default()
            .into_iter()
            .take(usize::try_from(max_entities).unwrap_or(usize::MAX))
            .collect())
    }

    async fn recent_watches(
        &self,
        user_id: &str,
        _window_days: u32,
        max_rows: u64,
    ) -> Result<Vec<String>, StoreError> {
        self.check_reads()?;
        let watches = self.watches.lock().unwrap().get(user_id).cloned();
        Ok(watches
            .unwrap_or_default()
            .into_iter()
            .take(usize::try_from(max_rows).unwrap_or(usize::MAX))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trending_is_truncated_to_requested_rows() {
        let store = MemoryStore::new().with_trending(72, &[("a", 3), ("b", 2), ("c", 1)]);

        let rows = store.top_viewed(72, 2).await.unwrap();

        assert_eq!(rows, vec![EntityViews::new("a", 3), EntityViews::new("b", 2)]);
        assert_eq!(store.top_viewed(24, 2).await.unwrap(), vec![]);
        assert_eq!(store.trending_requests(), vec![(72, 2), (24, 2)]);
    }

    #[tokio::test]
    async fn failing_reads_and_writes() {
        let store = MemoryStore::new().with_likes("u1", &["p1"]);
        store.set_fail_reads(true);
        store.set_fail_writes(true);

        assert!(matches!(
            store.recent_likes("u1", 30, 10).await,
            Err(StoreError::QueryError(_))
        ));
        assert!(matches!(
            store.insert_batch(&[]).await,
            Err(StoreError::WriteError(_))
        ));
        assert_eq!(store.insert_calls(), 1);
        assert!(store.inserted().is_empty());
    }
}
