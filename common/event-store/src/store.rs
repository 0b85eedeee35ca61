use async_trait::async_trait;

use crate::error::StoreError;
use crate::event::Event;

/// View count of one entity over a trending window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityViews {
    pub entity_id: String,
    pub views: u64,
}

impl EntityViews {
    pub fn new(entity_id: impl Into<String>, views: u64) -> Self {
        Self {
            entity_id: entity_id.into(),
            views,
        }
    }
}

#[async_trait]
pub trait EventWriter: Send + Sync {
    /// Writes the whole batch or nothing. Empty batches are a no-op.
    async fn insert_batch(&self, events: &[Event]) -> Result<(), StoreError>;
}

/// Read-side queries the recommendation stages rely on. Time windows are
/// evaluated by the store against its own clock.
#[async_trait]
pub trait EventReader: Send + Sync {
    /// Most viewed posts over the trailing window, by view count descending.
    async fn top_viewed(
        &self,
        window_hours: u32,
        max_rows: u64,
    ) -> Result<Vec<EntityViews>, StoreError>;

    /// Distinct posts the user liked over the trailing window, most recently
    /// liked first.
    async fn recent_likes(
        &self,
        user_id: &str,
        window_days: u32,
        max_entities: u64,
    ) -> Result<Vec<String>, StoreError>;

    /// Posts the user viewed or finished watching over the trailing window.
    /// Completed watches rank ahead of plain views, then most recent first.
    /// An entity can appear more than once.
    async fn recent_watches(
        &self,
        user_id: &str,
        window_days: u32,
        max_rows: u64,
    ) -> Result<Vec<String>, StoreError>;
}
