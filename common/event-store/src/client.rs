use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::config::ClickHouseConfig;
use crate::error::StoreError;
use crate::event::{Event, EventRow};
use crate::schema::{ALL_TABLES, EVENTS_TABLE};
use crate::store::{EntityViews, EventReader, EventWriter};

const TOP_VIEWED_QUERY: &str = r#"
SELECT
    toString(assumeNotNull(entity_id)) AS post_id,
    count() AS views
FROM events
WHERE event_name = 'post_view'
  AND entity_type = 'post'
  AND entity_id IS NOT NULL
  AND ts >= now() - toIntervalHour(?)
GROUP BY entity_id
ORDER BY views DESC
LIMIT ?
"#;

const RECENT_LIKES_QUERY: &str = r#"
SELECT toString(assumeNotNull(entity_id)) AS post_id
FROM events
WHERE event_name = 'post_like'
  AND user_id = toUUIDOrNull(?)
  AND entity_type = 'post'
  AND entity_id IS NOT NULL
  AND ts >= now() - toIntervalDay(?)
GROUP BY entity_id
ORDER BY max(ts) DESC
LIMIT ?
"#;

const RECENT_WATCHES_QUERY: &str = r#"
SELECT toString(assumeNotNull(entity_id)) AS post_id
FROM events
WHERE user_id = toUUIDOrNull(?)
  AND entity_type = 'post'
  AND entity_id IS NOT NULL
  AND event_name IN ('post_view', 'watch_complete')
  AND ts >= now() - toIntervalDay(?)
ORDER BY if(event_name = 'watch_complete', 2, 1) DESC, ts DESC
LIMIT ?
"#;

#[derive(Row, Deserialize)]
struct ViewCountRow {
    post_id: String,
    views: u64,
}

#[derive(Row, Deserialize)]
struct PostIdRow {
    post_id: String,
}

/// ClickHouse-backed event store, shared by the ingestion and
/// recommendation services. Cheap to clone.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: Client,
    schema_ready: Arc<OnceCell<()>>,
}

impl ClickHouseStore {
    pub fn new(config: &ClickHouseConfig) -> Self {
        let client = Client::default()
            .with_url(config.clickhouse_url.clone())
            .with_database(config.clickhouse_database.clone())
            .with_user(config.clickhouse_user.clone())
            .with_password(config.clickhouse_password.clone());

        Self {
            client,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Creates the events table and the aggregate tables when missing.
    /// Succeeds at most once per store; after a failure the next call tries
    /// again, so writes keep retrying until the store is reachable.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema_ready
            .get_or_try_init(|| self.apply_schema())
            .await
            .map(|_| ())
    }

    async fn apply_schema(&self) -> Result<(), StoreError> {
        for (table, ddl) in ALL_TABLES {
            self.client
                .query(ddl)
                .execute()
                .await
                .map_err(|e| StoreError::SchemaError(format!("{table}: {e}")))?;
        }
        info!("event store schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl EventWriter for ClickHouseStore {
    #[instrument(skip_all, fields(rows = events.len()))]
    async fn insert_batch(&self, events: &[Event]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        self.ensure_schema().await?;

        let start = Instant::now();
        let mut insert = self
            .client
            .insert::<EventRow>(EVENTS_TABLE)
            .map_err(|e| StoreError::WriteError(e.to_string()))?;

        for event in events {
            insert
                .write(&EventRow::from(event))
                .await
                .map_err(|e| StoreError::WriteError(e.to_string()))?;
        }

        // Nothing is visible until the INSERT is closed, so a failure above
        // leaves the table untouched.
        insert
            .end()
            .await
            .map_err(|e| StoreError::WriteError(e.to_string()))?;

        debug!(
            rows = events.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inserted events batch"
        );
        Ok(())
    }
}

#[async_trait]
impl EventReader for ClickHouseStore {
    #[instrument(skip(self))]
    async fn top_viewed(
        &self,
        window_hours: u32,
        max_rows: u64,
    ) -> Result<Vec<EntityViews>, StoreError> {
        let rows = self
            .client
            .query(TOP_VIEWED_QUERY)
            .bind(window_hours)
            .bind(max_rows)
            .fetch_all::<ViewCountRow>()
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| EntityViews::new(row.post_id, row.views))
            .collect())
    }

    #[instrument(skip(self))]
    async fn recent_likes(
        &self,
        user_id: &str,
        window_days: u32,
        max_entities: u64,
    ) -> Result<Vec<String>, StoreError> {
        let rows = self
            .client
            .query(RECENT_LIKES_QUERY)
            .bind(user_id)
            .bind(window_days)
            .bind(max_entities)
            .fetch_all::<PostIdRow>()
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.post_id).collect())
    }

    #[instrument(skip(self))]
    async fn recent_watches(
        &self,
        user_id: &str,
        window_days: u32,
        max_rows: u64,
    ) -> Result<Vec<String>, StoreError> {
        let rows = self
            .client
            .query(RECENT_WATCHES_QUERY)
            .bind(user_id)
            .bind(window_days)
            .bind(max_rows)
            .fetch_all::<PostIdRow>()
            .await
            .map_err(|e| StoreError::QueryError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.post_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(query: &str, keyword: &str) -> String {
        let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let start = query.find(keyword).expect("clause present");
        let rest = &query[start..];
        let end = rest.find(" LIMIT").unwrap_or(rest.len());
        rest[..end].to_string()
    }

    #[test]
    fn completed_watches_rank_ahead_of_views() {
        assert_eq!(
            clause(RECENT_WATCHES_QUERY, "ORDER BY"),
            "ORDER BY if(event_name = 'watch_complete', 2, 1) DESC, ts DESC"
        );
    }

    #[test]
    fn likes_are_most_recent_first() {
        assert_eq!(clause(RECENT_LIKES_QUERY, "ORDER BY"), "ORDER BY max(ts) DESC");
        assert!(RECENT_LIKES_QUERY.contains("GROUP BY entity_id"));
    }

    #[test]
    fn trending_ranks_by_views() {
        assert_eq!(clause(TOP_VIEWED_QUERY, "ORDER BY"), "ORDER BY views DESC");
        assert!(TOP_VIEWED_QUERY.contains("event_name = 'post_view'"));
    }

    #[test]
    fn placeholders_match_bound_arguments() {
        assert_eq!(TOP_VIEWED_QUERY.matches('?').count(), 2);
        assert_eq!(RECENT_LIKES_QUERY.matches('?').count(), 3);
        assert_eq!(RECENT_WATCHES_QUERY.matches('?').count(), 3);
    }
}
