//! Periodic refresh of the aggregate tables from raw events.
//!
//! Each refresh re-inserts the last `days_back` days. The target tables are
//! `ReplacingMergeTree`s versioned by insertion time, so re-running a refresh
//! replaces earlier rows for the same key instead of double counting.

use tracing::info;

use crate::client::ClickHouseStore;
use crate::error::StoreError;

/// Steps of the record-to-publish funnel, in order.
pub const FUNNEL_STEPS: &[&str] = &[
    "record_start",
    "record_stop",
    "upload_success",
    "publish_success",
];

const REFRESH_DAILY_ACTIVE_USERS: &str = r#"
INSERT INTO daily_active_users (date, dau, version)
SELECT
    toDate(ts) AS date,
    uniqExact(user_id) AS dau,
    now() AS version
FROM events
WHERE ts >= now() - toIntervalDay(?)
  AND user_id IS NOT NULL
GROUP BY date
"#;

const REFRESH_POST_DAILY_METRICS: &str = r#"
INSERT INTO post_daily_metrics (date, post_id, views, likes, completion, version)
SELECT
    toDate(ts) AS date,
    assumeNotNull(entity_id) AS post_id,
    countIf(event_name = 'post_view') AS views,
    countIf(event_name = 'post_like') AS likes,
    countIf(event_name = 'watch_complete') AS completion,
    now() AS version
FROM events
WHERE ts >= now() - toIntervalDay(?)
  AND entity_type = 'post'
  AND entity_id IS NOT NULL
GROUP BY date, entity_id
"#;

const REFRESH_FUNNEL_STEP: &str = r#"
INSERT INTO funnel_record_to_publish (date, step_name, unique_sessions, unique_users, version)
SELECT
    toDate(ts) AS date,
    ? AS step_name,
    uniqExact(session_id) AS unique_sessions,
    uniqExact(user_id) AS unique_users,
    now() AS version
FROM events
WHERE ts >= now() - toIntervalDay(?)
  AND event_name = ?
GROUP BY date
"#;

impl ClickHouseStore {
    pub async fn refresh_daily_active_users(&self, days_back: u32) -> Result<(), StoreError> {
        self.client()
            .query(REFRESH_DAILY_ACTIVE_USERS)
            .bind(days_back)
            .execute()
            .await
            .map_err(|e| StoreError::QueryError(format!("daily_active_users: {e}")))?;
        info!("refreshed daily_active_users");
        Ok(())
    }

    pub async fn refresh_post_daily_metrics(&self, days_back: u32) -> Result<(), StoreError> {
        self.client()
            .query(REFRESH_POST_DAILY_METRICS)
            .bind(days_back)
            .execute()
            .await
            .map_err(|e| StoreError::QueryError(format!("post_daily_metrics: {e}")))?;
        info!("refreshed post_daily_metrics");
        Ok(())
    }

    pub async fn refresh_funnel(&self, days_back: u32) -> Result<(), StoreError> {
        for step in FUNNEL_STEPS {
            self.client()
                .query(REFRESH_FUNNEL_STEP)
                .bind(*step)
                .bind(days_back)
                .bind(*step)
                .execute()
                .await
                .map_err(|e| StoreError::QueryError(format!("funnel step {step}: {e}")))?;
        }
        info!("refreshed funnel_record_to_publish");
        Ok(())
    }

    /// Runs every refresh in order, stopping at the first failure.
    pub async fn refresh_aggregates(&self, days_back: u32) -> Result<(), StoreError> {
        self.refresh_daily_active_users(days_back).await?;
        self.refresh_post_daily_metrics(days_back).await?;
        self.refresh_funnel(days_back).await
    }
}
