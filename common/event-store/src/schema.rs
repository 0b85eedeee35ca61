pub const EVENTS_TABLE: &str = "events";
pub const DAILY_ACTIVE_USERS_TABLE: &str = "daily_active_users";
pub const POST_DAILY_METRICS_TABLE: &str = "post_daily_metrics";
pub const FUNNEL_TABLE: &str = "funnel_record_to_publish";

pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events
(
    event_id    UUID,
    ts          DateTime64(3),
    user_id     Nullable(UUID),
    session_id  String,
    event_name  LowCardinality(String),
    route       String,
    entity_type Nullable(LowCardinality(String)),
    entity_id   Nullable(UUID),
    props_json  String,
    trace_id    String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(ts)
ORDER BY (event_name, ts, user_id, entity_id)
SETTINGS allow_nullable_key = 1
"#;

pub const CREATE_DAILY_ACTIVE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_active_users
(
    date    Date,
    dau     UInt64,
    version DateTime
)
ENGINE = ReplacingMergeTree(version)
ORDER BY date
"#;

pub const CREATE_POST_DAILY_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS post_daily_metrics
(
    date       Date,
    post_id    UUID,
    views      UInt64,
    likes      UInt64,
    completion UInt64,
    version    DateTime
)
ENGINE = ReplacingMergeTree(version)
PARTITION BY toYYYYMM(date)
ORDER BY (date, post_id)
"#;

pub const CREATE_FUNNEL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS funnel_record_to_publish
(
    date            Date,
    step_name       LowCardinality(String),
    unique_sessions UInt64,
    unique_users    UInt64,
    version         DateTime
)
ENGINE = ReplacingMergeTree(version)
ORDER BY (date, step_name)
"#;

/// Applied in order by `ClickHouseStore::ensure_schema`.
pub const ALL_TABLES: &[(&str, &str)] = &[
    (EVENTS_TABLE, CREATE_EVENTS_TABLE),
    (DAILY_ACTIVE_USERS_TABLE, CREATE_DAILY_ACTIVE_USERS_TABLE),
    (POST_DAILY_METRICS_TABLE, CREATE_POST_DAILY_METRICS_TABLE),
    (FUNNEL_TABLE, CREATE_FUNNEL_TABLE),
];
