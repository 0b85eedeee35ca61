use clickhouse::Row;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A user interaction, as accepted at the ingestion boundary.
///
/// Optional references stay `None` when the client did not send them, text
/// fields default to the empty string. `event_id` is the dedup key when set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub event_id: Option<String>,
    pub timestamp: OffsetDateTime,
    pub user_id: Option<String>,
    pub session_id: String,
    pub event_name: String,
    pub route: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub properties: String,
    pub trace_id: String,
}

/// Column layout of the `events` table.
#[derive(Row, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    pub event_id: Uuid,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    pub ts: OffsetDateTime,
    #[serde(with = "clickhouse::serde::uuid::option")]
    pub user_id: Option<Uuid>,
    pub session_id: String,
    pub event_name: String,
    pub route: String,
    pub entity_type: Option<String>,
    #[serde(with = "clickhouse::serde::uuid::option")]
    pub entity_id: Option<Uuid>,
    pub props_json: String,
    pub trace_id: String,
}

impl From<&Event> for EventRow {
    /// Never fails: ids that are not UUIDs become NULL (or a fresh id for the
    /// primary key), so a single malformed event cannot poison a whole batch.
    fn from(event: &Event) -> Self {
        EventRow {
            event_id: parse_uuid(event.event_id.as_deref()).unwrap_or_else(Uuid::now_v7),
            ts: event.timestamp,
            user_id: parse_uuid(event.user_id.as_deref()),
            session_id: event.session_id.clone(),
            event_name: event.event_name.clone(),
            route: event.route.clone(),
            entity_type: event.entity_type.clone().filter(|t| !t.is_empty()),
            entity_id: parse_uuid(event.entity_id.as_deref()),
            props_json: if event.properties.is_empty() {
                String::from("{}")
            } else {
                event.properties.clone()
            },
            trace_id: event.trace_id.clone(),
        }
    }
}

fn parse_uuid(value: Option<&str>) -> Option<Uuid> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| Uuid::parse_str(v).ok())
}
