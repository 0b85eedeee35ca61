use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Body of `POST /v1/events`.
///
/// Every field is optional on the wire; validation happens in
/// [`crate::track::normalize`] so that a bad event is answered with
/// `accepted: false` instead of a decoding failure.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct TrackEventRequest {
    pub event_id: Option<String>,
    /// Milliseconds since the Unix epoch, as a number or a numeric string.
    #[serde(default, alias = "ts", deserialize_with = "deserialize_millis")]
    pub timestamp: Option<i64>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub event_name: Option<String>,
    pub route: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Either an already serialized JSON string or any JSON value.
    #[serde(alias = "props_json")]
    pub properties: Option<Value>,
    pub trace_id: Option<String>,
}

// JSON encoders for 64-bit integers commonly quote them.
fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(i64),
        Text(String),
    }

    match Option::<Millis>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Millis::Number(millis)) => Ok(Some(millis)),
        Some(Millis::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Millis::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid timestamp: {text:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackEventResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackEventResponse {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            error: None,
        }
    }

    pub fn rejected(error: impl ToString) -> Self {
        Self {
            accepted: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    #[error("event has no timestamp")]
    MissingTimestamp,
    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
    #[error("failed to decode request: {0}")]
    RequestDecodingError(String),
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_legacy_field_names() {
        let request: TrackEventRequest = serde_json::from_value(json!({
            "ts": 1_717_243_200_000_i64,
            "event_name": "post_view",
            "props_json": "{\"a\":1}"
        }))
        .unwrap();

        assert_eq!(request.timestamp, Some(1_717_243_200_000));
        assert_eq!(request.properties, Some(json!("{\"a\":1}")));
        assert!(request.event_id.is_none());
    }

    #[test]
    fn accepts_quoted_timestamp() {
        let parse = |ts: Value| {
            serde_json::from_value::<TrackEventRequest>(json!({ "timestamp": ts }))
                .map(|request| request.timestamp)
        };

        assert_eq!(parse(json!("1717243200000")).unwrap(), Some(1_717_243_200_000));
        assert_eq!(parse(json!(1_717_243_200_000_i64)).unwrap(), Some(1_717_243_200_000));
        assert_eq!(parse(json!("")).unwrap(), None);
        assert_eq!(parse(Value::Null).unwrap(), None);
        assert!(parse(json!("yesterday")).is_err());

        let request: TrackEventRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.timestamp, None);
    }

    #[test]
    fn omits_error_when_accepted() {
        assert_json_eq!(
            serde_json::to_value(TrackEventResponse::accepted()).unwrap(),
            json!({"accepted": true})
        );
        assert_json_eq!(
            serde_json::to_value(TrackEventResponse::rejected(IngestError::MissingTimestamp))
                .unwrap(),
            json!({"accepted": false, "error": "event has no timestamp"})
        );
    }
}
