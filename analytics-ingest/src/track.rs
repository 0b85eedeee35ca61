use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{debug_handler, Json};
use event_store::Event;
use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{instrument, warn, Span};

use crate::api::{IngestError, TrackEventRequest, TrackEventResponse};
use crate::router;

/// Turns a wire request into a store-ready event.
///
/// Only the timestamp is mandatory. Empty strings become absent references,
/// properties are kept as serialized JSON text (`"{}"` when missing).
pub fn normalize(request: TrackEventRequest) -> Result<Event, IngestError> {
    let millis = request.timestamp.ok_or(IngestError::MissingTimestamp)?;
    let timestamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|_| IngestError::InvalidTimestamp(millis))?;

    Ok(Event {
        event_id: non_empty(request.event_id),
        timestamp,
        user_id: non_empty(request.user_id),
        session_id: request.session_id.unwrap_or_default(),
        event_name: request.event_name.unwrap_or_default(),
        route: request.route.unwrap_or_default(),
        entity_type: non_empty(request.entity_type),
        entity_id: non_empty(request.entity_id),
        properties: properties_json(request.properties),
        trace_id: request.trace_id.unwrap_or_default(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn properties_json(properties: Option<Value>) -> String {
    match properties {
        Some(Value::String(text)) if !text.is_empty() => text,
        None | Some(Value::Null) | Some(Value::String(_)) => String::from("{}"),
        Some(other) => other.to_string(),
    }
}

#[instrument(skip_all, fields(event_name, has_event_id))]
#[debug_handler]
pub async fn track_event(
    State(state): State<router::State>,
    payload: Result<Json<TrackEventRequest>, JsonRejection>,
) -> (StatusCode, Json<TrackEventResponse>) {
    counter!("ingest_events_received_total").increment(1);

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            counter!("ingest_events_rejected_total", "cause" => "decode").increment(1);
            let err = IngestError::RequestDecodingError(rejection.body_text());
            warn!("rejected event: {}", err);
            return (rejection.status(), Json(TrackEventResponse::rejected(err)));
        }
    };

    match normalize(request) {
        Ok(event) => {
            Span::current().record("event_name", event.event_name.as_str());
            Span::current().record("has_event_id", event.event_id.is_some());
            // Replays of an already seen id are acknowledged like any other
            // event, the client has nothing to retry.
            state.buffer.add(event);
            (StatusCode::OK, Json(TrackEventResponse::accepted()))
        }
        Err(err) => {
            counter!("ingest_events_rejected_total", "cause" => "invalid").increment(1);
            warn!("rejected event: {}", err);
            (StatusCode::OK, Json(TrackEventResponse::rejected(err)))
        }
    }
}
