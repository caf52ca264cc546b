//! Event ingestion and event-log query handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{EventListResponse, EventQueryParams, EventRecordDto, PublishEventRequest};
use crate::app_state::AppState;
use crate::domain::{EventName, EventPayload};
use crate::error::{ErrorResponse, LedgerError};

/// `POST /events` — Record an accounting event.
///
/// The event is appended to the log, dispatched through the registered
/// handlers, and broadcast to WebSocket subscribers. Events that change
/// nothing (an unchanged snapshot, a threshold already crossed) are
/// still recorded.
///
/// # Errors
///
/// Returns [`LedgerError::UnknownEventName`] or
/// [`LedgerError::MalformedPayload`] when the body does not describe a
/// recordable event.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Record an accounting event",
    description = "Appends an event to the log and runs the accounting rules it triggers. The `name` field selects the event kind and `payload` holds kind-specific fields.",
    request_body = PublishEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = EventRecordDto),
        (status = 400, description = "Unknown event name or malformed payload", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(req): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let name = EventName::parse(&req.name)?;
    let payload = EventPayload::parse(name, &req.payload)?;

    let record = state.accountant.ingest(req.entity_id, payload).await;

    Ok((StatusCode::CREATED, Json(EventRecordDto::from(record.as_ref()))))
}

/// `GET /events` — Query the event log, newest first.
///
/// # Errors
///
/// Returns [`LedgerError::UnknownEventName`] when the `name` filter is
/// not a recognised event kind.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Query recent events",
    description = "Returns up to `limit` events newest-first, optionally filtered by event name and entity id.",
    params(EventQueryParams),
    responses(
        (status = 200, description = "Matching events", body = EventListResponse),
        (status = 400, description = "Unknown event name filter", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventQueryParams>,
) -> Result<impl IntoResponse, LedgerError> {
    let name = match params.name.as_deref() {
        Some(raw) => Some(EventName::parse(raw)?),
        None => None,
    };

    let records = state
        .log
        .recent(params.effective_limit(), name, params.entity_id.as_deref())
        .await;

    let data: Vec<EventRecordDto> = records.iter().map(|r| EventRecordDto::from(r.as_ref())).collect();
    let count = data.len();

    Ok(Json(EventListResponse { data, count }))
}

/// Event log routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event).get(list_events))
}
