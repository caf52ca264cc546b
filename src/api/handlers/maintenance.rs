//! Maintenance window handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{MaintenanceListResponse, MaintenanceWindowDto, ScheduleWindowRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, LedgerError};

/// `GET /maintenance` — List maintenance windows, newest first.
///
/// # Errors
///
/// Returns [`LedgerError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/maintenance",
    tag = "Maintenance",
    summary = "List maintenance windows",
    responses(
        (status = 200, description = "Window list", body = MaintenanceListResponse),
    )
)]
pub async fn list_windows(State(state): State<AppState>) -> Result<impl IntoResponse, LedgerError> {
    let now = Utc::now();
    let windows = state.calendar.all().await;
    let data: Vec<MaintenanceWindowDto> = windows
        .iter()
        .map(|w| MaintenanceWindowDto::from_window(w, now))
        .collect();
    let count = data.len();

    Ok(Json(MaintenanceListResponse { data, count }))
}

/// `POST /maintenance` — Schedule a maintenance window.
///
/// Background reconciliation pauses while any window is active. A
/// missing `starts_at` opens the window immediately; a missing
/// `ends_at` keeps it open until ended over the API.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidRequest`] on an empty title.
#[utoipa::path(
    post,
    path = "/api/v1/maintenance",
    tag = "Maintenance",
    summary = "Schedule a maintenance window",
    request_body = ScheduleWindowRequest,
    responses(
        (status = 201, description = "Window scheduled", body = MaintenanceWindowDto),
        (status = 400, description = "Empty title", body = ErrorResponse),
    )
)]
pub async fn schedule_window(
    State(state): State<AppState>,
    Json(req): Json<ScheduleWindowRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    if req.title.trim().is_empty() {
        return Err(LedgerError::InvalidRequest(
            "title must not be empty".to_string(),
        ));
    }

    let window = state
        .calendar
        .schedule(req.title, req.message, req.starts_at, req.ends_at)
        .await;

    let dto = MaintenanceWindowDto::from_window(&window, Utc::now());
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `DELETE /maintenance/:id` — End a maintenance window now.
///
/// # Errors
///
/// Returns [`LedgerError::WindowNotFound`] if no window has this id.
#[utoipa::path(
    delete,
    path = "/api/v1/maintenance/{id}",
    tag = "Maintenance",
    summary = "End a maintenance window",
    params(
        ("id" = uuid::Uuid, Path, description = "Window UUID"),
    ),
    responses(
        (status = 204, description = "Window ended"),
        (status = 404, description = "Window not found", body = ErrorResponse),
    )
)]
pub async fn end_window(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    state.calendar.end(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Maintenance calendar routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/maintenance", get(list_windows).post(schedule_window))
        .route("/maintenance/{id}", delete(end_window))
}
