//! Allocation source read handlers and the reconciliation trigger.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ReconcileResponse, SourceDetailResponse, SourceListResponse, SourceSnapshotDto,
    SourceSummaryDto, SourceUsersResponse, UserSnapshotDto,
};
use crate::app_state::AppState;
use crate::domain::SourceId;
use crate::error::{ErrorResponse, LedgerError};

/// `GET /sources` — List all known allocation sources.
///
/// # Errors
///
/// Returns [`LedgerError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/sources",
    tag = "Sources",
    summary = "List allocation sources",
    description = "Returns every registered source with its latest usage snapshot, ordered by source id. Sources without a snapshot yet appear with usage fields unset.",
    responses(
        (status = 200, description = "Source list", body = SourceListResponse),
    )
)]
pub async fn list_sources(State(state): State<AppState>) -> Result<impl IntoResponse, LedgerError> {
    let sources = state.directory.all_sources().await;

    let mut data = Vec::with_capacity(sources.len());
    for source in &sources {
        let snapshot = state.snapshots.source(&source.source_id).await;
        data.push(SourceSummaryDto::from_parts(source, snapshot.as_ref()));
    }
    let count = data.len();

    Ok(Json(SourceListResponse { data, count }))
}

/// `GET /sources/:id` — Get one source with its usage breakdown.
///
/// # Errors
///
/// Returns [`LedgerError::SourceNotFound`] if the source does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/sources/{id}",
    tag = "Sources",
    summary = "Get source details",
    description = "Returns the source definition, its latest source-level snapshot, and the per-user snapshots recorded under it.",
    params(
        ("id" = String, Path, description = "Allocation source id"),
    ),
    responses(
        (status = 200, description = "Source details", body = SourceDetailResponse),
        (status = 404, description = "Source not found", body = ErrorResponse),
    )
)]
pub async fn get_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LedgerError> {
    let source_id = SourceId::new(id);
    let source = state
        .directory
        .source(&source_id)
        .await
        .ok_or_else(|| LedgerError::SourceNotFound(source_id.to_string()))?;

    let snapshot = state.snapshots.source(&source_id).await;
    let users = state.snapshots.users_for_source(&source_id).await;

    Ok(Json(SourceDetailResponse {
        source_id: source.source_id.into_inner(),
        name: source.name,
        compute_allowed: source.compute_allowed,
        snapshot: snapshot.as_ref().map(SourceSnapshotDto::from),
        users: users.iter().map(UserSnapshotDto::from).collect(),
    }))
}

/// `GET /sources/:id/users` — List the users under a source.
///
/// # Errors
///
/// Returns [`LedgerError::SourceNotFound`] if the source does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/sources/{id}/users",
    tag = "Sources",
    summary = "List source membership",
    description = "Returns the usernames associated with a source, ordered alphabetically.",
    params(
        ("id" = String, Path, description = "Allocation source id"),
    ),
    responses(
        (status = 200, description = "Membership list", body = SourceUsersResponse),
        (status = 404, description = "Source not found", body = ErrorResponse),
    )
)]
pub async fn source_users(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LedgerError> {
    let source_id = SourceId::new(id);
    if state.directory.source(&source_id).await.is_none() {
        return Err(LedgerError::SourceNotFound(source_id.to_string()));
    }

    let members = state.directory.members(&source_id).await;
    let users: Vec<String> = members.into_iter().map(|u| u.into_inner()).collect();
    let count = users.len();

    Ok(Json(SourceUsersResponse {
        source_id: source_id.into_inner(),
        users,
        count,
    }))
}

/// `POST /reconcile` — Run one reconciliation cycle now.
///
/// # Errors
///
/// Returns [`LedgerError::AuthorityError`] when no allocation authority
/// is configured or its listing cannot be fetched.
#[utoipa::path(
    post,
    path = "/api/v1/reconcile",
    tag = "Sources",
    summary = "Reconcile against the allocation authority",
    description = "Fetches the authority's allocation listing, registers missing sources, refreshes budgets of known ones, and repairs memberships for registered users.",
    responses(
        (status = 200, description = "Cycle completed", body = ReconcileResponse),
        (status = 502, description = "Authority unavailable or not configured", body = ErrorResponse),
    )
)]
pub async fn run_reconcile(State(state): State<AppState>) -> Result<impl IntoResponse, LedgerError> {
    let report = state.reconciler.run_cycle(true).await?;
    Ok(Json(ReconcileResponse::from(report)))
}

/// Source and reconciliation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sources", get(list_sources))
        .route("/sources/{id}", get(get_source))
        .route("/sources/{id}/users", get(source_users))
        .route("/reconcile", post(run_reconcile))
}
