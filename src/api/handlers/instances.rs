//! Instance lifecycle handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{InstanceDto, InstanceListResponse, InstanceSyncResponse, ObservedInstancesRequest};
use crate::app_state::AppState;
use crate::domain::InstanceId;
use crate::error::LedgerError;
use crate::service::ObservedInstance;

/// `GET /instances` — List tracked instances.
///
/// # Errors
///
/// Returns [`LedgerError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/instances",
    tag = "Instances",
    summary = "List tracked instances",
    description = "Returns every instance the ledger has seen, joined with its latest charging assignment, ordered by instance id. End-dated instances stay in the listing.",
    responses(
        (status = 200, description = "Instance list", body = InstanceListResponse),
    )
)]
pub async fn list_instances(State(state): State<AppState>) -> Result<impl IntoResponse, LedgerError> {
    let records = state.directory.all_instances().await;

    let mut data = Vec::with_capacity(records.len());
    for record in &records {
        let assignment = state.snapshots.instance(&record.instance_id).await;
        data.push(InstanceDto::from_parts(record, assignment.as_ref()));
    }
    let count = data.len();

    Ok(Json(InstanceListResponse { data, count }))
}

/// `POST /instances/observed` — Submit the provider's current listing.
///
/// The listing is authoritative: instances in it are registered or have
/// their status refreshed, and open instances missing from it are
/// end-dated.
///
/// # Errors
///
/// Returns [`LedgerError`] on internal failures.
#[utoipa::path(
    post,
    path = "/api/v1/instances/observed",
    tag = "Instances",
    summary = "Synchronise with a provider listing",
    request_body = ObservedInstancesRequest,
    responses(
        (status = 200, description = "Listing applied", body = InstanceSyncResponse),
    )
)]
pub async fn submit_observed(
    State(state): State<AppState>,
    Json(req): Json<ObservedInstancesRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let observed: Vec<ObservedInstance> = req
        .instances
        .into_iter()
        .map(|i| ObservedInstance {
            instance_id: InstanceId::new(i.instance_id),
            status: i.status,
        })
        .collect();

    let report = state.reconciler.sync_instances(observed).await;

    Ok(Json(InstanceSyncResponse::from(report)))
}

/// Instance lifecycle routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/instances", get(list_instances))
        .route("/instances/observed", post(submit_observed))
}
