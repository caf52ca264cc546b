//! REST endpoint handlers organized by resource.

pub mod events;
pub mod instances;
pub mod maintenance;
pub mod sources;
pub mod system;
pub mod users;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(sources::routes())
        .merge(users::routes())
        .merge(instances::routes())
        .merge(maintenance::routes())
}
