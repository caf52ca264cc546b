//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health and
//! configuration live at the root. With the `swagger-ui` feature the
//! OpenAPI document is served at `/api-docs/openapi.json` and browsable
//! at `/swagger-ui`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document covering the whole REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::events::publish_event,
        handlers::events::list_events,
        handlers::sources::list_sources,
        handlers::sources::get_source,
        handlers::sources::source_users,
        handlers::sources::run_reconcile,
        handlers::users::register_user,
        handlers::users::list_users,
        handlers::instances::list_instances,
        handlers::instances::submit_observed,
        handlers::maintenance::list_windows,
        handlers::maintenance::schedule_window,
        handlers::maintenance::end_window,
        handlers::system::health_handler,
        handlers::system::accounting_config_handler,
    ),
    tags(
        (name = "Events", description = "Event ingestion and log queries"),
        (name = "Sources", description = "Allocation sources and reconciliation"),
        (name = "Users", description = "User registration"),
        (name = "Instances", description = "Instance lifecycle tracking"),
        (name = "Maintenance", description = "Maintenance windows"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
