//! User registration and listing handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{RegisterUserRequest, UserDto, UserListResponse};
use crate::app_state::AppState;
use crate::domain::Username;
use crate::error::{ErrorResponse, LedgerError};

/// `POST /users` — Register a user for accounting.
///
/// Registration is what makes a user eligible for membership
/// reconciliation and usage notices. Usage events referring to
/// unregistered users are still recorded; registration only governs the
/// outbound side.
///
/// # Errors
///
/// Returns [`LedgerError::DuplicateUser`] when the username is already
/// registered, or [`LedgerError::InvalidRequest`] on an empty username.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    summary = "Register a user",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserDto),
        (status = 400, description = "Empty username", body = ErrorResponse),
        (status = 409, description = "Username already registered", body = ErrorResponse),
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(LedgerError::InvalidRequest(
            "username must not be empty".to_string(),
        ));
    }

    let record = state.directory.register_user(Username::new(username)).await?;

    Ok((StatusCode::CREATED, Json(UserDto::from(&record))))
}

/// `GET /users` — List registered users.
///
/// # Errors
///
/// Returns [`LedgerError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    summary = "List registered users",
    responses(
        (status = 200, description = "User list", body = UserListResponse),
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, LedgerError> {
    let users = state.directory.all_users().await;
    let data: Vec<UserDto> = users.iter().map(UserDto::from).collect();
    let count = data.len();

    Ok(Json(UserListResponse { data, count }))
}

/// User registry routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/users", post(register_user).get(list_users))
}
