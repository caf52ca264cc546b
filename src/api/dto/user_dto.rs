//! User registration DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::UserRecord;

/// Request body for `POST /users`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    /// Service-wide unique username.
    pub username: String,
}

/// One registered user as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserDto {
    /// Username.
    pub username: String,
    /// When the user was registered.
    pub registered_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserDto {
    fn from(record: &UserRecord) -> Self {
        Self {
            username: record.username.as_str().to_string(),
            registered_at: record.registered_at,
        }
    }
}

/// Response body for `GET /users`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserListResponse {
    /// Registered users ordered by username.
    pub data: Vec<UserDto>,
    /// Number of users returned.
    pub count: usize,
}
