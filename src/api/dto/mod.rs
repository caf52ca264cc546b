//! Data Transfer Objects for REST request/response serialization.
//!
//! DTOs keep the wire shapes stable and carry the OpenAPI schema
//! derives; domain types never leak serialization concerns of the API.

pub mod event_dto;
pub mod instance_dto;
pub mod maintenance_dto;
pub mod source_dto;
pub mod user_dto;

pub use event_dto::*;
pub use instance_dto::*;
pub use maintenance_dto::*;
pub use source_dto::*;
pub use user_dto::*;
