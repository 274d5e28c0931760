//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies are validated here only for shape; business rules run
//! in the service layer.

pub mod account_dto;
pub mod common_dto;
pub mod event_dto;
pub mod guest_dto;

pub use account_dto::*;
pub use common_dto::*;
pub use event_dto::*;
pub use guest_dto::*;
