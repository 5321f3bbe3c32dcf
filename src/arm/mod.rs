//! Resource manager plumbing: request execution, typed ids and payloads

pub mod api_versions;
pub mod executor;
pub mod models;
pub mod resource_id;

pub use executor::{ApiRequest, ApiResponse, RequestAuth, RequestExecutor};
pub use models::*;
pub use resource_id::{resource_group_of, ResourceId};
