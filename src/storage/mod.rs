//! Storage accounts and the blob data plane

pub mod accessor;
pub mod listing;
pub mod sas;

pub use accessor::StorageAccessor;
pub use listing::{BlobItem, BlobRow, EnumerationResults};
pub use sas::{SasPermission, SasRequest, SasResourceType, SasService};
