//! Utility functions module
//!
//! Retry logic, HTTP client construction and output formatting shared by the
//! client components and the CLI.

pub mod format;
pub mod network;
pub mod retry;

pub use format::*;
pub use network::*;
pub use retry::*;
