//! Authentication module for Azure services
//!
//! Token acquisition for the resource manager and blob storage planes,
//! cached per scope for the lifetime of the process.

pub mod provider;
pub mod token;

pub use provider::*;
pub use token::*;
