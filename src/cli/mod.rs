//! Command-line interface of the `azv` binary

pub mod commands;

pub use commands::*;
