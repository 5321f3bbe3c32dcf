//! azvisor - Azure resource-manager client for VM inventory and provisioning
//!
//! Discovers resource groups, virtual machines and storage accounts of a
//! subscription, answers placement queries against a cached inventory, and
//! drives long-running provisioning of NICs, VMs, images and disks.

pub mod arm;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod inventory;
pub mod provision;
pub mod storage;
pub mod utils;

pub use client::AzureClient;
pub use error::{AzvisorError, Result};
