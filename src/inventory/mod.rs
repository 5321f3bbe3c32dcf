//! Inventory discovery: cached VM and resource-group listings plus filters

pub mod cache;
pub mod discovery;
pub mod filter;

pub use cache::{FreeResources, Inventory, InventoryCache, ResourceGroupVms};
pub use discovery::{ResourceDiscovery, VmSize};
pub use filter::{FilterKind, FilterPattern, VmFilter};
