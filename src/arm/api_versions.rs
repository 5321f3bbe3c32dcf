//! Pinned api-version strings, one per endpoint family.
//!
//! The resource manager does not use a uniform version; each value below is
//! part of the wire contract for its endpoint and must not be bumped casually.

pub const RESOURCE_GROUPS: &str = "2014-04-01";
pub const VM_LIST_BY_GROUP: &str = "2016-04-30-preview";
pub const VM_STATUS: &str = "2024-07-01";
pub const VM_CREATE: &str = "2022-11-01";

pub const STORAGE_ACCOUNTS: &str = "2017-06-01";
pub const LIST_ACCOUNT_SAS: &str = "2017-06-01";

pub const MANAGED_DISK_DELETE: &str = "2017-03-30";
pub const MANAGED_DISK_GET: &str = "2019-03-01";
pub const MANAGED_DISK_COPY: &str = "2023-04-02";
pub const IMAGE_CREATE: &str = "2023-07-01";

pub const NIC_CREATE: &str = "2023-05-01";
pub const NIC_LIST: &str = "2021-05-01";
pub const VNET_LIST: &str = "2019-04-01";
pub const VNET_LIST_SUBSCRIPTION: &str = "2023-05-01";
pub const NSG_LIST: &str = "2019-04-01";

pub const VM_SKUS: &str = "2019-04-01";
pub const GROUP_RESOURCES: &str = "2021-04-01";
pub const RESOURCE_BY_ID: &str = "2021-04-01";
