//! In-memory inventory of resource groups, VMs and VM power states
//!
//! Each listing is held as an `Arc` snapshot and replaced wholesale when it is
//! collected again. Readers keep whatever snapshot they already hold; nothing
//! is refreshed in the background.

use crate::arm::api_versions;
use crate::arm::models::{ResourceGroup, VirtualMachine, VmInstanceStatus};
use crate::arm::{ApiRequest, RequestExecutor};
use crate::error::{AzvisorError, Result};
use crate::inventory::filter::{FilterPattern, VmFilter};
use crate::storage::StorageAccessor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// VM listing of one resource group, as returned by the service
#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroupVms {
    pub resource_group: String,
    pub vms: Vec<VirtualMachine>,
}

/// Immutable view of the inventory at the last explicit refresh
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub resource_groups: Arc<Vec<ResourceGroup>>,
    /// Per-group listings in resource-group listing order
    pub vms: Arc<Vec<ResourceGroupVms>>,
    pub power_states: Option<Arc<Vec<VmInstanceStatus>>>,
    pub refreshed_at: DateTime<Utc>,
}

impl Inventory {
    /// Every VM name, in listing order
    pub fn vm_names(&self) -> Vec<String> {
        VmFilter::All.apply(&self.vms, &[])
    }

    /// Apply a compiled filter; power filters need `power_states` to be loaded
    pub fn filter(&self, filter: &VmFilter) -> Vec<String> {
        let statuses = self.power_states.as_deref().map(Vec::as_slice).unwrap_or(&[]);
        filter.apply(&self.vms, statuses)
    }

    pub fn find_vm(&self, vm_name: &str) -> Option<&VirtualMachine> {
        self.vms
            .iter()
            .flat_map(|group| group.vms.iter())
            .find(|vm| vm.name == vm_name)
    }
}

/// Resources a new VM can be placed on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreeResources {
    pub resource_group: String,
    pub storage_account: String,
    pub location: String,
}

#[derive(Default)]
struct CacheState {
    vm_data: Option<Arc<Vec<ResourceGroupVms>>>,
    rg_data: Option<Arc<Vec<ResourceGroup>>>,
    vm_status: Option<Arc<Vec<VmInstanceStatus>>>,
    refreshed_at: Option<DateTime<Utc>>,
}

pub struct InventoryCache {
    executor: Arc<RequestExecutor>,
    storage: Arc<StorageAccessor>,
    subscription_id: String,
    state: RwLock<CacheState>,
}

impl InventoryCache {
    pub fn new(
        executor: Arc<RequestExecutor>,
        storage: Arc<StorageAccessor>,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            storage,
            subscription_id: subscription_id.into(),
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Resource groups, fetched on first access
    pub async fn all_rgdata(&self) -> Result<Arc<Vec<ResourceGroup>>> {
        if let Some(data) = self.state.read().await.rg_data.clone() {
            return Ok(data);
        }
        self.collect_all_resource_group_data().await
    }

    /// Per-group VM listings, fetched on first access
    pub async fn all_vmdata(&self) -> Result<Arc<Vec<ResourceGroupVms>>> {
        if let Some(data) = self.state.read().await.vm_data.clone() {
            return Ok(data);
        }
        self.collect_all_vm_data().await
    }

    /// Subscription-wide power status listing, fetched on first access
    pub async fn all_vmstatus(&self) -> Result<Arc<Vec<VmInstanceStatus>>> {
        if let Some(data) = self.state.read().await.vm_status.clone() {
            return Ok(data);
        }
        self.collect_all_vm_status().await
    }

    pub async fn collect_all_resource_group_data(&self) -> Result<Arc<Vec<ResourceGroup>>> {
        let endpoint = format!("/subscriptions/{}/resourcegroups", self.subscription_id);
        let groups: Vec<ResourceGroup> = self
            .executor
            .list_all(ApiRequest::get(endpoint, api_versions::RESOURCE_GROUPS))
            .await?;
        debug!("Collected {} resource groups", groups.len());

        let groups = Arc::new(groups);
        self.state.write().await.rg_data = Some(groups.clone());
        Ok(groups)
    }

    /// Re-list the VMs of every known resource group. A group whose listing
    /// fails contributes an empty list.
    pub async fn collect_all_vm_data(&self) -> Result<Arc<Vec<ResourceGroupVms>>> {
        let groups = self.all_rgdata().await?;
        let mut listings = Vec::with_capacity(groups.len());

        for group in groups.iter() {
            let endpoint = format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines",
                self.subscription_id, group.name
            );
            let request = ApiRequest::get(endpoint, api_versions::VM_LIST_BY_GROUP)
                .fail_on_error(false)
                .suppress_logging(true);

            let vms = match self.executor.list_all::<VirtualMachine>(request).await {
                Ok(vms) => vms,
                Err(e @ AzvisorError::AuthenticationError(_)) => return Err(e),
                Err(e) => {
                    warn!("Listing VMs in resource group '{}' failed: {}", group.name, e);
                    Vec::new()
                }
            };

            listings.push(ResourceGroupVms {
                resource_group: group.name.clone(),
                vms,
            });
        }

        let listings = Arc::new(listings);
        let mut state = self.state.write().await;
        state.vm_data = Some(listings.clone());
        state.refreshed_at = Some(Utc::now());
        Ok(listings)
    }

    pub async fn collect_all_vm_status(&self) -> Result<Arc<Vec<VmInstanceStatus>>> {
        let endpoint = format!(
            "/subscriptions/{}/providers/Microsoft.Compute/virtualMachines",
            self.subscription_id
        );
        let statuses: Vec<VmInstanceStatus> = self
            .executor
            .list_all(
                ApiRequest::get(endpoint, api_versions::VM_STATUS)
                    .query("statusOnly", "true")
                    .fail_on_error(false)
                    .suppress_logging(true),
            )
            .await?;

        let statuses = Arc::new(statuses);
        self.state.write().await.vm_status = Some(statuses.clone());
        Ok(statuses)
    }

    /// Rebuild resource groups and VM listings, drop cached power states
    pub async fn update_hosts(&self) -> Result<Inventory> {
        info!("Refreshing inventory for subscription {}", self.subscription_id);
        self.state.write().await.vm_status = None;
        self.collect_all_resource_group_data().await?;
        self.collect_all_vm_data().await?;
        self.snapshot().await
    }

    pub async fn refresh(&self) -> Result<Inventory> {
        self.update_hosts().await
    }

    /// Current inventory, populating listings that were never fetched
    pub async fn snapshot(&self) -> Result<Inventory> {
        let resource_groups = self.all_rgdata().await?;
        let vms = self.all_vmdata().await?;
        let state = self.state.read().await;
        Ok(Inventory {
            resource_groups,
            vms,
            power_states: state.vm_status.clone(),
            refreshed_at: state.refreshed_at.unwrap_or_else(Utc::now),
        })
    }

    /// Flattened VM names, optionally filtered
    pub async fn get_all_vms(&self, pattern: Option<&FilterPattern>) -> Result<Vec<String>> {
        let filter = match pattern {
            Some(pattern) => VmFilter::compile(pattern)?,
            None => VmFilter::All,
        };

        if filter.needs_power_status() {
            let statuses = self.all_vmstatus().await?;
            return Ok(filter.apply(&[], &statuses));
        }

        let vms = self.all_vmdata().await?;
        Ok(filter.apply(&vms, &[]))
    }

    /// True when every name is present in the inventory
    pub async fn check_vms_exist(&self, vm_names: &[String]) -> Result<bool> {
        let known = self.get_all_vms(None).await?;
        Ok(vm_names.iter().all(|name| known.contains(name)))
    }

    /// Resource group of the first VM with this name. Names are not unique
    /// across groups; the first match in listing order wins.
    pub async fn get_resource_group(&self, vm_name: &str) -> Result<Option<String>> {
        let vms = self.all_vmdata().await?;
        Ok(vms
            .iter()
            .flat_map(|group| group.vms.iter().map(move |vm| (group, vm)))
            .find(|(_, vm)| vm.name == vm_name)
            .map(|(group, vm)| vm.resource_group().unwrap_or_else(|| group.resource_group.clone())))
    }

    pub async fn get_vm(&self, vm_name: &str) -> Result<Option<VirtualMachine>> {
        let vms = self.all_vmdata().await?;
        Ok(vms
            .iter()
            .flat_map(|group| group.vms.iter())
            .find(|vm| vm.name == vm_name)
            .cloned())
    }

    pub async fn get_resourcegroups_for_region(&self, region: &str) -> Result<Vec<String>> {
        let groups = self.all_rgdata().await?;
        Ok(groups
            .iter()
            .filter(|group| group.location == region)
            .map(|group| group.name.clone())
            .collect())
    }

    /// Find a resource group with a storage account for placing a copy of `vm_name`.
    /// Without an explicit group every group in the VM's region is a candidate.
    pub async fn compute_free_resources(
        &self,
        vm_name: &str,
        resource_group: Option<&str>,
    ) -> Result<FreeResources> {
        let candidates = match resource_group {
            Some(group) => vec![group.to_string()],
            None => {
                let vm = self
                    .get_vm(vm_name)
                    .await?
                    .ok_or_else(|| AzvisorError::not_found("Virtual machine", vm_name))?;
                self.get_resourcegroups_for_region(&vm.location).await?
            }
        };

        for candidate in &candidates {
            let accounts = self.storage.get_storage_account(candidate).await?;
            if let Some(account) = accounts.into_iter().next() {
                info!(
                    "Using storage account '{}' in resource group '{}'",
                    account.name, candidate
                );
                return Ok(FreeResources {
                    resource_group: candidate.clone(),
                    storage_account: account.name,
                    location: account.location,
                });
            }
        }

        Err(AzvisorError::not_found(
            "Storage account",
            format!("any of resource groups [{}]", candidates.join(", ")),
        ))
    }
}
