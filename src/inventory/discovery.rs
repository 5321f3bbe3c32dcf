//! Read-only lookups used when preparing provisioning requests

use crate::arm::api_versions;
use crate::arm::models::GenericResource;
use crate::arm::{ApiRequest, RequestExecutor, ResourceId};
use crate::error::{AzvisorError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tabled::Tabled;
use tracing::debug;

/// A virtual-machine size offered in one region
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct VmSize {
    #[tabled(rename = "Size")]
    pub name: String,
    #[tabled(rename = "Location")]
    pub location: String,
    #[tabled(rename = "Tier", display_with = "display_option")]
    pub tier: Option<String>,
    #[tabled(rename = "Zones", display_with = "display_list")]
    pub zones: Vec<String>,
    #[tabled(skip)]
    pub capabilities: BTreeMap<String, String>,
}

impl VmSize {
    /// Build from a compute SKU entry; non-VM SKUs yield `None`
    pub fn from_sku(sku: &Value) -> Option<Self> {
        if sku.get("resourceType").and_then(Value::as_str) != Some("virtualMachines") {
            return None;
        }

        let capabilities = sku
            .get("capabilities")
            .and_then(Value::as_array)
            .map(|caps| {
                caps.iter()
                    .filter_map(|cap| {
                        Some((
                            cap.get("name")?.as_str()?.to_string(),
                            cap.get("value")?.as_str()?.to_string(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let zones = sku
            .pointer("/locationInfo/0/zones")
            .and_then(Value::as_array)
            .map(|zones| {
                zones
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name: sku.get("name")?.as_str()?.to_string(),
            location: sku
                .pointer("/locations/0")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase(),
            tier: sku.get("tier").and_then(Value::as_str).map(str::to_string),
            zones,
            capabilities,
        })
    }
}

fn display_option(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn display_list(values: &[String]) -> String {
    values.join(",")
}

pub struct ResourceDiscovery {
    executor: Arc<RequestExecutor>,
    subscription_id: String,
}

impl ResourceDiscovery {
    pub fn new(executor: Arc<RequestExecutor>, subscription_id: impl Into<String>) -> Self {
        Self {
            executor,
            subscription_id: subscription_id.into(),
        }
    }

    fn group_endpoint(&self, resource_group: &str, provider_path: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, resource_group, provider_path
        )
    }

    /// Every resource in a resource group
    pub async fn list_resources_in_group(&self, resource_group: &str) -> Result<Vec<GenericResource>> {
        let endpoint = format!(
            "/subscriptions/{}/resourceGroups/{}/resources",
            self.subscription_id, resource_group
        );
        self.executor
            .list_all(ApiRequest::get(endpoint, api_versions::GROUP_RESOURCES))
            .await
    }

    /// Virtual-machine sizes from the compute SKU catalog, optionally for one region
    pub async fn list_vm_sizes(&self, region: Option<&str>) -> Result<Vec<VmSize>> {
        let endpoint = format!(
            "/subscriptions/{}/providers/Microsoft.Compute/skus",
            self.subscription_id
        );
        let mut request = ApiRequest::get(endpoint, api_versions::VM_SKUS);
        if let Some(region) = region {
            request = request.query("$filter", format!("location eq '{}'", region));
        }

        let skus: Vec<Value> = self.executor.list_all(request).await?;
        Ok(skus.iter().filter_map(VmSize::from_sku).collect())
    }

    pub async fn list_virtual_networks(&self, resource_group: &str) -> Result<Vec<GenericResource>> {
        let endpoint = self.group_endpoint(resource_group, "Microsoft.Network/virtualNetworks");
        self.executor
            .list_all(ApiRequest::get(endpoint, api_versions::VNET_LIST))
            .await
    }

    pub async fn list_network_security_groups(&self, resource_group: &str) -> Result<Vec<GenericResource>> {
        let endpoint = self.group_endpoint(resource_group, "Microsoft.Network/networkSecurityGroups");
        self.executor
            .list_all(ApiRequest::get(endpoint, api_versions::NSG_LIST))
            .await
    }

    pub async fn list_network_interfaces(&self, resource_group: &str) -> Result<Vec<GenericResource>> {
        let endpoint = self.group_endpoint(resource_group, "Microsoft.Network/networkInterfaces");
        self.executor
            .list_all(ApiRequest::get(endpoint, api_versions::NIC_LIST))
            .await
    }

    /// Id of the first subnet of the first virtual network in `region`
    pub async fn first_subnet_in_region(&self, region: &str) -> Result<Option<String>> {
        let endpoint = format!(
            "/subscriptions/{}/providers/Microsoft.Network/virtualNetworks",
            self.subscription_id
        );
        let request = ApiRequest::get(endpoint, api_versions::VNET_LIST_SUBSCRIPTION)
            .fail_on_error(false)
            .suppress_logging(true);
        let networks: Vec<GenericResource> = self.executor.list_all(request).await?;

        Ok(networks
            .iter()
            .filter(|vnet| vnet.location == region)
            .find_map(|vnet| {
                vnet.properties
                    .pointer("/subnets/0/id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }))
    }

    /// Id of the VM owning a private or public IP address
    pub async fn find_vm_id_by_ip(&self, ip: &str) -> Result<Option<String>> {
        let nic_endpoint = format!(
            "/subscriptions/{}/providers/Microsoft.Network/networkInterfaces",
            self.subscription_id
        );
        let nics: Vec<GenericResource> = self
            .executor
            .list_all(ApiRequest::get(nic_endpoint, api_versions::RESOURCE_BY_ID))
            .await?;

        if let Some(vm_id) = nics.iter().find_map(|nic| vm_of_nic_with_private_ip(nic, ip)) {
            return Ok(Some(vm_id));
        }

        let public_ip_endpoint = format!(
            "/subscriptions/{}/providers/Microsoft.Network/publicIPAddresses",
            self.subscription_id
        );
        let public_ips: Vec<GenericResource> = self
            .executor
            .list_all(ApiRequest::get(public_ip_endpoint, api_versions::RESOURCE_BY_ID))
            .await?;

        let nic_id = public_ips.iter().find_map(|public_ip| {
            if public_ip.properties.get("ipAddress").and_then(Value::as_str) != Some(ip) {
                return None;
            }
            let config_id = public_ip.properties.pointer("/ipConfiguration/id")?.as_str()?;
            // .../networkInterfaces/{nic}/ipConfigurations/{config}
            config_id.rsplitn(3, '/').nth(2).map(str::to_string)
        });

        match nic_id {
            Some(nic_id) => Ok(self
                .get_resource_by_id(&nic_id)
                .await?
                .and_then(|nic| attached_vm_id(&nic))),
            None => Ok(None),
        }
    }

    /// Name of the VM owning an IP address
    pub async fn find_vm_name_by_ip(&self, ip: &str) -> Result<Option<String>> {
        Ok(self
            .find_vm_id_by_ip(ip)
            .await?
            .and_then(|id| id.parse::<ResourceId>().ok())
            .and_then(|id| id.name().map(str::to_string)))
    }

    /// Region of the VM behind a host name or IP address
    pub async fn find_vm_location_by_host(&self, host: &str) -> Result<Option<String>> {
        let ip = match host.parse::<std::net::IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => tokio::net::lookup_host((host, 0))
                .await?
                .map(|addr| addr.ip())
                .find(|ip| ip.is_ipv4())
                .map(|ip| ip.to_string())
                .ok_or_else(|| AzvisorError::network(format!("Unable to resolve host '{}'", host)))?,
        };

        match self.find_vm_id_by_ip(&ip).await? {
            Some(vm_id) => Ok(self.get_resource_by_id(&vm_id).await?.map(|vm| vm.location)),
            None => Ok(None),
        }
    }

    /// Fetch any resource by its full id. `None` when it does not exist.
    pub async fn get_resource_by_id(&self, resource_id: &str) -> Result<Option<GenericResource>> {
        let request = ApiRequest::get(resource_id, api_versions::RESOURCE_BY_ID);
        let response = self.executor.execute(request).await?;
        if response.is_absent() {
            debug!("Resource {} does not exist", resource_id);
            return Ok(None);
        }
        Ok(Some(response.json()?))
    }

    pub async fn managed_disk_exists(&self, resource_group: &str, disk_name: &str) -> Result<bool> {
        let endpoint = self.group_endpoint(resource_group, &format!("Microsoft.Compute/disks/{}", disk_name));
        let response = self
            .executor
            .execute(ApiRequest::get(endpoint, api_versions::MANAGED_DISK_GET))
            .await?;
        Ok(response.is_success())
    }

    /// Subnet id from a network resource group and a `vnet\subnet` path
    pub fn subnet_id(&self, network_resource_group: &str, subnet_path: &str) -> Result<String> {
        build_subnet_id(&self.subscription_id, network_resource_group, subnet_path)
    }
}

fn attached_vm_id(nic: &GenericResource) -> Option<String> {
    nic.properties
        .pointer("/virtualMachine/id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn vm_of_nic_with_private_ip(nic: &GenericResource, ip: &str) -> Option<String> {
    let configs = nic.properties.get("ipConfigurations")?.as_array()?;
    let has_ip = configs.iter().any(|config| {
        config.pointer("/properties/privateIPAddress").and_then(Value::as_str) == Some(ip)
    });
    if has_ip {
        attached_vm_id(nic)
    } else {
        None
    }
}

pub fn build_subnet_id(subscription_id: &str, network_resource_group: &str, subnet_path: &str) -> Result<String> {
    let (vnet, subnet) = subnet_path
        .split_once(['\\', '/'])
        .filter(|(vnet, subnet)| !vnet.is_empty() && !subnet.is_empty())
        .ok_or_else(|| {
            AzvisorError::invalid_argument(format!(
                "Subnet path '{}' must look like vnet\\subnet",
                subnet_path
            ))
        })?;

    Ok(ResourceId::new(
        subscription_id,
        network_resource_group,
        "Microsoft.Network",
        "virtualNetworks",
        vnet,
    )
    .child("subnets", subnet)
    .to_string())
}
