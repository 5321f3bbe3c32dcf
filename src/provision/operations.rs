use crate::arm::api_versions;
use crate::arm::{ApiRequest, ApiResponse, RequestExecutor, ResourceId};
use crate::config::{find_credential, Config, PollingConfig};
use crate::error::{AzvisorError, Result};
use crate::provision::models::{
    disk_copy_payload, CopiedDisk, DeleteOutcome, DiskRef, ImageSpec, NicSpec, VmCredentials, VmSpec,
};
use crate::provision::poll::{wait_for_provisioning, PollPolicy};
use crate::storage::StorageAccessor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Creates and deletes compute resources, waiting for provisioning to settle
pub struct Provisioner {
    executor: Arc<RequestExecutor>,
    storage: Arc<StorageAccessor>,
    subscription_id: String,
    polling: PollingConfig,
    /// OS name -> `user:password` entries
    credentials: HashMap<String, String>,
}

impl Provisioner {
    pub fn new(
        executor: Arc<RequestExecutor>,
        storage: Arc<StorageAccessor>,
        subscription_id: impl Into<String>,
        polling: PollingConfig,
        credentials: HashMap<String, String>,
    ) -> Self {
        Self {
            executor,
            storage,
            subscription_id: subscription_id.into(),
            polling,
            credentials,
        }
    }

    pub fn from_config(executor: Arc<RequestExecutor>, storage: Arc<StorageAccessor>, config: &Config) -> Self {
        Self::new(
            executor,
            storage,
            &config.subscription_id,
            config.polling.clone(),
            config.credentials.clone(),
        )
    }

    fn resource_id(&self, resource_group: &str, provider: &str, resource_type: &str, name: &str) -> ResourceId {
        ResourceId::new(&self.subscription_id, resource_group, provider, resource_type, name)
    }

    /// PUT a resource and poll it with GET until it settles
    async fn put_and_wait(
        &self,
        endpoint: String,
        api_version: &str,
        payload: serde_json::Value,
        display_name: &str,
        policy: PollPolicy,
    ) -> Result<ApiResponse> {
        let submitted = self
            .executor
            .execute(ApiRequest::put(endpoint.clone(), api_version).json(payload))
            .await?;

        wait_for_provisioning(display_name, submitted, policy, || {
            self.executor.execute(
                ApiRequest::get(endpoint.clone(), api_version).suppress_logging(true),
            )
        })
        .await
    }

    /// Create a network interface and return its resource id
    pub async fn create_nic(&self, spec: &NicSpec, location: &str) -> Result<String> {
        let id = self.resource_id(&spec.resource_group, "Microsoft.Network", "networkInterfaces", &spec.name);
        info!("Creating network interface '{}' in {}", spec.name, location);

        let response = self
            .put_and_wait(
                id.to_string(),
                api_versions::NIC_CREATE,
                spec.payload(location),
                &format!("network interface '{}'", spec.name),
                PollPolicy::nic(&self.polling),
            )
            .await?;

        Ok(response
            .str_at("/id")
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string()))
    }

    /// Admin credentials for a VM: explicit ones win, then the lookup for its OS
    pub fn resolve_credentials(&self, spec: &VmSpec) -> Result<VmCredentials> {
        if let Some(credentials) = &spec.credentials {
            return Ok(credentials.clone());
        }

        let entry = find_credential(&self.credentials, &spec.os)
            .ok_or_else(|| AzvisorError::config(format!("No VM credentials configured for OS '{}'", spec.os)))?;
        VmCredentials::from_entry(entry)
    }

    /// Create a NIC, then a VM from a managed image. Returns the VM name.
    /// A NIC created before a failed VM request is left in place.
    pub async fn create_vm_from_image(&self, spec: &VmSpec) -> Result<String> {
        let credentials = self.resolve_credentials(spec)?;
        let nic_id = self.create_nic(&spec.nic, &spec.location).await?;

        let id = self.resource_id(&spec.resource_group, "Microsoft.Compute", "virtualMachines", &spec.name);
        info!("Creating virtual machine '{}' from image {}", spec.name, spec.image_id);

        self.put_and_wait(
            id.to_string(),
            api_versions::VM_CREATE,
            spec.payload(&nic_id, &credentials),
            &format!("virtual machine '{}'", spec.name),
            PollPolicy::resource(&self.polling),
        )
        .await?;

        Ok(spec.name.clone())
    }

    /// Capture a managed image from a (generalized) VM. Returns the image name.
    pub async fn create_image_from_vm(&self, spec: &ImageSpec) -> Result<String> {
        let id = self.resource_id(&spec.resource_group, "Microsoft.Compute", "images", &spec.name);
        info!("Creating image '{}' from {}", spec.name, spec.source_vm_id);

        self.put_and_wait(
            id.to_string(),
            api_versions::IMAGE_CREATE,
            spec.payload(),
            &format!("image '{}'", spec.name),
            PollPolicy::resource(&self.polling),
        )
        .await?;

        Ok(spec.name.clone())
    }

    /// Request a copy of a managed disk. The copy is not awaited.
    pub async fn copy_managed_disk(
        &self,
        resource_group: &str,
        source_disk_id: &str,
        disk_name: &str,
        region: &str,
    ) -> Result<CopiedDisk> {
        let id = self.resource_id(resource_group, "Microsoft.Compute", "disks", disk_name);
        info!("Copying managed disk {} to '{}'", source_disk_id, disk_name);

        let response = self
            .executor
            .execute(
                ApiRequest::put(id.to_string(), api_versions::MANAGED_DISK_COPY)
                    .json(disk_copy_payload(source_disk_id, region)),
            )
            .await?;

        Ok(CopiedDisk {
            name: response.str_at("/name").unwrap_or(disk_name).to_string(),
            id: response
                .str_at("/id")
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string()),
        })
    }

    /// Delete a managed disk or a VHD blob. Deleting a missing disk succeeds.
    pub async fn delete_disk(&self, disk: &DiskRef) -> Result<DeleteOutcome> {
        match disk {
            DiskRef::Managed { name, resource_group } => {
                let id = self.resource_id(resource_group, "Microsoft.Compute", "disks", name);
                info!("Deleting managed disk '{}'", name);
                let response = self
                    .executor
                    .execute(
                        ApiRequest::delete(id.to_string(), api_versions::MANAGED_DISK_DELETE)
                            .fail_on_error(false),
                    )
                    .await?;
                classify_delete(&response, "Managed Disk", name)
            }
            DiskRef::Unmanaged {
                name,
                storage_account,
                container_path,
            } => {
                let response = self
                    .storage
                    .delete_blob(storage_account, container_path, name)
                    .await?;
                classify_delete(&response, "Unmanaged Disk", name)
            }
        }
    }
}

fn classify_delete(response: &ApiResponse, kind: &str, name: &str) -> Result<DeleteOutcome> {
    match response.status {
        200 | 202 => {
            info!("{} {} is being deleted", kind, name);
            Ok(DeleteOutcome::Deleted)
        }
        404 | 204 => {
            info!("{} {} not found", kind, name);
            Ok(DeleteOutcome::AlreadyAbsent)
        }
        status => Err(AzvisorError::api(
            Some(status),
            format!("{} {} cannot be deleted: {}", kind, name, response.text),
        )),
    }
}
