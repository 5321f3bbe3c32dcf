//! Request descriptions for the resources the provisioner creates

use crate::error::{AzvisorError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

pub const DEFAULT_VM_SIZE: &str = "Standard_B2s";

/// Longest computer name Windows accepts
const MAX_COMPUTER_NAME_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct NicSpec {
    pub name: String,
    pub resource_group: String,
    pub subnet_id: String,
}

impl NicSpec {
    pub fn payload(&self, location: &str) -> Value {
        json!({
            "properties": {
                "disableTcpStateTracking": false,
                "ipConfigurations": [{
                    "name": self.name,
                    "properties": {
                        "subnet": {"id": self.subnet_id}
                    }
                }]
            },
            "location": location
        })
    }
}

/// Administrator account of a new VM
#[derive(Clone)]
pub struct VmCredentials {
    pub username: String,
    password: Zeroizing<String>,
}

impl VmCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Parse a credential lookup entry: comma separated `user:password`
    /// pairs, the first one is used
    pub fn from_entry(entry: &str) -> Result<Self> {
        let first = entry.split(',').next().unwrap_or_default().trim();
        match first.split_once(':') {
            Some((user, password)) if !user.is_empty() && !password.is_empty() => {
                Ok(Self::new(user, password))
            }
            _ => Err(AzvisorError::config(
                "VM credential entry must have the form user:password",
            )),
        }
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for VmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct VmSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    /// Managed image the OS disk is created from
    pub image_id: String,
    pub vm_size: Option<String>,
    /// Key of the credential lookup when no explicit credentials are given
    pub os: String,
    pub tags: HashMap<String, String>,
    pub nic: NicSpec,
    pub credentials: Option<VmCredentials>,
}

impl VmSpec {
    pub fn payload(&self, nic_id: &str, credentials: &VmCredentials) -> Value {
        let computer_name: String = self.name.chars().take(MAX_COMPUTER_NAME_LEN).collect();
        json!({
            "location": self.location,
            "tags": self.tags,
            "properties": {
                "hardwareProfile": {
                    "vmSize": self.vm_size.as_deref().unwrap_or(DEFAULT_VM_SIZE)
                },
                "storageProfile": {
                    "imageReference": {"id": self.image_id},
                    "osDisk": {
                        "caching": "ReadWrite",
                        "managedDisk": {"storageAccountType": "Standard_LRS"},
                        "name": format!("{}_OSdisk", self.name),
                        "createOption": "FromImage"
                    }
                },
                "osProfile": {
                    "adminUsername": credentials.username,
                    "computerName": computer_name,
                    "adminPassword": credentials.password()
                },
                "networkProfile": {
                    "networkInterfaces": [{
                        "id": nic_id,
                        "properties": {"primary": true}
                    }]
                }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub source_vm_id: String,
    pub tags: HashMap<String, String>,
}

impl ImageSpec {
    pub fn payload(&self) -> Value {
        json!({
            "location": self.location,
            "tags": self.tags,
            "properties": {
                "sourceVirtualMachine": {"id": self.source_vm_id}
            }
        })
    }
}

pub fn disk_copy_payload(source_disk_id: &str, region: &str) -> Value {
    json!({
        "location": region,
        "properties": {
            "creationData": {
                "createOption": "Copy",
                "sourceResourceId": source_disk_id
            }
        }
    })
}

/// Result of a disk copy request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopiedDisk {
    pub name: String,
    pub id: String,
}

/// A disk to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskRef {
    /// Managed disk resource
    Managed { name: String, resource_group: String },
    /// Page blob `{container_path}/{name}` in a storage account
    Unmanaged {
        name: String,
        storage_account: String,
        container_path: String,
    },
}

impl DiskRef {
    pub fn name(&self) -> &str {
        match self {
            DiskRef::Managed { name, .. } | DiskRef::Unmanaged { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeleteOutcome {
    /// The service accepted the deletion
    Deleted,
    /// Nothing to delete
    AlreadyAbsent,
}
