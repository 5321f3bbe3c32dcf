//! Resource manager payload types

use crate::arm::resource_id::resource_group_of;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One page of an ARM collection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Listing<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            value: Vec::new(),
            next_link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VirtualMachine {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl VirtualMachine {
    /// Owning resource group, recovered from the id
    pub fn resource_group(&self) -> Option<String> {
        resource_group_of(&self.id)
    }
}

/// Power state reported in a VM's instance view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    Running,
    Starting,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Unknown(String),
}

impl PowerState {
    pub const CODE_PREFIX: &'static str = "PowerState/";

    /// Parse a status code such as `PowerState/running`
    pub fn from_code(code: &str) -> Option<Self> {
        let state = code.strip_prefix(Self::CODE_PREFIX)?;
        Some(match state.to_lowercase().as_str() {
            "running" => PowerState::Running,
            "starting" => PowerState::Starting,
            "stopping" => PowerState::Stopping,
            "stopped" => PowerState::Stopped,
            "deallocating" => PowerState::Deallocating,
            "deallocated" => PowerState::Deallocated,
            _ => PowerState::Unknown(state.to_string()),
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PowerState::Running)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PowerState::Running => "running",
            PowerState::Starting => "starting",
            PowerState::Stopping => "stopping",
            PowerState::Stopped => "stopped",
            PowerState::Deallocating => "deallocating",
            PowerState::Deallocated => "deallocated",
            PowerState::Unknown(other) => other,
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InstanceStatus {
    #[serde(default)]
    pub code: String,
    #[serde(rename = "displayStatus", default, skip_serializing_if = "Option::is_none")]
    pub display_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InstanceView {
    #[serde(default)]
    pub statuses: Vec<InstanceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VmStatusProperties {
    #[serde(rename = "instanceView", default)]
    pub instance_view: Option<InstanceView>,
}

/// Entry of the subscription-wide `statusOnly=true` VM listing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VmInstanceStatus {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: VmStatusProperties,
}

impl VmInstanceStatus {
    /// First `PowerState/*` code among the instance view statuses
    pub fn power_state(&self) -> Option<PowerState> {
        self.properties
            .instance_view
            .as_ref()?
            .statuses
            .iter()
            .find_map(|status| PowerState::from_code(&status.code))
    }

    pub fn is_running(&self) -> bool {
        self.power_state().map(|s| s.is_running()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageAccount {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
}

impl StorageAccount {
    pub fn resource_group(&self) -> Option<String> {
        resource_group_of(&self.id)
    }
}

/// Any resource manager resource, used by discovery listings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenericResource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl GenericResource {
    /// `properties.provisioningState`, when present
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.get("provisioningState")?.as_str()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
