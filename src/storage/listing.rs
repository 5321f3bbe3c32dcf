//! Blob service `EnumerationResults` documents

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename = "EnumerationResults")]
pub struct EnumerationResults {
    #[serde(rename = "Containers", default)]
    pub containers: Option<ContainerList>,
    #[serde(rename = "Blobs", default)]
    pub blobs: Option<BlobList>,
    #[serde(rename = "NextMarker", default)]
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerList {
    #[serde(rename = "Container", default)]
    pub items: Vec<ContainerItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlobList {
    #[serde(rename = "Blob", default)]
    pub items: Vec<BlobItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContainerItem {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BlobProperties {
    #[serde(rename = "Content-Length", default)]
    pub content_length: Option<u64>,
    #[serde(rename = "BlobType", default)]
    pub blob_type: Option<String>,
    #[serde(rename = "Last-Modified", default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlobItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties", default)]
    pub properties: BlobProperties,
}

/// Flat row for table output
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct BlobRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub blob_type: String,
    #[tabled(rename = "Size")]
    pub size: String,
    #[tabled(rename = "Last Modified")]
    pub last_modified: String,
}

impl From<&BlobItem> for BlobRow {
    fn from(item: &BlobItem) -> Self {
        Self {
            name: item.name.clone(),
            blob_type: item.properties.blob_type.clone().unwrap_or_default(),
            size: item
                .properties
                .content_length
                .map(|len| len.to_string())
                .unwrap_or_default(),
            last_modified: item.properties.last_modified.clone().unwrap_or_default(),
        }
    }
}

impl EnumerationResults {
    pub fn parse(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml.trim_start_matches('\u{feff}'))?)
    }

    /// Continuation marker, `None` on the last page
    pub fn marker(&self) -> Option<&str> {
        self.next_marker
            .as_deref()
            .map(str::trim)
            .filter(|marker| !marker.is_empty())
    }

    pub fn container_names(&self) -> Vec<String> {
        self.containers
            .as_ref()
            .map(|list| list.items.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn into_blobs(self) -> Vec<BlobItem> {
        self.blobs.map(|list| list.items).unwrap_or_default()
    }
}
