//! Typed resource manager identifiers
//!
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{type}/{name}...]`
//!
//! Segment keywords are matched case-insensitively because the service
//! returns both `resourceGroups` and `resourcegroups` depending on the API.

use crate::error::{AzvisorError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    subscription: String,
    resource_group: String,
    provider: Option<String>,
    /// `(type, name)` pairs, outermost first
    resources: Vec<(String, String)>,
}

impl ResourceId {
    /// Id of a resource group
    pub fn resource_group_id(subscription: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
            resource_group: resource_group.into(),
            provider: None,
            resources: Vec::new(),
        }
    }

    /// Id of a top-level resource
    pub fn new(
        subscription: impl Into<String>,
        resource_group: impl Into<String>,
        provider: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription: subscription.into(),
            resource_group: resource_group.into(),
            provider: Some(provider.into()),
            resources: vec![(resource_type.into(), name.into())],
        }
    }

    /// Id of a child resource, e.g. a subnet of a virtual network
    pub fn child(mut self, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        self.resources.push((resource_type.into(), name.into()));
        self
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Full type path, e.g. `virtualMachines` or `virtualNetworks/subnets`
    pub fn resource_type(&self) -> Option<String> {
        if self.resources.is_empty() {
            return None;
        }
        Some(
            self.resources
                .iter()
                .map(|(t, _)| t.as_str())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }

    /// Name of the innermost resource
    pub fn name(&self) -> Option<&str> {
        self.resources.last().map(|(_, n)| n.as_str())
    }
}

impl FromStr for ResourceId {
    type Err = AzvisorError;

    fn from_str(id: &str) -> Result<Self> {
        let segments: Vec<&str> = id.split('/').filter(|s| !s.is_empty()).collect();
        let invalid = |reason: &str| AzvisorError::invalid_resource_id(id, reason);

        let subscription = match segments.as_slice() {
            [keyword, sub, ..] if keyword.eq_ignore_ascii_case("subscriptions") => sub.to_string(),
            _ => return Err(invalid("missing subscriptions segment")),
        };

        let group_index = segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case("resourceGroups"))
            .ok_or_else(|| invalid("missing resourceGroups segment"))?;
        let resource_group = segments
            .get(group_index + 1)
            .ok_or_else(|| invalid("resourceGroups segment has no value"))?
            .to_string();

        let rest = &segments[group_index + 2..];
        if rest.is_empty() {
            return Ok(Self::resource_group_id(subscription, resource_group));
        }

        if !rest[0].eq_ignore_ascii_case("providers") || rest.len() < 2 {
            return Err(invalid("expected providers segment after the resource group"));
        }
        let provider = rest[1].to_string();

        let pairs = &rest[2..];
        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(invalid("resource type and name must come in pairs"));
        }
        let resources = pairs
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        Ok(Self {
            subscription,
            resource_group,
            provider: Some(provider),
            resources,
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription, self.resource_group
        )?;
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
            for (resource_type, name) in &self.resources {
                write!(f, "/{}/{}", resource_type, name)?;
            }
        }
        Ok(())
    }
}

/// Resource group named in an id, `None` when the id cannot be parsed
pub fn resource_group_of(id: &str) -> Option<String> {
    id.parse::<ResourceId>()
        .ok()
        .map(|parsed| parsed.resource_group().to_string())
}
