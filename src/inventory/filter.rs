//! Declarative VM filters over an inventory snapshot

use crate::arm::models::VmInstanceStatus;
use crate::error::{AzvisorError, Result};
use crate::inventory::cache::ResourceGroupVms;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    Location,
    TagName,
    TagValue,
    ResourceGroup,
    VmPowerState,
    /// Unrecognized kinds apply no filter
    Other(String),
}

impl FilterKind {
    pub fn parse(kind: &str) -> Self {
        match kind.trim().to_lowercase().as_str() {
            "location" => FilterKind::Location,
            "tag_name" => FilterKind::TagName,
            "tag_value" => FilterKind::TagValue,
            "resource_group" => FilterKind::ResourceGroup,
            "vmpowerstate" => FilterKind::VmPowerState,
            other => FilterKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Location => write!(f, "location"),
            FilterKind::TagName => write!(f, "tag_name"),
            FilterKind::TagValue => write!(f, "tag_value"),
            FilterKind::ResourceGroup => write!(f, "resource_group"),
            FilterKind::VmPowerState => write!(f, "vmpowerstate"),
            FilterKind::Other(other) => write!(f, "{}", other),
        }
    }
}

/// A single `{type, value}` filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPattern {
    pub kind: FilterKind,
    pub value: String,
}

impl FilterPattern {
    pub fn new(kind: FilterKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Parses the line-based form:
///
/// ```text
/// value:eastus
/// type:location
/// ```
impl FromStr for FilterPattern {
    type Err = AzvisorError;

    fn from_str(text: &str) -> Result<Self> {
        let mut kind = None;
        let mut value = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.split_once(':') {
                Some((key, rest)) if key.trim().eq_ignore_ascii_case("type") => {
                    kind = Some(FilterKind::parse(rest));
                }
                Some((key, rest)) if key.trim().eq_ignore_ascii_case("value") => {
                    value = Some(rest.trim().to_string());
                }
                _ => {
                    return Err(AzvisorError::invalid_argument(format!(
                        "Unrecognized filter line '{}'",
                        line
                    )))
                }
            }
        }

        match (kind, value) {
            (Some(kind), Some(value)) => Ok(Self { kind, value }),
            _ => Err(AzvisorError::invalid_argument(
                "Filter pattern needs both 'type:' and 'value:' lines",
            )),
        }
    }
}

/// A compiled filter
#[derive(Debug, Clone)]
pub enum VmFilter {
    Location(String),
    TagName(Regex),
    TagValue(Regex),
    ResourceGroup(Regex),
    /// `true` selects running VMs, `false` everything else
    PowerState(bool),
    All,
}

/// Regex anchored on both ends so only full matches count
fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

impl VmFilter {
    pub fn compile(pattern: &FilterPattern) -> Result<Self> {
        Ok(match &pattern.kind {
            FilterKind::Location => VmFilter::Location(pattern.value.clone()),
            FilterKind::TagName => VmFilter::TagName(full_match(&pattern.value)?),
            FilterKind::TagValue => VmFilter::TagValue(full_match(&pattern.value)?),
            FilterKind::ResourceGroup => VmFilter::ResourceGroup(full_match(&pattern.value)?),
            // "1" selects running VMs; any other value selects the rest
            FilterKind::VmPowerState => VmFilter::PowerState(pattern.value.trim() == "1"),
            FilterKind::Other(_) => VmFilter::All,
        })
    }

    /// Whether this filter reads the power-status listing instead of the VM listings
    pub fn needs_power_status(&self) -> bool {
        matches!(self, VmFilter::PowerState(_))
    }

    /// VM names selected from the per-group listings, in listing order
    pub fn apply(&self, groups: &[ResourceGroupVms], statuses: &[VmInstanceStatus]) -> Vec<String> {
        if let VmFilter::PowerState(running) = self {
            return statuses
                .iter()
                .filter(|status| status.is_running() == *running)
                .map(|status| status.name.clone())
                .collect();
        }

        groups
            .iter()
            .filter(|group| match self {
                VmFilter::ResourceGroup(re) => re.is_match(&group.resource_group),
                _ => true,
            })
            .flat_map(|group| group.vms.iter())
            .filter(|vm| match self {
                VmFilter::Location(location) => vm.location == *location,
                VmFilter::TagName(re) => vm.tags.keys().any(|k| re.is_match(k)),
                VmFilter::TagValue(re) => vm.tags.values().any(|v| re.is_match(v)),
                _ => true,
            })
            .map(|vm| vm.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::models::VirtualMachine;
    use serde_json::json;
    use std::collections::HashMap;

    fn vm(name: &str, location: &str, tags: &[(&str, &str)]) -> VirtualMachine {
        VirtualMachine {
            id: format!(
                "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/{}",
                name
            ),
            name: name.to_string(),
            location: location.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            properties: json!({}),
        }
    }

    fn group(name: &str, vms: Vec<VirtualMachine>) -> ResourceGroupVms {
        ResourceGroupVms {
            resource_group: name.to_string(),
            vms,
        }
    }

    fn select(kind: FilterKind, value: &str, groups: &[ResourceGroupVms]) -> Vec<String> {
        VmFilter::compile(&FilterPattern::new(kind, value))
            .unwrap()
            .apply(groups, &[])
    }

    #[test]
    fn location_is_exact_match() {
        let groups = vec![group(
            "rg",
            vec![vm("vm1", "eastus", &[]), vm("vm2", "westus", &[])],
        )];
        assert_eq!(select(FilterKind::Location, "eastus", &groups), vec!["vm1"]);
        assert!(select(FilterKind::Location, "east", &groups).is_empty());
    }

    #[test]
    fn tag_name_requires_full_match() {
        let groups = vec![group(
            "rg",
            vec![
                vm("vm1", "eastus", &[("env-prod", "1")]),
                vm("vm2", "eastus", &[("environment", "1")]),
            ],
        )];
        assert_eq!(select(FilterKind::TagName, "env-.*", &groups), vec!["vm1"]);
        assert!(select(FilterKind::TagName, "env", &groups).is_empty());
    }

    #[test]
    fn tag_value_matches_any_value() {
        let groups = vec![group(
            "rg",
            vec![
                vm("vm1", "eastus", &[("owner", "team-a"), ("tier", "gold")]),
                vm("vm2", "eastus", &[("owner", "team-ab")]),
            ],
        )];
        assert_eq!(select(FilterKind::TagValue, "gold", &groups), vec!["vm1"]);
        assert_eq!(
            select(FilterKind::TagValue, "team-a.*", &groups),
            vec!["vm1", "vm2"]
        );
    }

    #[test]
    fn resource_group_filter_drops_whole_groups() {
        let groups = vec![
            group("prod-rg", vec![vm("a", "eastus", &[]), vm("b", "eastus", &[])]),
            group("dev-rg", vec![vm("c", "eastus", &[])]),
            group("prod-rg-old", vec![vm("d", "eastus", &[])]),
        ];
        assert_eq!(select(FilterKind::ResourceGroup, "prod-rg", &groups), vec!["a", "b"]);
        assert_eq!(
            select(FilterKind::ResourceGroup, "prod-.*", &groups),
            vec!["a", "b", "d"]
        );
    }

    #[test]
    fn unknown_kind_returns_everything_in_order() {
        let groups = vec![
            group("rg1", vec![vm("a", "eastus", &[])]),
            group("rg2", vec![vm("b", "westus", &[])]),
        ];
        assert_eq!(
            select(FilterKind::parse("flavour"), "x", &groups),
            vec!["a", "b"]
        );
    }

    #[test]
    fn power_state_uses_status_listing_only() {
        let statuses: Vec<VmInstanceStatus> = serde_json::from_value(json!([
            {"name": "on", "properties": {"instanceView": {"statuses": [
                {"code": "ProvisioningState/succeeded"}, {"code": "PowerState/running"}]}}},
            {"name": "off", "properties": {"instanceView": {"statuses": [
                {"code": "ProvisioningState/succeeded"}, {"code": "PowerState/deallocated"}]}}}
        ]))
        .unwrap();
        let groups = vec![group("rg", vec![vm("not-in-status", "eastus", &[])])];

        let running = VmFilter::compile(&FilterPattern::new(FilterKind::VmPowerState, "1")).unwrap();
        let stopped = VmFilter::compile(&FilterPattern::new(FilterKind::VmPowerState, "0")).unwrap();
        assert!(running.needs_power_status());
        assert_eq!(running.apply(&groups, &statuses), vec!["on"]);
        assert_eq!(stopped.apply(&groups, &statuses), vec!["off"]);
    }

    #[test]
    fn power_flag_other_than_one_selects_stopped_vms() {
        for value in ["0", "yes", "", " 1 "] {
            let filter = VmFilter::compile(&FilterPattern::new(FilterKind::VmPowerState, value)).unwrap();
            let expected = value.trim() == "1";
            assert!(matches!(filter, VmFilter::PowerState(running) if running == expected));
        }
    }

    #[test]
    fn parses_line_based_pattern() {
        let pattern: FilterPattern = "value:eastus\ntype:location".parse().unwrap();
        assert_eq!(pattern, FilterPattern::new(FilterKind::Location, "eastus"));

        let with_colon: FilterPattern = "type:tag_value\nvalue:a:b".parse().unwrap();
        assert_eq!(with_colon.value, "a:b");

        assert!("type:location".parse::<FilterPattern>().is_err());
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let result = VmFilter::compile(&FilterPattern::new(FilterKind::TagName, "("));
        assert!(matches!(result, Err(AzvisorError::RegexError(_))));
    }
}
