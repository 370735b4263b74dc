//! Classic load balancer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::{Result, TaskError};
use crate::provider::{
    CloudProvider, CreateRequest, Mutation, ProviderObject, Query, ResourceKind, UpdateRequest,
    find_unique,
};

use super::reference::{Registry, ResourceKey, set_equal};
use super::resource::{Changeset, Resource, changed, changed_opt, fill};

/// A single listener, keyed by load-balancer port in [`LoadBalancer::listeners`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    /// Backend instance port.
    pub instance_port: u16,
}

#[derive(Debug, Deserialize)]
struct ListenerAttributes {
    lb_port: u16,
    instance_port: u16,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerAttributes {
    #[serde(default)]
    subnets: Vec<String>,
    #[serde(default)]
    security_groups: Vec<String>,
    #[serde(default)]
    listeners: Vec<ListenerAttributes>,
    dns_name: Option<String>,
    hosted_zone_id: Option<String>,
}

/// A load balancer spanning subnets, guarded by security groups.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancer {
    /// Logical name.
    pub name: String,
    /// Provider id.
    pub id: Option<String>,
    /// DNS name assigned by the provider.
    pub dns_name: Option<String>,
    /// Hosted zone of the DNS name.
    pub hosted_zone_id: Option<String>,
    /// Referenced subnets.
    pub subnet_refs: Vec<ResourceKey>,
    /// Referenced security groups.
    pub security_group_refs: Vec<ResourceKey>,
    /// Resolved subnet handles.
    pub subnets: Vec<String>,
    /// Resolved security group handles.
    pub security_groups: Vec<String>,
    /// Listeners keyed by load-balancer port.
    pub listeners: BTreeMap<u16, Listener>,
}

/// Fields of a [`LoadBalancer`] that differ.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerChanges {
    /// Provider id.
    pub id: Option<String>,
    /// Subnet handles.
    pub subnets: Option<Vec<String>>,
    /// Security group handles.
    pub security_groups: Option<Vec<String>>,
    /// Listeners that are missing or differ, by port.
    pub listeners: Option<BTreeMap<u16, Listener>>,
}

impl Changeset for LoadBalancerChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.id.is_some() {
            fields.push("ID");
        }
        if self.subnets.is_some() {
            fields.push("Subnets");
        }
        if self.security_groups.is_some() {
            fields.push("SecurityGroups");
        }
        if self.listeners.is_some() {
            fields.push("Listeners");
        }
        fields
    }
}

impl LoadBalancer {
    /// Creates an Expected load balancer with no references.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            dns_name: None,
            hosted_zone_id: None,
            subnet_refs: Vec::new(),
            security_group_refs: Vec::new(),
            subnets: Vec::new(),
            security_groups: Vec::new(),
            listeners: BTreeMap::new(),
        }
    }

    fn resource(&self) -> String {
        self.key().to_string()
    }

    fn listener_spec(listeners: &BTreeMap<u16, Listener>) -> serde_json::Value {
        let listeners: Vec<_> = listeners
            .iter()
            .map(|(port, l)| {
                json!({
                    "lb_port": port,
                    "instance_port": l.instance_port,
                    "protocol": "TCP",
                    "instance_protocol": "TCP",
                })
            })
            .collect();
        json!(listeners)
    }

    fn from_object(name: &str, object: &ProviderObject) -> Result<Self> {
        let attributes: LoadBalancerAttributes = object.decode()?;
        Ok(Self {
            name: name.to_string(),
            id: Some(object.id.clone()),
            dns_name: attributes.dns_name,
            hosted_zone_id: attributes.hosted_zone_id,
            subnet_refs: Vec::new(),
            security_group_refs: Vec::new(),
            subnets: attributes.subnets,
            security_groups: attributes.security_groups,
            listeners: attributes
                .listeners
                .into_iter()
                .map(|l| {
                    (
                        l.lb_port,
                        Listener {
                            instance_port: l.instance_port,
                        },
                    )
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Resource for LoadBalancer {
    type Changes = LoadBalancerChanges;

    const KIND: ResourceKind = ResourceKind::LoadBalancer;

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn references(&self) -> Vec<ResourceKey> {
        self.subnet_refs
            .iter()
            .chain(&self.security_group_refs)
            .cloned()
            .collect()
    }

    fn resolve_references(&mut self, registry: &Registry) -> Result<()> {
        let key = self.key();
        self.subnets = self
            .subnet_refs
            .iter()
            .map(|r| registry.resolve(&key, r))
            .collect::<Result<_>>()?;
        self.security_groups = self
            .security_group_refs
            .iter()
            .map(|r| registry.resolve(&key, r))
            .collect::<Result<_>>()?;
        Ok(())
    }

    async fn find(&self, cloud: &dyn CloudProvider) -> Result<Option<Self>> {
        let query = match &self.id {
            Some(id) => Query::by_id(Self::KIND, id),
            None => Query::by_name(Self::KIND, &self.name),
        };
        find_unique(cloud, &query, &self.resource())
            .await?
            .map(|object| Self::from_object(&self.name, &object))
            .transpose()
    }

    fn diff(actual: Option<&Self>, expected: &mut Self) -> LoadBalancerChanges {
        let Some(actual) = actual else {
            return LoadBalancerChanges {
                id: expected.id.clone(),
                subnets: (!expected.subnets.is_empty()).then(|| expected.subnets.clone()),
                security_groups: (!expected.security_groups.is_empty())
                    .then(|| expected.security_groups.clone()),
                listeners: (!expected.listeners.is_empty()).then(|| expected.listeners.clone()),
            };
        };

        fill(&mut expected.id, actual.id.as_ref());
        fill(&mut expected.dns_name, actual.dns_name.as_ref());
        fill(&mut expected.hosted_zone_id, actual.hosted_zone_id.as_ref());
        if set_equal(&actual.subnets, &expected.subnets) {
            expected.subnets.clone_from(&actual.subnets);
        }
        if set_equal(&actual.security_groups, &expected.security_groups) {
            expected.security_groups.clone_from(&actual.security_groups);
        }

        let listeners: BTreeMap<u16, Listener> = expected
            .listeners
            .iter()
            .filter(|(port, l)| actual.listeners.get(*port) != Some(*l))
            .map(|(port, l)| (*port, *l))
            .collect();

        LoadBalancerChanges {
            id: changed_opt(actual.id.as_ref(), expected.id.as_ref()),
            subnets: changed(Some(&actual.subnets), &expected.subnets),
            security_groups: changed(Some(&actual.security_groups), &expected.security_groups),
            listeners: (!listeners.is_empty()).then_some(listeners),
        }
    }

    fn check_changes(actual: Option<&Self>, expected: &Self, changes: &LoadBalancerChanges) -> Result<()> {
        let resource = expected.resource();
        if actual.is_none() {
            let missing = if expected.name.is_empty() {
                Some("Name")
            } else if expected.security_groups.is_empty() {
                Some("SecurityGroups")
            } else if expected.subnets.is_empty() {
                Some("Subnets")
            } else {
                None
            };
            if let Some(field) = missing {
                return Err(TaskError::RequiredField { resource, field }.into());
            }
        } else if changes.id.is_some() {
            return Err(TaskError::CannotChangeField {
                resource,
                field: "ID",
            }
            .into());
        }
        Ok(())
    }

    fn create_request(&self) -> CreateRequest {
        CreateRequest {
            kind: Self::KIND,
            name: self.name.clone(),
            spec: json!({
                "name": self.name,
                "subnets": self.subnets,
                "security_groups": self.security_groups,
            }),
        }
    }

    fn absorb(&mut self, object: &ProviderObject) {
        self.id = Some(object.id.clone());
        if let Some(dns_name) = object.attribute("dns_name") {
            self.dns_name = Some(dns_name);
        }
        if let Some(zone) = object.attribute("hosted_zone_id") {
            self.hosted_zone_id = Some(zone);
        }
    }

    fn mutations(&self, actual: Option<&Self>, changes: &LoadBalancerChanges) -> Result<Vec<Mutation>> {
        let resource = self.resource();
        if actual.is_some() {
            if changes.subnets.is_some() {
                return Err(TaskError::UnsupportedChange {
                    resource,
                    field: "Subnets",
                }
                .into());
            }
            if changes.security_groups.is_some() {
                return Err(TaskError::UnsupportedChange {
                    resource,
                    field: "SecurityGroups",
                }
                .into());
            }
        }

        let Some(listeners) = &changes.listeners else {
            return Ok(Vec::new());
        };
        let id = self.id.clone().unwrap_or_else(|| self.name.clone());
        Ok(listeners
            .iter()
            .map(|(port, listener)| {
                Mutation::Update(UpdateRequest {
                    kind: Self::KIND,
                    id: id.clone(),
                    operation: String::from("create_listeners"),
                    spec: json!({
                        "listeners": Self::listener_spec(&BTreeMap::from([(*port, *listener)])),
                    }),
                })
            })
            .collect())
    }

    fn document(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "subnets": self.subnets,
            "security_groups": self.security_groups,
            "listener": Self::listener_spec(&self.listeners),
        })
    }
}
