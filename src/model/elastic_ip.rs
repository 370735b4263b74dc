//! Elastic IP address.
//!
//! An address bound to a subnet is discoverable through the
//! `AssociatedElasticIp` tag written on that subnet after allocation, so a
//! re-run finds it even when the operator never recorded the id.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{Result, TaskError};
use crate::provider::{
    CloudProvider, CreateRequest, Filter, Mutation, ProviderObject, Query, ResourceKind, find_unique,
};

use super::reference::{Registry, ResourceKey, is_link};
use super::resource::{Changeset, Resource, changed_opt, fill};

/// Subnet tag holding the public address of its elastic IP.
pub const ASSOCIATED_IP_TAG: &str = "AssociatedElasticIp";
/// Subnet tag holding the allocation id of its elastic IP.
pub const ASSOCIATED_ALLOCATION_TAG: &str = "AssociatedElasticIpAllocationId";

/// An elastic IP.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticIp {
    /// Logical name.
    pub name: String,
    /// Allocation id.
    pub id: Option<String>,
    /// Public address.
    pub public_ip: Option<String>,
    /// Subnet the address is associated with.
    pub subnet_ref: Option<ResourceKey>,
    /// Resolved subnet handle.
    pub subnet: Option<String>,
}

/// Fields of an [`ElasticIp`] that differ.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElasticIpChanges {
    /// Allocation id.
    pub id: Option<String>,
    /// Public address.
    pub public_ip: Option<String>,
    /// Subnet handle.
    pub subnet: Option<String>,
}

impl Changeset for ElasticIpChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("ID", self.id.is_some()),
            ("PublicIP", self.public_ip.is_some()),
            ("Subnet", self.subnet.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

impl ElasticIp {
    /// Creates an Expected elastic IP.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            public_ip: None,
            subnet_ref: None,
            subnet: None,
        }
    }

    fn resource(&self) -> String {
        self.key().to_string()
    }

    /// Reads the public address recorded on the associated subnet. A subnet
    /// that is only a link has not been created and records nothing.
    async fn address_from_subnet(&self, cloud: &dyn CloudProvider) -> Result<Option<String>> {
        let Some(subnet) = self.subnet.as_deref().filter(|s| !is_link(s)) else {
            return Ok(None);
        };
        let query = Query::by_id(ResourceKind::Subnet, subnet);
        let address = find_unique(cloud, &query, &self.resource())
            .await?
            .and_then(|object| object.tags.get(ASSOCIATED_IP_TAG).cloned());
        debug!("{}: subnet {subnet} records address {address:?}", self.resource());
        Ok(address)
    }
}

#[async_trait]
impl Resource for ElasticIp {
    type Changes = ElasticIpChanges;

    const KIND: ResourceKind = ResourceKind::ElasticIp;

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn references(&self) -> Vec<ResourceKey> {
        self.subnet_ref.iter().cloned().collect()
    }

    fn resolve_references(&mut self, registry: &Registry) -> Result<()> {
        if let Some(subnet) = &self.subnet_ref {
            self.subnet = Some(registry.resolve(&self.key(), subnet)?);
        }
        Ok(())
    }

    async fn find(&self, cloud: &dyn CloudProvider) -> Result<Option<Self>> {
        let query = if let Some(id) = &self.id {
            Query::by_id(Self::KIND, id)
        } else if let Some(ip) = &self.public_ip {
            Query {
                kind: Self::KIND,
                filter: Filter::PublicIp(ip.clone()),
            }
        } else if let Some(ip) = self.address_from_subnet(cloud).await? {
            Query {
                kind: Self::KIND,
                filter: Filter::PublicIp(ip),
            }
        } else {
            Query::by_name(Self::KIND, &self.name)
        };

        Ok(find_unique(cloud, &query, &self.resource())
            .await?
            .map(|object| Self {
                name: self.name.clone(),
                id: Some(object.id.clone()),
                public_ip: object.attribute("public_ip"),
                // The provider does not report the association; carry Expected's.
                subnet_ref: self.subnet_ref.clone(),
                subnet: self.subnet.clone(),
            }))
    }

    fn diff(actual: Option<&Self>, expected: &mut Self) -> ElasticIpChanges {
        if let Some(actual) = actual {
            fill(&mut expected.id, actual.id.as_ref());
            fill(&mut expected.public_ip, actual.public_ip.as_ref());
        }
        ElasticIpChanges {
            id: changed_opt(actual.and_then(|a| a.id.as_ref()), expected.id.as_ref()),
            public_ip: changed_opt(
                actual.and_then(|a| a.public_ip.as_ref()),
                expected.public_ip.as_ref(),
            ),
            subnet: changed_opt(actual.and_then(|a| a.subnet.as_ref()), expected.subnet.as_ref()),
        }
    }

    fn check_changes(actual: Option<&Self>, expected: &Self, changes: &ElasticIpChanges) -> Result<()> {
        if actual.is_none() {
            return Ok(());
        }
        let immutable = [
            ("PublicIP", changes.public_ip.is_some()),
            ("Subnet", changes.subnet.is_some()),
            ("ID", changes.id.is_some()),
        ];
        match immutable.into_iter().find(|(_, set)| *set) {
            Some((field, _)) => Err(TaskError::CannotChangeField {
                resource: expected.resource(),
                field,
            }
            .into()),
            None => Ok(()),
        }
    }

    fn create_request(&self) -> CreateRequest {
        CreateRequest {
            kind: Self::KIND,
            name: self.name.clone(),
            spec: json!({ "vpc": true }),
        }
    }

    fn absorb(&mut self, object: &ProviderObject) {
        self.id = Some(object.id.clone());
        if let Some(ip) = object.attribute("public_ip") {
            self.public_ip = Some(ip);
        }
    }

    fn mutations(&self, _actual: Option<&Self>, _changes: &ElasticIpChanges) -> Result<Vec<Mutation>> {
        // The subnet tag is rewritten on every render, created or not.
        let (Some(subnet), Some(ip), Some(id)) = (&self.subnet, &self.public_ip, &self.id) else {
            return Ok(Vec::new());
        };
        Ok(vec![Mutation::Tag {
            id: subnet.clone(),
            tags: BTreeMap::from([
                (String::from(ASSOCIATED_IP_TAG), ip.clone()),
                (String::from(ASSOCIATED_ALLOCATION_TAG), id.clone()),
            ]),
        }])
    }

    fn document(&self) -> serde_json::Value {
        json!({ "vpc": true })
    }
}
