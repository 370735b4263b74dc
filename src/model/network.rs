//! Subnets and security groups.
//!
//! Both are usually referenced rather than owned by the cluster: a shared
//! object is looked up by id and never created or modified.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, TaskError};
use crate::provider::{
    CloudProvider, CreateRequest, Mutation, ProviderObject, Query, ResourceKind, find_unique,
};

use super::resource::{Changeset, Resource, changed_opt, fill};

fn lookup_query(kind: ResourceKind, id: Option<&String>, name: &str) -> Query {
    match id {
        Some(id) => Query::by_id(kind, id),
        None => Query::by_name(kind, name),
    }
}

/// A VPC subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    /// Logical name.
    pub name: String,
    /// Provider id.
    pub id: Option<String>,
    /// Address block.
    pub cidr: Option<String>,
    /// Availability zone.
    pub zone: Option<String>,
    /// Pre-existing object.
    pub shared: bool,
}

#[derive(Debug, Deserialize)]
struct SubnetAttributes {
    cidr_block: Option<String>,
    availability_zone: Option<String>,
}

/// Fields of a [`Subnet`] that differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubnetChanges {
    /// Provider id.
    pub id: Option<String>,
    /// Address block.
    pub cidr: Option<String>,
    /// Availability zone.
    pub zone: Option<String>,
}

impl Changeset for SubnetChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("ID", self.id.is_some()),
            ("CIDR", self.cidr.is_some()),
            ("AvailabilityZone", self.zone.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

#[async_trait]
impl Resource for Subnet {
    type Changes = SubnetChanges;

    const KIND: ResourceKind = ResourceKind::Subnet;

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_shared(&self) -> bool {
        self.shared
    }

    async fn find(&self, cloud: &dyn CloudProvider) -> Result<Option<Self>> {
        let query = lookup_query(Self::KIND, self.id.as_ref(), &self.name);
        let Some(object) = find_unique(cloud, &query, &self.key().to_string()).await? else {
            return Ok(None);
        };
        let attributes: SubnetAttributes = object.decode()?;
        Ok(Some(Self {
            name: self.name.clone(),
            id: Some(object.id),
            cidr: attributes.cidr_block,
            zone: attributes.availability_zone,
            shared: self.shared,
        }))
    }

    fn diff(actual: Option<&Self>, expected: &mut Self) -> SubnetChanges {
        if let Some(actual) = actual {
            fill(&mut expected.id, actual.id.as_ref());
            fill(&mut expected.cidr, actual.cidr.as_ref());
            fill(&mut expected.zone, actual.zone.as_ref());
        }
        SubnetChanges {
            id: changed_opt(actual.and_then(|a| a.id.as_ref()), expected.id.as_ref()),
            cidr: changed_opt(actual.and_then(|a| a.cidr.as_ref()), expected.cidr.as_ref()),
            zone: changed_opt(actual.and_then(|a| a.zone.as_ref()), expected.zone.as_ref()),
        }
    }

    fn check_changes(actual: Option<&Self>, expected: &Self, changes: &SubnetChanges) -> Result<()> {
        let resource = expected.key().to_string();
        if actual.is_none() {
            if expected.cidr.is_none() {
                return Err(TaskError::RequiredField {
                    resource,
                    field: "CIDR",
                }
                .into());
            }
            return Ok(());
        }
        let field = if changes.cidr.is_some() {
            "CIDR"
        } else if changes.zone.is_some() {
            "AvailabilityZone"
        } else if changes.id.is_some() {
            "ID"
        } else {
            return Ok(());
        };
        Err(TaskError::CannotChangeField { resource, field }.into())
    }

    fn create_request(&self) -> CreateRequest {
        CreateRequest {
            kind: Self::KIND,
            name: self.name.clone(),
            spec: self.document(),
        }
    }

    fn absorb(&mut self, object: &ProviderObject) {
        self.id = Some(object.id.clone());
        fill(&mut self.zone, object.attribute("availability_zone").as_ref());
    }

    fn mutations(&self, _actual: Option<&Self>, _changes: &SubnetChanges) -> Result<Vec<Mutation>> {
        Ok(Vec::new())
    }

    fn document(&self) -> serde_json::Value {
        json!({
            "cidr_block": self.cidr,
            "availability_zone": self.zone,
        })
    }
}

/// A security group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    /// Logical name.
    pub name: String,
    /// Provider id.
    pub id: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Pre-existing object.
    pub shared: bool,
}

/// Fields of a [`SecurityGroup`] that differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroupChanges {
    /// Provider id.
    pub id: Option<String>,
    /// Description.
    pub description: Option<String>,
}

impl Changeset for SecurityGroupChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.id.is_some() {
            fields.push("ID");
        }
        if self.description.is_some() {
            fields.push("Description");
        }
        fields
    }
}

impl SecurityGroup {
    fn description_or_default(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Security group {}", self.name))
    }
}

#[async_trait]
impl Resource for SecurityGroup {
    type Changes = SecurityGroupChanges;

    const KIND: ResourceKind = ResourceKind::SecurityGroup;

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn is_shared(&self) -> bool {
        self.shared
    }

    async fn find(&self, cloud: &dyn CloudProvider) -> Result<Option<Self>> {
        let query = lookup_query(Self::KIND, self.id.as_ref(), &self.name);
        Ok(find_unique(cloud, &query, &self.key().to_string())
            .await?
            .map(|object| Self {
                name: self.name.clone(),
                description: object.attribute("description"),
                id: Some(object.id),
                shared: self.shared,
            }))
    }

    fn diff(actual: Option<&Self>, expected: &mut Self) -> SecurityGroupChanges {
        if let Some(actual) = actual {
            fill(&mut expected.id, actual.id.as_ref());
            fill(&mut expected.description, actual.description.as_ref());
        }
        SecurityGroupChanges {
            id: changed_opt(actual.and_then(|a| a.id.as_ref()), expected.id.as_ref()),
            description: changed_opt(
                actual.and_then(|a| a.description.as_ref()),
                expected.description.as_ref(),
            ),
        }
    }

    fn check_changes(actual: Option<&Self>, expected: &Self, changes: &SecurityGroupChanges) -> Result<()> {
        if actual.is_none() {
            return Ok(());
        }
        let field = if changes.description.is_some() {
            "Description"
        } else if changes.id.is_some() {
            "ID"
        } else {
            return Ok(());
        };
        Err(TaskError::CannotChangeField {
            resource: expected.key().to_string(),
            field,
        }
        .into())
    }

    fn create_request(&self) -> CreateRequest {
        CreateRequest {
            kind: Self::KIND,
            name: self.name.clone(),
            spec: self.document(),
        }
    }

    fn absorb(&mut self, object: &ProviderObject) {
        self.id = Some(object.id.clone());
    }

    fn mutations(&self, _actual: Option<&Self>, _changes: &SecurityGroupChanges) -> Result<Vec<Mutation>> {
        Ok(Vec::new())
    }

    fn document(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "description": self.description_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvergeError;
    use crate::provider::MemoryCloud;
    use std::collections::BTreeMap;

    fn subnet() -> Subnet {
        Subnet {
            name: String::from("utility-a"),
            id: None,
            cidr: Some(String::from("10.0.0.0/24")),
            zone: Some(String::from("us-east-1a")),
            shared: false,
        }
    }

    #[test]
    fn test_subnet_requires_cidr_on_create() {
        let mut expected = subnet();
        expected.cidr = None;
        let changes = Subnet::diff(None, &mut expected);

        let err = Subnet::check_changes(None, &expected, &changes).unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::Task(TaskError::RequiredField { field: "CIDR", .. })
        ));
    }

    #[test]
    fn test_subnet_cidr_is_immutable() {
        let mut actual = subnet();
        actual.id = Some(String::from("subnet-1"));
        let mut expected = subnet();
        expected.cidr = Some(String::from("10.0.1.0/24"));

        let changes = Subnet::diff(Some(&actual), &mut expected);
        let err = Subnet::check_changes(Some(&actual), &expected, &changes).unwrap_err();
        assert!(err.to_string().contains("CIDR cannot be changed"));
    }

    #[tokio::test]
    async fn test_security_group_found_by_name_tag() {
        let cloud = MemoryCloud::new();
        cloud
            .seed(ProviderObject {
                kind: ResourceKind::SecurityGroup,
                id: String::from("sg-9"),
                tags: BTreeMap::from([(String::from("Name"), String::from("web"))]),
                attributes: json!({ "description": "web traffic" }),
            })
            .await;

        let expected = SecurityGroup {
            name: String::from("web"),
            id: None,
            description: None,
            shared: false,
        };
        let mut expected_mut = expected.clone();
        let actual = expected.find(&cloud).await.unwrap().unwrap();
        let changes = SecurityGroup::diff(Some(&actual), &mut expected_mut);

        assert_eq!(actual.id.as_deref(), Some("sg-9"));
        assert!(changes.is_empty());
        assert_eq!(expected_mut.description.as_deref(), Some("web traffic"));
    }
}
