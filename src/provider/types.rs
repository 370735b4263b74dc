//! Provider boundary types.
//!
//! These are backend-neutral shapes for the describe, create, update and tag
//! calls. Resource-specific fields travel in `attributes` / `spec` as JSON and
//! are decoded by the resource types that own them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ProviderError;

/// Kinds of cloud objects managed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A VPC subnet.
    Subnet,
    /// A security group.
    SecurityGroup,
    /// A classic load balancer.
    LoadBalancer,
    /// An elastic (static public) IP address.
    ElasticIp,
}

impl ResourceKind {
    /// Returns the display name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subnet => "Subnet",
            Self::SecurityGroup => "SecurityGroup",
            Self::LoadBalancer => "LoadBalancer",
            Self::ElasticIp => "ElasticIP",
        }
    }

    /// Returns the resource type used in generated infrastructure code.
    #[must_use]
    pub const fn codegen_type(self) -> &'static str {
        match self {
            Self::Subnet => "aws_subnet",
            Self::SecurityGroup => "aws_security_group",
            Self::LoadBalancer => "aws_elb",
            Self::ElasticIp => "aws_eip",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a describe call selects objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// By provider-assigned identifier.
    Id(String),
    /// By logical name (`Name` tag, or the object name where the provider has one).
    Name(String),
    /// By public address (elastic IPs).
    PublicIp(String),
}

/// A describe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Kind of object to describe.
    pub kind: ResourceKind,
    /// Selection filter.
    pub filter: Filter,
}

impl Query {
    /// Query by provider id.
    #[must_use]
    pub fn by_id(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            filter: Filter::Id(id.into()),
        }
    }

    /// Query by logical name.
    #[must_use]
    pub fn by_name(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            filter: Filter::Name(name.into()),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Filter::Id(id) => write!(f, "{} id={id}", self.kind),
            Filter::Name(name) => write!(f, "{} name={name}", self.kind),
            Filter::PublicIp(ip) => write!(f, "{} public-ip={ip}", self.kind),
        }
    }
}

/// An object as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderObject {
    /// Kind of the object.
    pub kind: ResourceKind,
    /// Provider-assigned identifier.
    pub id: String,
    /// Tags currently on the object.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Kind-specific attributes.
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl ProviderObject {
    /// Returns a string attribute, if present.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(String::from)
    }

    /// Decodes the attributes into a kind-specific description.
    ///
    /// # Errors
    ///
    /// Returns an error if the attributes do not match the expected shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProviderError> {
        serde_json::from_value(self.attributes.clone()).map_err(|e| {
            ProviderError::api(
                "InvalidResponse",
                format!("unexpected {} attributes for {}: {e}", self.kind, self.id),
            )
        })
    }
}

/// A create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Kind of object to create.
    pub kind: ResourceKind,
    /// Logical name of the object.
    pub name: String,
    /// Full creation spec.
    pub spec: serde_json::Value,
}

/// An update request against an existing object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Kind of object to update.
    pub kind: ResourceKind,
    /// Provider id of the object.
    pub id: String,
    /// Provider operation, e.g. `create_listeners`.
    pub operation: String,
    /// Partial spec for the operation.
    pub spec: serde_json::Value,
}

/// A provider call issued after create or for an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Apply an update operation.
    Update(UpdateRequest),
    /// Merge tags onto an object (not necessarily the object being rendered).
    Tag {
        /// Object to tag.
        id: String,
        /// Tags to merge.
        tags: BTreeMap<String, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Address {
        public_ip: String,
    }

    #[test]
    fn test_decode_attributes() {
        let object = ProviderObject {
            kind: ResourceKind::ElasticIp,
            id: String::from("eipalloc-1"),
            tags: BTreeMap::new(),
            attributes: json!({ "public_ip": "203.0.113.7" }),
        };

        let address: Address = object.decode().unwrap();
        assert_eq!(address.public_ip, "203.0.113.7");
        assert_eq!(object.attribute("public_ip").as_deref(), Some("203.0.113.7"));
        assert_eq!(object.attribute("missing"), None);
    }

    #[test]
    fn test_decode_mismatch_is_provider_error() {
        let object = ProviderObject {
            kind: ResourceKind::ElasticIp,
            id: String::from("eipalloc-1"),
            tags: BTreeMap::new(),
            attributes: json!({ "public_ip": 7 }),
        };

        let result: Result<Address, _> = object.decode();
        assert!(matches!(result, Err(ProviderError::Api { .. })));
    }

    #[test]
    fn test_query_display() {
        let query = Query::by_name(ResourceKind::LoadBalancer, "api");
        assert_eq!(query.to_string(), "LoadBalancer name=api");
    }
}
