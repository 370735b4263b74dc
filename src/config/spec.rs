//! Configuration specification types for the cluster.
//!
//! This module defines the structs that map to the `converge.yaml` file.
//! They describe desired state only; provider-assigned values are discovered
//! at run time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Cluster-level configuration.
    pub cluster: ClusterSettings,
    /// Subnets, created or shared.
    #[serde(default)]
    pub subnets: Vec<SubnetConfig>,
    /// Security groups, created or shared.
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupConfig>,
    /// Load balancers.
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancerConfig>,
    /// Elastic IPs.
    #[serde(default)]
    pub elastic_ips: Vec<ElasticIpConfig>,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
    /// DNS controller settings.
    #[serde(default)]
    pub dns: Option<DnsConfig>,
}

/// Cluster-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterSettings {
    /// Cluster name, e.g. `prod.example.com`.
    pub name: String,
    /// Operator tags applied to every created or updated object.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A subnet declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubnetConfig {
    /// Logical name.
    pub name: String,
    /// Provider id, required for shared subnets.
    #[serde(default)]
    pub id: Option<String>,
    /// CIDR block for created subnets.
    #[serde(default)]
    pub cidr: Option<String>,
    /// Availability zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Pre-existing subnet that is looked up but never created.
    #[serde(default)]
    pub shared: bool,
}

/// A security group declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityGroupConfig {
    /// Logical name.
    pub name: String,
    /// Provider id, required for shared groups.
    #[serde(default)]
    pub id: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Pre-existing group that is looked up but never created.
    #[serde(default)]
    pub shared: bool,
}

/// A load balancer declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerConfig {
    /// Logical name.
    pub name: String,
    /// Provider-side name, if it differs from `name`.
    #[serde(default)]
    pub id: Option<String>,
    /// Subnet names.
    #[serde(default)]
    pub subnets: Vec<String>,
    /// Security group names.
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// Listeners keyed by load balancer port.
    #[serde(default)]
    pub listeners: BTreeMap<u16, ListenerConfig>,
}

/// A listener declaration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Backend instance port.
    pub instance_port: u16,
}

/// An elastic IP declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElasticIpConfig {
    /// Logical name.
    pub name: String,
    /// Allocation id of an existing address.
    #[serde(default)]
    pub id: Option<String>,
    /// Public address of an existing allocation.
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Subnet the address is associated with.
    pub subnet: String,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on a single provider call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Lookups performed to confirm a create.
    #[serde(default = "default_create_confirm_attempts")]
    pub create_confirm_attempts: u32,
    /// Delay between confirmation lookups.
    #[serde(default = "default_create_confirm_delay_ms")]
    pub create_confirm_delay_ms: u64,
}

/// DNS controller settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsConfig {
    /// Managed zone, e.g. `example.com`.
    pub zone: String,
    /// Source categories to watch.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Fixed delay before re-listing after a watch failure.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Where the merged zone is written.
    #[serde(default)]
    pub zone_file: Option<String>,
    /// Kubernetes API access.
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
}

/// Kubernetes API access settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KubernetesConfig {
    /// API server URL. When unset the kubeconfig or the in-cluster
    /// service account is used.
    #[serde(default)]
    pub server: Option<String>,
    /// Kubeconfig context, when no server is set.
    #[serde(default)]
    pub context: Option<String>,
    /// Environment variable holding the bearer token for `server`.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Namespace to watch; empty means all namespaces.
    #[serde(default)]
    pub namespace: String,
}

// Default value functions

const fn default_call_timeout_secs() -> u64 {
    60
}

const fn default_create_confirm_attempts() -> u32 {
    3
}

const fn default_create_confirm_delay_ms() -> u64 {
    1000
}

const fn default_retry_interval_secs() -> u64 {
    10
}

fn default_scopes() -> Vec<String> {
    vec![String::from("ingress")]
}

fn default_token_env() -> String {
    String::from("KUBE_TOKEN")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            create_confirm_attempts: default_create_confirm_attempts(),
            create_confirm_delay_ms: default_create_confirm_delay_ms(),
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            server: None,
            context: None,
            token_env: default_token_env(),
            namespace: String::new(),
        }
    }
}

impl ClusterConfig {
    /// Returns the total number of declared cloud resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.subnets.len()
            + self.security_groups.len()
            + self.load_balancers.len()
            + self.elastic_ips.len()
    }
}

impl ClusterSettings {
    /// Builds the standard tag set for an object with the given logical name.
    ///
    /// Operator tags come first; `Name` and `KubernetesCluster` always win.
    #[must_use]
    pub fn standard_tags(&self, object_name: &str) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert(String::from("Name"), object_name.to_string());
        tags.insert(String::from("KubernetesCluster"), self.name.clone());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_keys_parse_as_ports() {
        let yaml = r"
name: api
subnets: [a]
security_groups: [sg]
listeners:
  443:
    instance_port: 8443
  80:
    instance_port: 8080
";
        let lb: LoadBalancerConfig = serde_yaml::from_str(yaml).unwrap();
        let ports: Vec<u16> = lb.listeners.keys().copied().collect();
        assert_eq!(ports, vec![80, 443]);
        assert_eq!(lb.listeners[&443].instance_port, 8443);
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.call_timeout_secs, 60);
        assert_eq!(engine.create_confirm_attempts, 3);
    }

    #[test]
    fn test_standard_tags_override_operator_tags() {
        let settings = ClusterSettings {
            name: String::from("prod.example.com"),
            tags: BTreeMap::from([
                (String::from("team"), String::from("infra")),
                (String::from("Name"), String::from("ignored")),
            ]),
        };

        let tags = settings.standard_tags("api");
        assert_eq!(tags["Name"], "api");
        assert_eq!(tags["KubernetesCluster"], "prod.example.com");
        assert_eq!(tags["team"], "infra");
    }
}
