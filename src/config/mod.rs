//! Configuration module for the convergence engine.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `converge.yaml`
//! - Validation of declarations and cross-references
//! - Computing content hashes for change detection

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    ClusterConfig, ClusterSettings, DnsConfig, ElasticIpConfig, EngineConfig, KubernetesConfig,
    ListenerConfig, LoadBalancerConfig, SecurityGroupConfig, SubnetConfig,
};
pub use parser::{ConfigParser, find_config_file};
pub use validator::{ConfigValidator, ValidationResult};
pub use hash::ConfigHasher;
