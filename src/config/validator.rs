//! Configuration validation for cluster declarations.
//!
//! Catches declaration mistakes before any provider call is made: empty or
//! duplicated names, references to undeclared objects, and shared objects
//! that cannot be looked up.

use crate::error::{ConfigError, ConvergeError, Result};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use super::spec::{ClusterConfig, ElasticIpConfig, LoadBalancerConfig};

/// Validator for cluster configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Serialize)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a cluster configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &ClusterConfig) -> Result<ValidationResult> {
        let result = self.check(config);
        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ConvergeError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &ClusterConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        if config.cluster.name.trim().is_empty() {
            result.push_error("cluster.name", "Cluster name cannot be empty");
        }

        let subnets = Self::validate_network(config, &mut result);
        let groups: HashSet<&str> = config
            .security_groups
            .iter()
            .map(|g| g.name.as_str())
            .collect();

        Self::validate_load_balancers(&config.load_balancers, &subnets, &groups, &mut result);
        Self::validate_elastic_ips(&config.elastic_ips, &subnets, &mut result);
        Self::validate_dns(config, &mut result);

        if config.engine.call_timeout_secs == 0 {
            result.push_error(
                "engine.call_timeout_secs",
                "Provider call timeout must be at least 1 second",
            );
        }

        if config.resource_count() == 0 && config.dns.is_none() {
            result
                .warnings
                .push(String::from("No resources or DNS settings declared"));
        }

        result
    }

    /// Validates subnets and security groups, returning declared subnet names.
    fn validate_network<'a>(
        config: &'a ClusterConfig,
        result: &mut ValidationResult,
    ) -> HashSet<&'a str> {
        let mut subnets = HashSet::new();
        for (i, subnet) in config.subnets.iter().enumerate() {
            let prefix = format!("subnets[{i}]");
            result.check_name(&prefix, &subnet.name);
            if !subnets.insert(subnet.name.as_str()) {
                result.push_error(
                    format!("{prefix}.name"),
                    format!("Duplicate subnet name: {}", subnet.name),
                );
            }
            if subnet.shared && subnet.id.is_none() {
                result.push_error(
                    format!("{prefix}.id"),
                    format!("Shared subnet '{}' must declare an id", subnet.name),
                );
            }
            if !subnet.shared && subnet.cidr.is_none() {
                result.warnings.push(format!(
                    "{prefix}.cidr: subnet '{}' has no CIDR and can only be found, not created",
                    subnet.name
                ));
            }
        }

        let mut groups = HashSet::new();
        for (i, group) in config.security_groups.iter().enumerate() {
            let prefix = format!("security_groups[{i}]");
            result.check_name(&prefix, &group.name);
            if !groups.insert(group.name.as_str()) {
                result.push_error(
                    format!("{prefix}.name"),
                    format!("Duplicate security group name: {}", group.name),
                );
            }
            if group.shared && group.id.is_none() {
                result.push_error(
                    format!("{prefix}.id"),
                    format!("Shared security group '{}' must declare an id", group.name),
                );
            }
        }

        subnets
    }

    /// Validates load balancer declarations.
    fn validate_load_balancers(
        load_balancers: &[LoadBalancerConfig],
        subnets: &HashSet<&str>,
        groups: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let mut seen = HashSet::new();
        for (i, lb) in load_balancers.iter().enumerate() {
            let prefix = format!("load_balancers[{i}]");
            result.check_name(&prefix, &lb.name);
            if !seen.insert(lb.name.as_str()) {
                result.push_error(
                    format!("{prefix}.name"),
                    format!("Duplicate load balancer name: {}", lb.name),
                );
            }

            for (j, subnet) in lb.subnets.iter().enumerate() {
                if !subnets.contains(subnet.as_str()) {
                    result.push_error(
                        format!("{prefix}.subnets[{j}]"),
                        format!("Load balancer '{}' references undeclared subnet '{subnet}'", lb.name),
                    );
                }
            }

            for (j, group) in lb.security_groups.iter().enumerate() {
                if !groups.contains(group.as_str()) {
                    result.push_error(
                        format!("{prefix}.security_groups[{j}]"),
                        format!(
                            "Load balancer '{}' references undeclared security group '{group}'",
                            lb.name
                        ),
                    );
                }
            }

            for (port, listener) in &lb.listeners {
                if *port == 0 || listener.instance_port == 0 {
                    result.push_error(
                        format!("{prefix}.listeners.{port}"),
                        String::from("Listener ports must be between 1 and 65535"),
                    );
                }
            }

            if lb.listeners.is_empty() {
                result
                    .warnings
                    .push(format!("{prefix}.listeners: load balancer '{}' has no listeners", lb.name));
            }
        }
    }

    /// Validates elastic IP declarations.
    fn validate_elastic_ips(
        elastic_ips: &[ElasticIpConfig],
        subnets: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let mut seen = HashSet::new();
        for (i, eip) in elastic_ips.iter().enumerate() {
            let prefix = format!("elastic_ips[{i}]");
            result.check_name(&prefix, &eip.name);
            if !seen.insert(eip.name.as_str()) {
                result.push_error(
                    format!("{prefix}.name"),
                    format!("Duplicate elastic IP name: {}", eip.name),
                );
            }
            if !subnets.contains(eip.subnet.as_str()) {
                result.push_error(
                    format!("{prefix}.subnet"),
                    format!("Elastic IP '{}' references undeclared subnet '{}'", eip.name, eip.subnet),
                );
            }
        }
    }

    /// Validates DNS settings.
    fn validate_dns(config: &ClusterConfig, result: &mut ValidationResult) {
        let Some(dns) = &config.dns else {
            return;
        };

        if dns.zone.trim().is_empty() {
            result.push_error("dns.zone", "DNS zone cannot be empty");
        }
        if dns.scopes.is_empty() {
            result.push_error("dns.scopes", "At least one DNS scope is required");
        }
        let mut seen = HashSet::new();
        for (i, scope) in dns.scopes.iter().enumerate() {
            if !seen.insert(scope.as_str()) {
                result.push_error(
                    format!("dns.scopes[{i}]"),
                    format!("Duplicate DNS scope '{scope}'"),
                );
            }
            if scope != "ingress" {
                result.push_error(
                    format!("dns.scopes[{i}]"),
                    format!("Unsupported DNS scope '{scope}'"),
                );
            }
        }
        if dns.retry_interval_secs == 0 {
            result.push_error("dns.retry_interval_secs", "Retry interval must be at least 1 second");
        }
        if dns.kubernetes.server.is_some() && dns.kubernetes.context.is_some() {
            result.push_error(
                "dns.kubernetes",
                "Set either a Kubernetes server or a kubeconfig context, not both",
            );
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn push_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    fn check_name(&mut self, prefix: &str, name: &str) {
        if name.trim().is_empty() {
            self.push_error(format!("{prefix}.name"), "Name cannot be empty");
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> ClusterConfig {
        ConfigParser::new().parse_yaml(yaml, None).unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse(
            r"
cluster:
  name: prod.example.com
subnets:
  - name: a
    id: subnet-1
    shared: true
security_groups:
  - name: sg
    description: elb
load_balancers:
  - name: api
    subnets: [a]
    security_groups: [sg]
    listeners:
      443: { instance_port: 443 }
",
        );

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_undeclared_subnet_reference() {
        let config = parse(
            r"
cluster:
  name: prod.example.com
load_balancers:
  - name: api
    subnets: [missing]
",
        );

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        match err {
            ConvergeError::Config(ConfigError::ValidationError { field, message }) => {
                assert_eq!(field.as_deref(), Some("load_balancers[0].subnets[0]"));
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shared_subnet_requires_id() {
        let config = parse(
            r"
cluster:
  name: prod.example.com
subnets:
  - name: a
    shared: true
",
        );

        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_elastic_ip() {
        let config = parse(
            r"
cluster:
  name: prod.example.com
subnets:
  - name: a
    cidr: 10.0.0.0/24
elastic_ips:
  - name: nat
    subnet: a
  - name: nat
    subnet: a
",
        );

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate elastic IP name"));
    }

    #[test]
    fn test_zero_call_timeout_is_rejected() {
        let config = parse(
            r"
cluster:
  name: prod.example.com
engine:
  call_timeout_secs: 0
",
        );

        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "engine.call_timeout_secs");
    }

    #[test]
    fn test_server_and_context_are_exclusive() {
        let config = parse(
            r"
cluster:
  name: prod.example.com
dns:
  zone: example.com
  kubernetes:
    server: https://10.0.0.1:6443
    context: prod
",
        );

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("not both"));
    }
}
