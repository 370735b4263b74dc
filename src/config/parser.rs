//! Configuration parser for loading cluster configuration files.
//!
//! This module handles loading configuration from YAML files, the optional
//! `.env` file beside it, and environment variable overrides.

use crate::error::{ConfigError, ConvergeError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::ClusterConfig;

/// Configuration parser for loading cluster configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ClusterConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConvergeError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvergeError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ClusterConfig> {
        debug!("Parsing YAML configuration");

        let config: ClusterConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConvergeError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Successfully parsed configuration for cluster: {}", config.cluster.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `CONVERGE_CLUSTER_NAME`, `CONVERGE_DNS_ZONE`,
    /// `CONVERGE_KUBE_SERVER`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ClusterConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut ClusterConfig) {
        if let Ok(name) = std::env::var("CONVERGE_CLUSTER_NAME") {
            debug!("Overriding cluster.name from environment");
            config.cluster.name = name;
        }

        if let Some(dns) = config.dns.as_mut() {
            if let Ok(zone) = std::env::var("CONVERGE_DNS_ZONE") {
                debug!("Overriding dns.zone from environment");
                dns.zone = zone;
            }

            if let Ok(server) = std::env::var("CONVERGE_KUBE_SERVER") {
                debug!("Overriding dns.kubernetes.server from environment");
                dns.kubernetes.server = Some(server);
            }
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConvergeError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["converge.yaml", "converge.yml", "cluster.yaml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConvergeError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
cluster:
  name: test.example.com
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(config.cluster.name, "test.example.com");
        assert!(config.load_balancers.is_empty());
        assert!(config.dns.is_none());
        assert_eq!(config.engine.create_confirm_attempts, 3);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
cluster:
  name: prod.example.com
  tags:
    team: infra

subnets:
  - name: utility-a
    id: subnet-0a1
    shared: true
  - name: utility-b
    cidr: 10.0.2.0/24
    zone: us-east-1b

security_groups:
  - name: api-elb
    description: API load balancer

load_balancers:
  - name: api
    subnets: [utility-a, utility-b]
    security_groups: [api-elb]
    listeners:
      443:
        instance_port: 443

elastic_ips:
  - name: nat-a
    subnet: utility-a

dns:
  zone: example.com
  scopes: [ingress]
  retry_interval_secs: 5
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(config.resource_count(), 5);
        assert!(config.subnets[0].shared);
        assert_eq!(config.load_balancers[0].listeners[&443].instance_port, 443);

        let dns = config.dns.unwrap();
        assert_eq!(dns.retry_interval_secs, 5);
        assert_eq!(dns.kubernetes.token_env, "KUBE_TOKEN");
    }

    #[test]
    fn test_invalid_yaml_reports_location() {
        let parser = ConfigParser::new();
        let err = parser
            .parse_yaml("cluster: [", Some(Path::new("converge.yaml")))
            .unwrap_err();

        match err {
            ConvergeError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("converge.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("converge.yaml"), "cluster:\n  name: x\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("converge.yaml"));
    }
}
