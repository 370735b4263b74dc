//! Code-generation target.
//!
//! Emits every resource as a declarative JSON document of the form
//! `{"resource": {"<type>": {"<name>": {...}}}}`. Nothing is sent to the
//! provider; references to resources created in the same document use
//! interpolation links such as `${aws_elb.api.id}`.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ConfigError, ConvergeError, Result};
use crate::model::{Renderable, ResourceKey, TaskOutcome};

use super::RenderTarget;

type Documents = BTreeMap<&'static str, BTreeMap<String, Value>>;

/// Collects rendered resources into one document.
#[derive(Debug, Default)]
pub struct CodegenTarget {
    resources: Mutex<Documents>,
}

/// Name usable as a resource label in generated code.
fn label(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}

impl CodegenTarget {
    /// Creates an empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbolic reference to an attribute of a rendered resource.
    #[must_use]
    pub fn link(key: &ResourceKey, attribute: &str) -> String {
        format!("${{{}.{}.{attribute}}}", key.kind.codegen_type(), label(&key.name))
    }

    /// Fails if two resources of one kind would render under the same
    /// label, which would make one document replace the other.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LabelCollision`] naming both resources.
    pub fn check_labels<'k>(keys: impl IntoIterator<Item = &'k ResourceKey>) -> Result<()> {
        let mut seen: BTreeMap<(&'static str, String), &ResourceKey> = BTreeMap::new();
        for key in keys {
            let kind = key.kind.codegen_type();
            let label = label(&key.name);
            if let Some(first) = seen.insert((kind, label.clone()), key) {
                return Err(ConfigError::LabelCollision {
                    label: format!("{kind}.{label}"),
                    first: first.to_string(),
                    second: key.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The full generated document.
    pub async fn document(&self) -> Value {
        let resources = self.resources.lock().await;
        let by_type: Map<String, Value> = resources
            .iter()
            .map(|(kind, named)| {
                let named: Map<String, Value> =
                    named.iter().map(|(n, d)| (n.clone(), d.clone())).collect();
                ((*kind).to_string(), Value::Object(named))
            })
            .collect();
        json!({ "resource": by_type })
    }

    /// Writes the generated document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.document().await)
            .map_err(|e| ConvergeError::internal(format!("Failed to serialize document: {e}")))?;
        tokio::fs::write(path, content).await?;
        info!("Wrote generated document to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl RenderTarget for CodegenTarget {
    fn name(&self) -> &'static str {
        "codegen"
    }

    fn renders_unchanged(&self) -> bool {
        true
    }

    fn handle(&self, key: &ResourceKey, _provider_id: Option<&str>) -> Option<String> {
        Some(Self::link(key, "id"))
    }

    async fn render(&self, resource: &mut dyn Renderable) -> Result<TaskOutcome> {
        let key = resource.key();
        let mut document = resource.document();
        if let Some(object) = document.as_object_mut() {
            let tags: Map<String, Value> = resource
                .tags()
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            if !tags.is_empty() {
                object.insert(String::from("tags"), Value::Object(tags));
            }
        }

        debug!("{key}: rendering {}", key.kind.codegen_type());
        self.resources
            .lock()
            .await
            .entry(key.kind.codegen_type())
            .or_default()
            .insert(label(&key.name), document);
        Ok(TaskOutcome::Rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElasticIp, LoadBalancer, Pending, Resource};
    use crate::provider::ResourceKind;

    #[test]
    fn test_label_collision_is_rejected() {
        let keys = [
            ResourceKey::new(ResourceKind::Subnet, "utility.a"),
            ResourceKey::new(ResourceKind::Subnet, "utility-a"),
        ];
        let err = CodegenTarget::check_labels(&keys).unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::Config(ConfigError::LabelCollision { ref label, .. }) if label == "aws_subnet.utility-a"
        ));
    }

    #[test]
    fn test_same_label_across_kinds_is_allowed() {
        let keys = [
            ResourceKey::new(ResourceKind::Subnet, "api"),
            ResourceKey::new(ResourceKind::LoadBalancer, "api"),
        ];
        assert!(CodegenTarget::check_labels(&keys).is_ok());
    }

    #[test]
    fn test_link_format() {
        let key = ResourceKey::new(ResourceKind::LoadBalancer, "api.prod");
        assert_eq!(CodegenTarget::link(&key, "id"), "${aws_elb.api-prod.id}");
    }

    #[tokio::test]
    async fn test_renders_full_expected_with_tags() {
        let target = CodegenTarget::new();
        let mut eip = ElasticIp::new("nat");
        let changes = ElasticIp::diff(None, &mut eip);
        let tags = BTreeMap::from([(String::from("KubernetesCluster"), String::from("prod"))]);

        let outcome = target
            .render(&mut Pending::new(None, &mut eip, &changes, &tags))
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Rendered);

        let document = target.document().await;
        assert_eq!(document["resource"]["aws_eip"]["nat"]["vpc"], json!(true));
        assert_eq!(
            document["resource"]["aws_eip"]["nat"]["tags"]["KubernetesCluster"],
            json!("prod")
        );
    }

    #[tokio::test]
    async fn test_unchanged_resource_is_still_rendered() {
        let target = CodegenTarget::new();
        let mut actual = LoadBalancer::new("api");
        actual.subnets = vec![String::from("${aws_subnet.a.id}")];
        actual.security_groups = vec![String::from("sg-1")];
        let mut expected = actual.clone();
        let changes = LoadBalancer::diff(Some(&actual), &mut expected);
        assert!(crate::model::Changeset::is_empty(&changes));

        let tags = BTreeMap::new();
        target
            .render(&mut Pending::new(Some(&actual), &mut expected, &changes, &tags))
            .await
            .unwrap();

        let document = target.document().await;
        assert_eq!(
            document["resource"]["aws_elb"]["api"]["subnets"],
            json!(["${aws_subnet.a.id}"])
        );
    }

    #[tokio::test]
    async fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.tf.json");
        let target = CodegenTarget::new();
        target.write_to(&path).await.unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({ "resource": {} }));
    }
}
