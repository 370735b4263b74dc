//! Live-mutation target.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{ConvergeError, Result, TaskError};
use crate::model::{Renderable, ResourceKey, TaskOutcome};
use crate::provider::{CloudProvider, Mutation, find_unique};

use super::RenderTarget;

/// Applies changesets through a [`CloudProvider`].
#[derive(Clone)]
pub struct LiveTarget {
    cloud: Arc<dyn CloudProvider>,
    confirm_attempts: u32,
    confirm_delay: Duration,
}

impl std::fmt::Debug for LiveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTarget")
            .field("confirm_attempts", &self.confirm_attempts)
            .field("confirm_delay", &self.confirm_delay)
            .finish_non_exhaustive()
    }
}

impl LiveTarget {
    /// Creates a live target.
    #[must_use]
    pub fn new(cloud: Arc<dyn CloudProvider>, engine: &EngineConfig) -> Self {
        Self {
            cloud,
            confirm_attempts: engine.create_confirm_attempts.max(1),
            confirm_delay: Duration::from_millis(engine.create_confirm_delay_ms),
        }
    }

    /// Re-reads a just-created object until it is visible.
    async fn confirm_created(&self, resource: &mut dyn Renderable) -> Result<()> {
        let key = resource.key();
        let Some(query) = resource.lookup() else {
            return Ok(());
        };

        for attempt in 1..=self.confirm_attempts {
            if let Some(object) = find_unique(self.cloud.as_ref(), &query, &key.to_string()).await? {
                resource.absorb(&object);
                return Ok(());
            }
            if attempt < self.confirm_attempts {
                debug!("{key}: not visible after create (attempt {attempt}), retrying");
                tokio::time::sleep(self.confirm_delay).await;
            }
        }

        warn!("{key}: still not visible after {} lookups", self.confirm_attempts);
        Err(TaskError::CreatedButNotFound {
            resource: key.to_string(),
            attempts: self.confirm_attempts,
        }
        .into())
    }

    async fn apply(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::Update(request) => self.cloud.update(request).await?,
            Mutation::Tag { id, tags } => self.cloud.tag(id, tags).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl RenderTarget for LiveTarget {
    fn name(&self) -> &'static str {
        "live"
    }

    fn renders_unchanged(&self) -> bool {
        false
    }

    fn handle(&self, _key: &ResourceKey, provider_id: Option<&str>) -> Option<String> {
        provider_id.map(String::from)
    }

    async fn render(&self, resource: &mut dyn Renderable) -> Result<TaskOutcome> {
        let key = resource.key();
        let changed = resource.changed_fields();

        // Check update paths before any call so an unsupported change touches nothing.
        if !resource.is_create() {
            resource.mutations()?;
        }

        let outcome = if resource.is_create() {
            let request = resource.create_request();
            info!("{key}: creating");
            let created = self.cloud.create(&request).await?;
            resource.absorb(&created);
            self.confirm_created(resource).await?;
            TaskOutcome::Created
        } else {
            info!("{key}: updating {changed:?}");
            TaskOutcome::Updated(changed)
        };

        for mutation in resource.mutations()? {
            self.apply(&mutation).await?;
        }

        let id = resource
            .provider_id()
            .ok_or_else(|| ConvergeError::internal(format!("{key}: no provider id after render")))?;
        self.cloud.tag(&id, resource.tags()).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoadBalancer, Pending, Resource};
    use crate::provider::{MemoryCloud, ProviderCall};
    use std::collections::BTreeMap;

    fn engine(attempts: u32) -> EngineConfig {
        EngineConfig {
            call_timeout_secs: 5,
            create_confirm_attempts: attempts,
            create_confirm_delay_ms: 1,
        }
    }

    fn expected() -> LoadBalancer {
        let mut lb = LoadBalancer::new("api");
        lb.subnets = vec![String::from("subnet-a")];
        lb.security_groups = vec![String::from("sg-1")];
        lb
    }

    #[tokio::test]
    async fn test_create_confirms_with_bounded_retry() {
        let cloud = Arc::new(MemoryCloud::new());
        cloud.set_lookup_lag(2).await;
        let target = LiveTarget::new(cloud.clone(), &engine(3));

        let mut lb = expected();
        let changes = LoadBalancer::diff(None, &mut lb);
        let tags = BTreeMap::new();
        let outcome = target
            .render(&mut Pending::new(None, &mut lb, &changes, &tags))
            .await
            .unwrap();

        assert_eq!(outcome, TaskOutcome::Created);
        assert!(lb.hosted_zone_id.is_some());
    }

    #[tokio::test]
    async fn test_create_not_found_after_retries() {
        let cloud = Arc::new(MemoryCloud::new());
        cloud.set_lookup_lag(5).await;
        let target = LiveTarget::new(cloud.clone(), &engine(2));

        let mut lb = expected();
        let changes = LoadBalancer::diff(None, &mut lb);
        let tags = BTreeMap::new();
        let err = target
            .render(&mut Pending::new(None, &mut lb, &changes, &tags))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::Task(TaskError::CreatedButNotFound { attempts: 2, .. })
        ));
        assert!(
            !cloud
                .calls()
                .await
                .iter()
                .any(|c| matches!(c, ProviderCall::Tag { .. })),
            "nothing is tagged after a failed confirmation"
        );
    }

    #[tokio::test]
    async fn test_unsupported_update_issues_no_calls() {
        let cloud = Arc::new(MemoryCloud::new());
        let target = LiveTarget::new(cloud.clone(), &engine(1));

        let mut actual = expected();
        actual.id = Some(String::from("api"));
        let mut lb = expected();
        lb.subnets.push(String::from("subnet-b"));
        let changes = LoadBalancer::diff(Some(&actual), &mut lb);
        let tags = BTreeMap::new();

        let err = target
            .render(&mut Pending::new(Some(&actual), &mut lb, &changes, &tags))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Subnets"));
        assert!(cloud.calls().await.is_empty());
    }
}
