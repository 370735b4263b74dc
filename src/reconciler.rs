//! Reconciler for cloud resources.
//!
//! This module wires a validated configuration to the executor: it builds
//! the task set, bounds provider calls with the configured timeout and
//! selects the render target for the run.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{ClusterConfig, ConfigHasher};
use crate::engine::{Executor, RunReport, execution_order};
use crate::error::{ConfigError, Result};
use crate::model::{RunContext, Task, build_tasks};
use crate::provider::{CloudProvider, TimeoutProvider};
use crate::target::{CodegenTarget, LiveTarget};

/// Which render target a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Mutate live infrastructure.
    Live,
    /// Emit a declarative document.
    Codegen,
}

/// Output of a reconciliation run.
#[derive(Debug)]
pub struct RunOutput {
    /// Per-resource report.
    pub report: RunReport,
    /// Generated document, for code-generation runs.
    pub document: Option<serde_json::Value>,
}

/// Reconciles the cloud resources of one cluster.
#[derive(Debug)]
pub struct Reconciler<'a> {
    /// Configuration.
    config: &'a ClusterConfig,
    /// Configuration hasher.
    hasher: ConfigHasher,
}

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(config: &'a ClusterConfig) -> Self {
        Self {
            config,
            hasher: ConfigHasher::new(),
        }
    }

    /// Builds and orders the task set without running anything.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicates, undeclared references or cycles.
    pub fn plan(&self) -> Result<Vec<Box<dyn Task>>> {
        let tasks = build_tasks(self.config);
        let order = execution_order(&tasks)?;
        let mut slots: Vec<Option<Box<dyn Task>>> = tasks.into_iter().map(Some).collect();
        Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
    }

    /// Runs against the selected target.
    ///
    /// Without a provider, Actual state is not read and every resource is
    /// treated as new; the live target needs one.
    ///
    /// # Errors
    ///
    /// Returns an error if the task set cannot be ordered, or if the live
    /// target is selected without a provider.
    pub async fn run(&self, target: TargetKind, cloud: Option<Arc<dyn CloudProvider>>) -> Result<RunOutput> {
        let hash = self.hasher.hash_config(self.config);
        info!(
            "Reconciling cluster {} (config {}) with {:?} target",
            self.config.cluster.name,
            self.hasher.short_hash(&hash),
            target
        );

        let engine = self.config.engine;
        let cloud = cloud.map(|inner| -> Arc<dyn CloudProvider> {
            Arc::new(TimeoutProvider::new(inner, Duration::from_secs(engine.call_timeout_secs)))
        });
        let tasks = self.plan()?;

        match target {
            TargetKind::Live => {
                let Some(cloud) = cloud else {
                    return Err(ConfigError::validation(
                        "the live target requires a cloud provider",
                        "target",
                    )
                    .into());
                };
                let target = Arc::new(LiveTarget::new(cloud.clone(), &engine));
                let report = Executor::new(RunContext {
                    cloud: Some(cloud),
                    target,
                })
                .execute(tasks)
                .await?;
                Ok(RunOutput {
                    report,
                    document: None,
                })
            }
            TargetKind::Codegen => {
                let keys: Vec<_> = tasks.iter().map(|t| t.key()).collect();
                CodegenTarget::check_labels(&keys)?;
                let target = Arc::new(CodegenTarget::new());
                let report = Executor::new(RunContext {
                    cloud,
                    target: target.clone(),
                })
                .execute(tasks)
                .await?;
                Ok(RunOutput {
                    report,
                    document: Some(target.document().await),
                })
            }
        }
    }

    /// Applies the configuration to live infrastructure.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::run`].
    pub async fn apply(&self, cloud: Arc<dyn CloudProvider>) -> Result<RunReport> {
        Ok(self.run(TargetKind::Live, Some(cloud)).await?.report)
    }

    /// Generates a declarative document, reading Actual state if a provider
    /// is given.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::run`].
    pub async fn render(
        &self,
        cloud: Option<Arc<dyn CloudProvider>>,
    ) -> Result<(RunReport, serde_json::Value)> {
        let output = self.run(TargetKind::Codegen, cloud).await?;
        Ok((output.report, output.document.unwrap_or_default()))
    }
}
