//! Task executor.
//!
//! Walks the dependency order sequentially. A failed resource does not undo
//! resources already applied; resources that depend on it, directly or
//! transitively, are skipped and every unrelated resource still runs.

use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{Result, TaskError};
use crate::model::{Registry, ResourceKey, RunContext, Task};

use super::graph::execution_order;
use super::report::{ResourceResult, ResourceStatus, RunReport};

/// Executes a task set against one render target.
#[derive(Debug, Clone)]
pub struct Executor {
    ctx: RunContext,
}

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Runs every task in dependency order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the task set cannot be ordered (duplicate,
    /// undeclared reference or cycle); no task runs in that case.
    /// Per-resource failures are recorded in the report.
    pub async fn execute(&self, mut tasks: Vec<Box<dyn Task>>) -> Result<RunReport> {
        let order = execution_order(&tasks)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, target = self.ctx.target.name());

        async {
            let started_at = Utc::now();
            info!("Reconciling {} resources", tasks.len());

            let mut registry = Registry::new();
            let mut failed: BTreeSet<ResourceKey> = BTreeSet::new();
            let mut results = Vec::with_capacity(tasks.len());

            for i in order {
                let task = &mut tasks[i];
                let key = task.key();

                let failed_dep = task.dependencies().into_iter().find(|d| failed.contains(d));
                if let Some(dependency) = failed_dep {
                    let skipped = TaskError::DependencyFailed {
                        resource: key.to_string(),
                        dependency: dependency.to_string(),
                    };
                    warn!("{skipped}");
                    failed.insert(key.clone());
                    results.push(ResourceResult {
                        key,
                        status: ResourceStatus::Skipped {
                            dependency: dependency.to_string(),
                        },
                    });
                    continue;
                }

                let status = match task.run(&self.ctx, &mut registry).await {
                    Ok(outcome) => {
                        info!("{key}: {outcome}");
                        ResourceStatus::Done { outcome }
                    }
                    Err(e) => {
                        error!("{key}: {e}");
                        failed.insert(key.clone());
                        ResourceStatus::Failed {
                            message: e.to_string(),
                        }
                    }
                };
                results.push(ResourceResult { key, status });
            }

            let report = RunReport {
                run_id,
                target: self.ctx.target.name().to_string(),
                started_at,
                finished_at: Utc::now(),
                results,
            };
            info!(
                "Run finished: {} succeeded, {} failed, {} skipped",
                report.succeeded(),
                report.failed(),
                report.skipped()
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConvergeError, TaskError};
    use crate::model::TaskOutcome;
    use crate::provider::ResourceKind;
    use crate::target::CodegenTarget;
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Scripted {
        key: ResourceKey,
        deps: Vec<ResourceKey>,
        fail: bool,
    }

    #[async_trait]
    impl Task for Scripted {
        fn key(&self) -> ResourceKey {
            self.key.clone()
        }

        fn dependencies(&self) -> Vec<ResourceKey> {
            self.deps.clone()
        }

        async fn run(&mut self, _ctx: &RunContext, registry: &mut Registry) -> Result<TaskOutcome> {
            if self.fail {
                return Err(ConvergeError::Task(TaskError::RequiredField {
                    resource: self.key.to_string(),
                    field: "CIDR",
                }));
            }
            registry.record(self.key.clone(), "handle");
            Ok(TaskOutcome::Created)
        }
    }

    fn scripted(kind: ResourceKind, name: &str, deps: &[&ResourceKey], fail: bool) -> Box<dyn Task> {
        Box::new(Scripted {
            key: ResourceKey::new(kind, name),
            deps: deps.iter().map(|d| (*d).clone()).collect(),
            fail,
        })
    }

    fn executor() -> Executor {
        Executor::new(RunContext {
            cloud: None,
            target: Arc::new(CodegenTarget::new()),
        })
    }

    #[tokio::test]
    async fn test_failure_skips_dependents_only() {
        let bad = ResourceKey::new(ResourceKind::Subnet, "bad");
        let good = ResourceKey::new(ResourceKind::Subnet, "good");
        let lb = ResourceKey::new(ResourceKind::LoadBalancer, "api");
        let eip = ResourceKey::new(ResourceKind::ElasticIp, "nat");

        let tasks = vec![
            scripted(ResourceKind::LoadBalancer, "api", &[&bad], false),
            scripted(ResourceKind::ElasticIp, "nat", &[&good], false),
            scripted(ResourceKind::Subnet, "bad", &[], true),
            scripted(ResourceKind::Subnet, "good", &[], false),
        ];

        let report = executor().execute(tasks).await.unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.is_success());
        assert_eq!(
            report.status(&lb),
            Some(&ResourceStatus::Skipped {
                dependency: bad.to_string()
            })
        );
        assert_eq!(
            report.status(&eip),
            Some(&ResourceStatus::Done {
                outcome: TaskOutcome::Created
            })
        );
        let failure = report.status(&bad).unwrap();
        assert!(matches!(failure, ResourceStatus::Failed { message } if message.contains("CIDR")));
    }

    #[tokio::test]
    async fn test_cycle_runs_nothing() {
        let a = ResourceKey::new(ResourceKind::LoadBalancer, "a");
        let b = ResourceKey::new(ResourceKind::LoadBalancer, "b");
        let tasks = vec![
            scripted(ResourceKind::LoadBalancer, "a", &[&b], false),
            scripted(ResourceKind::LoadBalancer, "b", &[&a], false),
        ];

        let err = executor().execute(tasks).await.unwrap_err();
        assert!(matches!(err, ConvergeError::Config(_)));
    }
}
