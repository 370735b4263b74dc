//! Per-resource task: find, diff, validate, render.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, TaskError};
use crate::provider::{CloudProvider, CreateRequest, Mutation, ProviderObject, Query};
use crate::target::RenderTarget;

use super::reference::{Registry, ResourceKey};
use super::resource::{Changeset, Resource};

/// What happened to a resource that reconciled successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The object was created.
    Created,
    /// The object existed and the listed fields were updated.
    Updated(Vec<&'static str>),
    /// The object already matched.
    Unchanged,
    /// The object was emitted as code.
    Rendered,
    /// The object is pre-existing and only looked up.
    Shared,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Updated(fields) => write!(f, "updated ({})", fields.join(", ")),
            Self::Unchanged => f.write_str("unchanged"),
            Self::Rendered => f.write_str("rendered"),
            Self::Shared => f.write_str("shared"),
        }
    }
}

/// Shared inputs for every task in a run.
#[derive(Clone)]
pub struct RunContext {
    /// Provider to read Actual state from. Without one, every resource is
    /// treated as not existing yet.
    pub cloud: Option<Arc<dyn CloudProvider>>,
    /// Active render target.
    pub target: Arc<dyn RenderTarget>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("cloud", &self.cloud.is_some())
            .field("target", &self.target.name())
            .finish()
    }
}

/// A resource ready to be handed to a render target.
///
/// Object-safe view over `(actual, expected, changeset)`, so targets never
/// depend on concrete resource types.
pub trait Renderable: Send {
    /// Key of the resource.
    fn key(&self) -> ResourceKey;
    /// True if no Actual object exists.
    fn is_create(&self) -> bool;
    /// Provider create call.
    fn create_request(&self) -> CreateRequest;
    /// Captures provider-assigned fields.
    fn absorb(&mut self, object: &ProviderObject);
    /// Confirmation query after create.
    fn lookup(&self) -> Option<Query>;
    /// Provider id, once known.
    fn provider_id(&self) -> Option<String>;
    /// Provider calls implied by the changeset.
    ///
    /// # Errors
    ///
    /// Returns an error when a change has no supported update path.
    fn mutations(&self) -> Result<Vec<Mutation>>;
    /// Full Expected document.
    fn document(&self) -> serde_json::Value;
    /// Standard tags for the object.
    fn tags(&self) -> &BTreeMap<String, String>;
    /// Fields that changed.
    fn changed_fields(&self) -> Vec<&'static str>;
}

/// Borrowed `(actual, expected, changeset)` triple for one resource.
pub struct Pending<'a, R: Resource> {
    actual: Option<&'a R>,
    expected: &'a mut R,
    changes: &'a R::Changes,
    tags: &'a BTreeMap<String, String>,
}

impl<'a, R: Resource> Pending<'a, R> {
    /// Bundles the inputs of a render.
    pub fn new(
        actual: Option<&'a R>,
        expected: &'a mut R,
        changes: &'a R::Changes,
        tags: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            actual,
            expected,
            changes,
            tags,
        }
    }
}

impl<R: Resource> Renderable for Pending<'_, R> {
    fn key(&self) -> ResourceKey {
        self.expected.key()
    }

    fn is_create(&self) -> bool {
        self.actual.is_none()
    }

    fn create_request(&self) -> CreateRequest {
        self.expected.create_request()
    }

    fn absorb(&mut self, object: &ProviderObject) {
        self.expected.absorb(object);
    }

    fn lookup(&self) -> Option<Query> {
        self.expected.lookup()
    }

    fn provider_id(&self) -> Option<String> {
        self.expected.provider_id().map(String::from)
    }

    fn mutations(&self) -> Result<Vec<Mutation>> {
        self.expected.mutations(self.actual, self.changes)
    }

    fn document(&self) -> serde_json::Value {
        self.expected.document()
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        self.tags
    }

    fn changed_fields(&self) -> Vec<&'static str> {
        self.changes.changed_fields()
    }
}

/// A unit of work in the dependency graph.
#[async_trait]
pub trait Task: Send + Sync + fmt::Debug {
    /// Key of the resource this task reconciles.
    fn key(&self) -> ResourceKey;

    /// Keys this task must wait for.
    fn dependencies(&self) -> Vec<ResourceKey>;

    /// Reconciles the resource and records its handle in `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails; nothing is recorded then.
    async fn run(&mut self, ctx: &RunContext, registry: &mut Registry) -> Result<TaskOutcome>;
}

/// Drives one typed resource through the reconciliation stages.
#[derive(Debug, Clone)]
pub struct TaskNode<R: Resource> {
    expected: R,
    tags: BTreeMap<String, String>,
}

impl<R: Resource> TaskNode<R> {
    /// Creates a task for an Expected resource.
    pub fn new(expected: R, tags: BTreeMap<String, String>) -> Self {
        Self { expected, tags }
    }

    /// The Expected resource, as normalized by the last run.
    pub fn expected(&self) -> &R {
        &self.expected
    }

    async fn run_shared(&self, ctx: &RunContext, registry: &mut Registry) -> Result<TaskOutcome> {
        let key = self.expected.key();
        let id = match &ctx.cloud {
            Some(cloud) => self
                .expected
                .find(cloud.as_ref())
                .await?
                .and_then(|actual| actual.provider_id().map(String::from)),
            None => self.expected.provider_id().map(String::from),
        };
        let id = id.ok_or_else(|| TaskError::SharedNotFound {
            resource: key.to_string(),
        })?;

        debug!("{key}: using shared object {id}");
        registry.record(key, id);
        Ok(TaskOutcome::Shared)
    }
}

#[async_trait]
impl<R: Resource> Task for TaskNode<R> {
    fn key(&self) -> ResourceKey {
        self.expected.key()
    }

    fn dependencies(&self) -> Vec<ResourceKey> {
        self.expected.references()
    }

    async fn run(&mut self, ctx: &RunContext, registry: &mut Registry) -> Result<TaskOutcome> {
        let key = self.expected.key();
        self.expected.resolve_references(registry)?;

        if self.expected.is_shared() {
            return self.run_shared(ctx, registry).await;
        }

        let actual = match &ctx.cloud {
            Some(cloud) => self.expected.find(cloud.as_ref()).await?,
            None => None,
        };

        let changes = R::diff(actual.as_ref(), &mut self.expected);
        R::check_changes(actual.as_ref(), &self.expected, &changes)?;

        let outcome = if actual.is_some() && changes.is_empty() && !ctx.target.renders_unchanged() {
            debug!("{key}: no changes");
            TaskOutcome::Unchanged
        } else {
            debug!("{key}: changed fields {:?}", changes.changed_fields());
            let mut pending = Pending::new(actual.as_ref(), &mut self.expected, &changes, &self.tags);
            ctx.target.render(&mut pending).await?
        };

        if let Some(handle) = ctx.target.handle(&key, self.expected.provider_id()) {
            registry.record(key, handle);
        }
        Ok(outcome)
    }
}
