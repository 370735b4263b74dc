//! Render targets.
//!
//! A target consumes the `(actual, expected, changeset)` triple of one
//! resource. [`LiveTarget`] turns it into provider calls, [`CodegenTarget`]
//! into a declarative document. Resource types only see [`RenderTarget`], so
//! a new backend never touches them.

mod codegen;
mod live;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Renderable, ResourceKey, TaskOutcome};

pub use codegen::CodegenTarget;
pub use live::LiveTarget;

/// A backend that renders changesets.
#[async_trait]
pub trait RenderTarget: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Whether unchanged resources are still rendered.
    fn renders_unchanged(&self) -> bool;

    /// Handle later resources use to refer to this one.
    fn handle(&self, key: &ResourceKey, provider_id: Option<&str>) -> Option<String>;

    /// Renders one resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the resource.
    async fn render(&self, resource: &mut dyn Renderable) -> Result<TaskOutcome>;
}
