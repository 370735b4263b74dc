//! Cross-resource references.
//!
//! Resources never own each other. A reference is a [`ResourceKey`] resolved
//! through the [`Registry`], which holds whatever handle the active render
//! target produced for the referenced resource: a provider id when mutating
//! live infrastructure, a symbolic link when generating code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TaskError};
use crate::provider::ResourceKind;

/// Identifies a resource within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Kind of the resource.
    pub kind: ResourceKind,
    /// Logical name of the resource.
    pub name: String,
}

impl ResourceKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Handles produced for resources already processed in this run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handles: BTreeMap<ResourceKey, String>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the handle for a resource, replacing any previous one.
    pub fn record(&mut self, key: ResourceKey, handle: impl Into<String>) {
        self.handles.insert(key, handle.into());
    }

    /// Returns the handle for a resource, if recorded.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&str> {
        self.handles.get(key).map(String::as_str)
    }

    /// Resolves a reference held by `from`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnresolvedReference`] if `to` has no handle yet.
    pub fn resolve(&self, from: &ResourceKey, to: &ResourceKey) -> Result<String> {
        self.get(to).map(String::from).ok_or_else(|| {
            TaskError::UnresolvedReference {
                resource: from.to_string(),
                reference: to.to_string(),
            }
            .into()
        })
    }

    /// Number of recorded handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Returns true if `handle` is a symbolic link rather than a provider id.
#[must_use]
pub fn is_link(handle: &str) -> bool {
    handle.starts_with("${")
}

/// Returns true if both slices hold the same elements, ignoring order.
pub(crate) fn set_equal(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}
