//! The resource contract.
//!
//! Every managed object kind implements [`Resource`]. The same type describes
//! both the operator's Expected state and the Actual state read from the
//! provider; [`Resource::diff`] compares the two and produces a sparse
//! [`Changeset`].

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::Result;
use crate::provider::{CloudProvider, CreateRequest, Mutation, ProviderObject, Query, ResourceKind};

use super::reference::{Registry, ResourceKey};

/// A sparse set of differences between Actual and Expected.
pub trait Changeset: Debug + Default + Send + Sync {
    /// Returns the names of the fields that changed, in a stable order.
    fn changed_fields(&self) -> Vec<&'static str>;

    /// Returns true if no field changed.
    fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

/// A typed desired-state object.
#[async_trait]
pub trait Resource: Clone + Debug + Send + Sync + 'static {
    /// The changeset produced by [`Resource::diff`].
    type Changes: Changeset;

    /// Kind of object this type manages.
    const KIND: ResourceKind;

    /// Logical name chosen by the operator.
    fn name(&self) -> &str;

    /// Identifier assigned by the provider, once known.
    fn provider_id(&self) -> Option<&str>;

    /// Key of this resource within a run.
    fn key(&self) -> ResourceKey {
        ResourceKey::new(Self::KIND, self.name())
    }

    /// Pre-existing objects are looked up, never created or modified.
    fn is_shared(&self) -> bool {
        false
    }

    /// Resources this one refers to.
    fn references(&self) -> Vec<ResourceKey> {
        Vec::new()
    }

    /// Replaces references with the handles recorded for them.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced resource has no handle yet.
    fn resolve_references(&mut self, _registry: &Registry) -> Result<()> {
        Ok(())
    }

    /// Reads the Actual counterpart of this Expected resource.
    ///
    /// Returns `Ok(None)` when the object does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error on a genuine provider failure or an ambiguous match.
    async fn find(&self, cloud: &dyn CloudProvider) -> Result<Option<Self>>;

    /// Compares Actual with Expected.
    ///
    /// Expected is normalized first: reference collections that are
    /// set-equal take Actual's order, and unset provider-assigned fields are
    /// filled from Actual. With no Actual, every set field is a change.
    fn diff(actual: Option<&Self>, expected: &mut Self) -> Self::Changes;

    /// Checks that a changeset is legal before it is rendered.
    ///
    /// # Errors
    ///
    /// Returns a required-field error on create or a cannot-change-field
    /// error on update.
    fn check_changes(actual: Option<&Self>, expected: &Self, changes: &Self::Changes) -> Result<()>;

    /// The provider create call for this resource.
    fn create_request(&self) -> CreateRequest;

    /// Captures provider-assigned fields from a created or re-read object.
    fn absorb(&mut self, object: &ProviderObject);

    /// Query used to confirm the object exists after create.
    fn lookup(&self) -> Option<Query> {
        self.provider_id().map(|id| Query::by_id(Self::KIND, id))
    }

    /// Provider calls implied by a changeset, issued after create or as the
    /// whole update.
    ///
    /// # Errors
    ///
    /// Returns an error when a changed field has no supported update path.
    fn mutations(&self, actual: Option<&Self>, changes: &Self::Changes) -> Result<Vec<Mutation>>;

    /// Full declarative document for code generation.
    fn document(&self) -> serde_json::Value;
}

/// Returns `Some(value)` if it differs from Actual's.
pub(crate) fn changed<T: Clone + PartialEq>(actual: Option<&T>, expected: &T) -> Option<T> {
    if actual == Some(expected) {
        None
    } else {
        Some(expected.clone())
    }
}

/// Fills an unset Expected field from Actual.
pub(crate) fn fill<T: Clone>(expected: &mut Option<T>, actual: Option<&T>) {
    if expected.is_none() {
        *expected = actual.cloned();
    }
}

/// Diffs an optional field: unset on Expected never counts as a change.
pub(crate) fn changed_opt<T: Clone + PartialEq>(actual: Option<&T>, expected: Option<&T>) -> Option<T> {
    expected.and_then(|e| changed(actual, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed() {
        assert_eq!(changed(Some(&1), &1), None);
        assert_eq!(changed(Some(&1), &2), Some(2));
        assert_eq!(changed(None, &2), Some(2));
    }

    #[test]
    fn test_fill_keeps_expected_value() {
        let mut expected = Some(String::from("mine"));
        fill(&mut expected, Some(&String::from("theirs")));
        assert_eq!(expected.as_deref(), Some("mine"));

        let mut unset: Option<String> = None;
        fill(&mut unset, Some(&String::from("theirs")));
        assert_eq!(unset.as_deref(), Some("theirs"));
    }

    #[test]
    fn test_changed_opt_ignores_unset_expected() {
        assert_eq!(changed_opt::<String>(Some(&String::from("a")), None), None);
        assert_eq!(changed_opt(None, Some(&3)), Some(3));
    }
}
