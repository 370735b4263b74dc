//! Source boundary for watched objects.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::dns::Record;
use crate::error::Result;

/// A change to a watched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent<T> {
    /// The object appeared.
    Added(T),
    /// The object changed.
    Modified(T),
    /// The object was removed.
    Deleted(T),
}

/// A full listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectList<T> {
    /// Current objects.
    pub items: Vec<T>,
    /// Version to resume watching from.
    pub resource_version: String,
}

/// An object that contributes DNS records.
pub trait SourceObject: Send + Sync + 'static {
    /// Key of this object's contribution within its scope.
    fn source_name(&self) -> String;

    /// Records derived from the object, after the CNAME preference.
    fn records(&self) -> Vec<Record>;
}

/// Lists and watches one kind of object.
#[async_trait]
pub trait Source<T: SourceObject>: Send + Sync {
    /// Kind being watched, for logs.
    fn kind(&self) -> &str;

    /// Lists every current object.
    async fn list(&self) -> Result<ObjectList<T>>;

    /// Opens a watch starting after `since`.
    ///
    /// The channel closes when the watch ends; transport failures arrive as
    /// `Err` items.
    async fn watch(&self, since: &str) -> Result<mpsc::Receiver<Result<WatchEvent<T>>>>;
}
