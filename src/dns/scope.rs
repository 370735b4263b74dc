//! DNS scopes.
//!
//! A scope holds the records contributed by one category of source objects,
//! keyed by source name. Its owner is the only writer, so the map itself is
//! not locked; publication goes through a [`ZonePublisher`] that merges
//! concurrent scopes.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

use super::record::{Record, prefer_cnames};
use super::zone::ZonePublisher;

/// Records contributed under one scope name.
pub struct Scope {
    name: String,
    contributions: BTreeMap<String, Vec<Record>>,
    ready: bool,
    publisher: Arc<dyn ZonePublisher>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("sources", &self.contributions.len())
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl Scope {
    /// Creates an empty scope that publishes through `publisher`.
    pub fn new(name: impl Into<String>, publisher: Arc<dyn ZonePublisher>) -> Self {
        Self {
            name: name.into(),
            contributions: BTreeMap::new(),
            ready: false,
            publisher,
        }
    }

    /// Scope name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the initial listing has completed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Substitutes every record contributed by `source`. An empty list
    /// removes the source.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing the merged records fails.
    pub async fn replace(&mut self, source: &str, records: Vec<Record>) -> Result<()> {
        let records = prefer_cnames(records);
        debug!("Scope {}: {source} contributes {} records", self.name, records.len());
        if records.is_empty() {
            self.contributions.remove(source);
        } else {
            self.contributions.insert(source.to_string(), records);
        }
        self.publish().await
    }

    /// Signals that the scope now reflects a complete listing.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing fails.
    pub async fn mark_ready(&mut self) -> Result<()> {
        if !self.ready {
            debug!("Scope {} is ready", self.name);
        }
        self.ready = true;
        self.publish().await
    }

    /// Records contributed by `source`.
    #[must_use]
    pub fn contribution(&self, source: &str) -> &[Record] {
        self.contributions.get(source).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names of the sources currently contributing.
    #[must_use]
    pub fn sources(&self) -> Vec<String> {
        self.contributions.keys().cloned().collect()
    }

    /// All contributed records, sorted and de-duplicated.
    #[must_use]
    pub fn merged(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.contributions.values().flatten().cloned().collect();
        records.sort();
        records.dedup();
        records
    }

    async fn publish(&self) -> Result<()> {
        if !self.ready {
            return Ok(());
        }
        self.publisher.publish(&self.name, self.merged()).await
    }
}
