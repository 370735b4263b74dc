//! Content hashing for change detection.
//!
//! Hashes are computed over the canonical JSON form of a value. All maps in
//! the hashed types are ordered, so equal values always hash equally.

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::spec::ClusterConfig;

/// Hasher for computing configuration and content hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire cluster configuration.
    #[must_use]
    pub fn hash_config(&self, config: &ClusterConfig) -> String {
        self.hash_value(config)
    }

    /// Computes a hash of any serializable value.
    ///
    /// Values that fail to serialize hash as the empty document.
    #[must_use]
    pub fn hash_value<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}
