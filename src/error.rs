//! Error types for the convergence engine.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration loading, per-resource task failures, provider calls,
//! Kubernetes watches and DNS zone publication.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the convergence engine.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single resource could not be reconciled.
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Cloud provider errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Kubernetes list/watch errors.
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// DNS zone errors.
    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate resource definition.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Kind of resource.
        kind: String,
        /// The duplicated name.
        name: String,
    },

    /// A resource references something that is not declared.
    #[error("{resource} references undeclared {reference}")]
    UnknownReference {
        /// The referencing resource.
        resource: String,
        /// The missing reference.
        reference: String,
    },

    /// Two resources of one kind would share a generated label.
    #[error("{first} and {second} both render as {label}")]
    LabelCollision {
        /// The shared label.
        label: String,
        /// The first resource.
        first: String,
        /// The second resource.
        second: String,
    },

    /// Circular dependency detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// Errors raised while driving a single resource through find, diff,
/// validate and render.
///
/// Apart from `DependencyFailed`, these are configuration errors: they are
/// reported immediately and never retried.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A field required for creation is missing.
    #[error("{resource}: required field {field} is not set")]
    RequiredField {
        /// The resource being created.
        resource: String,
        /// The missing field.
        field: &'static str,
    },

    /// A field that is immutable once created would change.
    #[error("{resource}: field {field} cannot be changed")]
    CannotChangeField {
        /// The resource being updated.
        resource: String,
        /// The immutable field.
        field: &'static str,
    },

    /// The update path for a field is not supported.
    #[error("{resource}: changes to {field} are not supported on an existing object")]
    UnsupportedChange {
        /// The resource being updated.
        resource: String,
        /// The unsupported field.
        field: &'static str,
    },

    /// A lookup matched more than one provider object.
    #[error("{resource}: found {count} matching objects, expected at most one")]
    AmbiguousMatch {
        /// The resource being looked up.
        resource: String,
        /// How many objects matched.
        count: usize,
    },

    /// A referenced resource has no provider identifier yet.
    #[error("{resource}: reference {reference} has no provider id")]
    UnresolvedReference {
        /// The referencing resource.
        resource: String,
        /// The reference that could not be resolved.
        reference: String,
    },

    /// A shared (pre-existing) object was not found.
    #[error("{resource}: shared object not found")]
    SharedNotFound {
        /// The shared resource.
        resource: String,
    },

    /// The object could not be found right after it was created.
    #[error("{resource}: unable to find newly created object after {attempts} lookups")]
    CreatedButNotFound {
        /// The created resource.
        resource: String,
        /// Number of lookups performed.
        attempts: u32,
    },

    /// A dependency failed, so this resource was not attempted.
    #[error("{resource}: skipped because {dependency} failed")]
    DependencyFailed {
        /// The skipped resource.
        resource: String,
        /// The failed dependency.
        dependency: String,
    },
}

/// Cloud provider errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object does not exist.
    #[error("Object not found: {what}")]
    NotFound {
        /// Description of the missing object.
        what: String,
    },

    /// The provider rejected the request.
    #[error("Provider API error {code}: {message}")]
    Api {
        /// Provider error code.
        code: String,
        /// Message from the provider.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with provider: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// A provider call did not complete in time.
    #[error("Provider call {operation} timed out after {secs}s")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The bound that was exceeded.
        secs: u64,
    },
}

/// Kubernetes list/watch errors.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Listing source objects failed.
    #[error("Error listing {kind}: {message}")]
    List {
        /// Kind being listed.
        kind: String,
        /// Underlying error text.
        message: String,
    },

    /// Opening or reading a watch failed.
    #[error("Error watching {kind}: {message}")]
    Watch {
        /// Kind being watched.
        kind: String,
        /// Underlying error text.
        message: String,
    },

    /// The resource version to resume from is too old; a relist is needed.
    #[error("Resource version of {kind} expired")]
    Expired {
        /// Kind being watched.
        kind: String,
    },

    /// No client could be configured for the Kubernetes API.
    #[error("Failed to connect to Kubernetes: {message}")]
    Connect {
        /// Underlying error text.
        message: String,
    },

    /// The event stream ended.
    #[error("Watch on {kind} closed")]
    Closed {
        /// Kind being watched.
        kind: String,
    },
}

/// DNS zone errors.
#[derive(Debug, Error)]
pub enum DnsError {
    /// Publishing a zone failed.
    #[error("Failed to publish scope {scope}: {message}")]
    Publish {
        /// Scope being published.
        scope: String,
        /// Underlying error text.
        message: String,
    },
}

/// Result type alias for convergence operations.
pub type Result<T> = std::result::Result<T, ConvergeError>;

impl ConvergeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ProviderError {
    /// Creates an API error.
    #[must_use]
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}
