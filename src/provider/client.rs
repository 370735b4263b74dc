//! Cloud provider client boundary.
//!
//! The concrete SDK lives outside this crate. Everything the engine needs
//! from it is the four calls on [`CloudProvider`]; [`TimeoutProvider`] bounds
//! each of them so a hanging call cannot block its branch forever.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

use crate::error::ProviderError;

use super::types::{CreateRequest, ProviderObject, Query, UpdateRequest};

/// Read/write boundary to the cloud provider.
///
/// Every call may fail with [`ProviderError::NotFound`], which callers on the
/// read path translate into "does not exist yet".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Lists objects matching the query.
    async fn describe(&self, query: &Query) -> Result<Vec<ProviderObject>, ProviderError>;

    /// Creates an object and returns it as the provider reports it.
    async fn create(&self, request: &CreateRequest) -> Result<ProviderObject, ProviderError>;

    /// Applies a partial update to an existing object.
    async fn update(&self, request: &UpdateRequest) -> Result<(), ProviderError>;

    /// Merges tags onto an object.
    async fn tag(&self, id: &str, tags: &BTreeMap<String, String>) -> Result<(), ProviderError>;
}

/// Wraps a provider so every call is bounded by a timeout.
#[derive(Clone)]
pub struct TimeoutProvider {
    /// Wrapped provider.
    inner: Arc<dyn CloudProvider>,
    /// Bound on each call.
    timeout: Duration,
}

impl TimeoutProvider {
    /// Creates a new bounded provider.
    #[must_use]
    pub fn new(inner: Arc<dyn CloudProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, ProviderError>
    where
        F: std::future::Future<Output = Result<T, ProviderError>> + Send,
    {
        trace!("Provider call {operation}");
        if let Ok(result) = tokio::time::timeout(self.timeout, call).await {
            result
        } else {
            warn!("Provider call {operation} timed out after {:?}", self.timeout);
            Err(ProviderError::Timeout {
                operation: operation.to_string(),
                secs: self.timeout.as_secs(),
            })
        }
    }
}

impl std::fmt::Debug for TimeoutProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutProvider")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CloudProvider for TimeoutProvider {
    async fn describe(&self, query: &Query) -> Result<Vec<ProviderObject>, ProviderError> {
        self.bounded("describe", self.inner.describe(query)).await
    }

    async fn create(&self, request: &CreateRequest) -> Result<ProviderObject, ProviderError> {
        self.bounded("create", self.inner.create(request)).await
    }

    async fn update(&self, request: &UpdateRequest) -> Result<(), ProviderError> {
        self.bounded("update", self.inner.update(request)).await
    }

    async fn tag(&self, id: &str, tags: &BTreeMap<String, String>) -> Result<(), ProviderError> {
        self.bounded("tag", self.inner.tag(id, tags)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResourceKind;

    struct HangingProvider;

    #[async_trait]
    impl CloudProvider for HangingProvider {
        async fn describe(&self, _query: &Query) -> Result<Vec<ProviderObject>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }

        async fn create(&self, _request: &CreateRequest) -> Result<ProviderObject, ProviderError> {
            Err(ProviderError::network("unreachable"))
        }

        async fn update(&self, _request: &UpdateRequest) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn tag(&self, _id: &str, _tags: &BTreeMap<String, String>) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hanging_call_times_out() {
        let provider = TimeoutProvider::new(Arc::new(HangingProvider), Duration::from_millis(20));
        let result = provider
            .describe(&Query::by_name(ResourceKind::Subnet, "a"))
            .await;

        assert!(matches!(result, Err(ProviderError::Timeout { ref operation, .. }) if operation == "describe"));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let provider = TimeoutProvider::new(Arc::new(HangingProvider), Duration::from_secs(1));
        let request = CreateRequest {
            kind: ResourceKind::Subnet,
            name: String::from("a"),
            spec: serde_json::Value::Null,
        };

        let result = provider.create(&request).await;
        assert!(matches!(result, Err(ProviderError::Network { .. })));
    }
}
