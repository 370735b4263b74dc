//! Read path shared by every resource's Find.
//!
//! A lookup has three valid outcomes: nothing, exactly one object, or an
//! error. "Not found" reported by the provider is folded into nothing; more
//! than one match is always an error.

use tracing::debug;

use crate::error::{ConvergeError, ProviderError, Result, TaskError};

use super::client::CloudProvider;
use super::types::{ProviderObject, Query};

/// Looks up at most one object matching `query`.
///
/// `resource` names the resource doing the lookup, for error reporting.
///
/// # Errors
///
/// Returns an error on a genuine provider failure or when more than one
/// object matches.
pub async fn find_unique(
    cloud: &dyn CloudProvider,
    query: &Query,
    resource: &str,
) -> Result<Option<ProviderObject>> {
    let mut found = match cloud.describe(query).await {
        Ok(found) => found,
        Err(ProviderError::NotFound { .. }) => {
            debug!("{resource}: provider reports {query} not found");
            return Ok(None);
        }
        Err(e) => return Err(ConvergeError::Provider(e)),
    };

    match found.len() {
        0 => {
            debug!("{resource}: no object matches {query}");
            Ok(None)
        }
        1 => Ok(found.pop()),
        count => Err(ConvergeError::Task(TaskError::AmbiguousMatch {
            resource: resource.to_string(),
            count,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::client::MockCloudProvider;
    use crate::provider::ResourceKind;
    use std::collections::BTreeMap;

    fn object(id: &str) -> ProviderObject {
        ProviderObject {
            kind: ResourceKind::LoadBalancer,
            id: id.to_string(),
            tags: BTreeMap::new(),
            attributes: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_not_found_error_is_none() {
        let mut cloud = MockCloudProvider::new();
        cloud
            .expect_describe()
            .returning(|_| Err(ProviderError::not_found("LoadBalancerNotFound")));

        let query = Query::by_name(ResourceKind::LoadBalancer, "api");
        let found = find_unique(&cloud, &query, "LoadBalancer/api").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_single_match() {
        let mut cloud = MockCloudProvider::new();
        cloud.expect_describe().returning(|_| Ok(vec![object("api")]));

        let query = Query::by_name(ResourceKind::LoadBalancer, "api");
        let found = find_unique(&cloud, &query, "LoadBalancer/api").await.unwrap();
        assert_eq!(found.map(|o| o.id), Some(String::from("api")));
    }

    #[tokio::test]
    async fn test_multiple_matches_are_ambiguous() {
        let mut cloud = MockCloudProvider::new();
        cloud
            .expect_describe()
            .returning(|_| Ok(vec![object("api"), object("api")]));

        let query = Query::by_name(ResourceKind::LoadBalancer, "api");
        let err = find_unique(&cloud, &query, "LoadBalancer/api").await.unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::Task(TaskError::AmbiguousMatch { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let mut cloud = MockCloudProvider::new();
        cloud
            .expect_describe()
            .returning(|_| Err(ProviderError::api("AccessDenied", "no")));

        let query = Query::by_name(ResourceKind::LoadBalancer, "api");
        let err = find_unique(&cloud, &query, "LoadBalancer/api").await.unwrap_err();
        assert!(err.to_string().contains("AccessDenied"));
    }
}
