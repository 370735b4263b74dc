//! End-to-end reconciliation runs against the in-memory provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube_converge::config::{ClusterConfig, ConfigParser};
use kube_converge::engine::ResourceStatus;
use kube_converge::model::{ResourceKey, TaskOutcome};
use kube_converge::provider::{
    CloudProvider, MemoryCloud, ProviderCall, ProviderObject, ResourceKind,
};
use kube_converge::reconciler::Reconciler;
use serde_json::json;

const CLUSTER: &str = r"
cluster:
  name: prod.example.com
  tags:
    team: platform
subnets:
  - name: utility-a
    id: subnet-aaaa
    shared: true
  - name: utility-b
    id: subnet-bbbb
    shared: true
security_groups:
  - name: api-elb
load_balancers:
  - name: api
    subnets: [utility-a, utility-b]
    security_groups: [api-elb]
    listeners:
      443:
        instance_port: 30443
      80:
        instance_port: 30080
";

fn config() -> ClusterConfig {
    ConfigParser::new().parse_yaml(CLUSTER, None).unwrap()
}

fn subnet(id: &str) -> ProviderObject {
    ProviderObject {
        kind: ResourceKind::Subnet,
        id: id.to_string(),
        tags: BTreeMap::new(),
        attributes: json!({ "cidr_block": "10.0.0.0/24", "availability_zone": "us-east-1a" }),
    }
}

async fn seeded_cloud() -> Arc<MemoryCloud> {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.seed(subnet("subnet-aaaa")).await;
    cloud.seed(subnet("subnet-bbbb")).await;
    cloud
}

fn lb_key() -> ResourceKey {
    ResourceKey::new(ResourceKind::LoadBalancer, "api")
}

fn calls_for<'a>(calls: &'a [ProviderCall], id: &str) -> Vec<&'a ProviderCall> {
    calls
        .iter()
        .filter(|c| match c {
            ProviderCall::Create(request) => request.name == id,
            ProviderCall::Update(request) => request.id == id,
            ProviderCall::Tag { id: tagged, .. } => tagged == id,
            ProviderCall::Describe(_) => false,
        })
        .collect()
}

#[tokio::test]
async fn test_first_apply_creates_then_listens_then_tags() {
    let config = config();
    let cloud = seeded_cloud().await;

    let report = Reconciler::new(&config)
        .apply(cloud.clone() as Arc<dyn CloudProvider>)
        .await
        .unwrap();

    assert!(report.is_success(), "{report:?}");
    assert_eq!(
        report.status(&lb_key()),
        Some(&ResourceStatus::Done {
            outcome: TaskOutcome::Created
        })
    );
    assert_eq!(
        report.status(&ResourceKey::new(ResourceKind::Subnet, "utility-a")),
        Some(&ResourceStatus::Done {
            outcome: TaskOutcome::Shared
        })
    );

    let calls = cloud.mutations().await;
    let lb_calls = calls_for(&calls, "api");
    assert_eq!(lb_calls.len(), 4, "{lb_calls:?}");

    let ProviderCall::Create(create) = lb_calls[0] else {
        panic!("expected create first, got {:?}", lb_calls[0]);
    };
    assert_eq!(create.spec["subnets"], json!(["subnet-aaaa", "subnet-bbbb"]));
    let group_id = create.spec["security_groups"][0].as_str().unwrap();
    assert!(group_id.starts_with("sg-"));

    let ports: Vec<u64> = lb_calls[1..3]
        .iter()
        .map(|call| match call {
            ProviderCall::Update(update) => {
                assert_eq!(update.operation, "create_listeners");
                update.spec["listeners"][0]["lb_port"].as_u64().unwrap()
            }
            other => panic!("expected listener update, got {other:?}"),
        })
        .collect();
    assert_eq!(ports, vec![80, 443]);

    let ProviderCall::Tag { tags, .. } = lb_calls[3] else {
        panic!("expected tag last, got {:?}", lb_calls[3]);
    };
    assert_eq!(tags.get("Name").map(String::as_str), Some("api"));
    assert_eq!(
        tags.get("KubernetesCluster").map(String::as_str),
        Some("prod.example.com")
    );
    assert_eq!(tags.get("team").map(String::as_str), Some("platform"));
}

#[tokio::test]
async fn test_second_apply_makes_no_changes() {
    let config = config();
    let cloud = seeded_cloud().await;
    let reconciler = Reconciler::new(&config);

    reconciler
        .apply(cloud.clone() as Arc<dyn CloudProvider>)
        .await
        .unwrap();
    cloud.clear_calls().await;

    let report = reconciler
        .apply(cloud.clone() as Arc<dyn CloudProvider>)
        .await
        .unwrap();

    assert!(report.is_success());
    for result in &report.results {
        assert!(
            matches!(
                &result.status,
                ResourceStatus::Done {
                    outcome: TaskOutcome::Unchanged | TaskOutcome::Shared
                }
            ),
            "{} was {:?}",
            result.key,
            result.status
        );
    }
    assert!(cloud.mutations().await.is_empty());
}

#[tokio::test]
async fn test_missing_shared_subnet_skips_dependents() {
    let config = config();
    let cloud = Arc::new(MemoryCloud::new());
    cloud.seed(subnet("subnet-aaaa")).await;

    let report = Reconciler::new(&config)
        .apply(cloud.clone() as Arc<dyn CloudProvider>)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.status(&ResourceKey::new(ResourceKind::Subnet, "utility-b")),
        Some(ResourceStatus::Failed { .. })
    ));
    assert!(matches!(
        report.status(&lb_key()),
        Some(ResourceStatus::Skipped { .. })
    ));
    assert!(calls_for(&cloud.mutations().await, "api").is_empty());
}

#[tokio::test]
async fn test_render_against_existing_cloud_uses_found_ids() {
    let config = config();
    let cloud = seeded_cloud().await;

    let (report, document) = Reconciler::new(&config)
        .render(Some(cloud.clone() as Arc<dyn CloudProvider>))
        .await
        .unwrap();

    assert!(report.is_success());
    let elb = &document["resource"]["aws_elb"]["api"];
    assert_eq!(elb["subnets"], json!(["subnet-aaaa", "subnet-bbbb"]));
    assert_eq!(
        elb["security_groups"],
        json!(["${aws_security_group.api-elb.id}"])
    );
    assert_eq!(elb["tags"]["KubernetesCluster"], "prod.example.com");
    assert!(cloud.mutations().await.is_empty());
}

#[tokio::test]
async fn test_elastic_ip_is_rediscovered_through_subnet_tag() {
    let yaml = r"
cluster:
  name: prod.example.com
subnets:
  - name: utility-a
    id: subnet-aaaa
    shared: true
elastic_ips:
  - name: nat-a
    subnet: utility-a
";
    let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();
    let cloud = seeded_cloud().await;
    let reconciler = Reconciler::new(&config);
    let eip = ResourceKey::new(ResourceKind::ElasticIp, "nat-a");

    let first = reconciler
        .apply(cloud.clone() as Arc<dyn CloudProvider>)
        .await
        .unwrap();
    assert_eq!(
        first.status(&eip),
        Some(&ResourceStatus::Done {
            outcome: TaskOutcome::Created
        })
    );

    let subnet = cloud.object("subnet-aaaa").await.unwrap();
    let address = subnet.tags.get("AssociatedElasticIp").cloned().unwrap();
    assert!(subnet.tags.get("AssociatedElasticIpAllocationId").unwrap().starts_with("eipalloc-"));

    cloud.clear_calls().await;
    let second = reconciler
        .apply(cloud.clone() as Arc<dyn CloudProvider>)
        .await
        .unwrap();
    assert_eq!(
        second.status(&eip),
        Some(&ResourceStatus::Done {
            outcome: TaskOutcome::Unchanged
        })
    );
    assert!(cloud.mutations().await.is_empty());
    assert!(cloud.calls().await.iter().any(|call| matches!(
        call,
        ProviderCall::Describe(query) if query.to_string() == format!("ElasticIP public-ip={address}")
    )));
}
