//! The DNS watch path against a mocked Kubernetes API.

use std::sync::Arc;
use std::time::Duration;

use kube_converge::dns::{Ingress, RecordType, Scope, Zone, ZoneFile};
use kube_converge::watch::{FixedBackoff, KubeSource, Source, WatchLoop};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INGRESSES: &str = "/apis/networking.k8s.io/v1/namespaces/web/ingresses";

fn ingress(name: &str, host: &str, status: serde_json::Value) -> serde_json::Value {
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": { "name": name, "namespace": "web", "resourceVersion": "5" },
        "spec": { "rules": [ { "host": host } ] },
        "status": { "loadBalancer": { "ingress": [status] } }
    })
}

#[tokio::test]
async fn test_listed_ingresses_reach_the_zone_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INGRESSES))
        .and(query_param("watch", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(INGRESSES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "IngressList",
            "metadata": { "resourceVersion": "7" },
            "items": [
                ingress("shop", "shop.example.com", json!({ "hostname": "lb-1.elb.example.net", "ip": "198.51.100.7" })),
                ingress("admin", "admin.example.com", json!({ "ip": "198.51.100.8" })),
                ingress("blank", "blank.example.com", json!({ "hostname": "", "ip": "198.51.100.10" })),
                ingress("elsewhere", "www.example.org", json!({ "ip": "198.51.100.9" })),
            ],
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let zone_path = dir.path().join("example.com.yaml");
    let zone = Arc::new(Zone::new("example.com", Arc::new(ZoneFile::new(&zone_path))));
    let source: Arc<dyn Source<Ingress>> =
        Arc::new(KubeSource::for_server(&server.uri(), None, "web").await.unwrap());

    let cancel = CancellationToken::new();
    let watch = WatchLoop::new(
        source,
        Scope::new("ingress", zone.clone()),
        Box::new(FixedBackoff::new(Duration::from_millis(20))),
    );
    let handle = tokio::spawn(watch.run(cancel.clone()));

    let mut records = Vec::new();
    for _ in 0..100 {
        records = zone.records().await;
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cancel.cancel();
    let scope = handle.await.unwrap();

    assert!(scope.is_ready());
    assert_eq!(records.len(), 3, "{records:?}");

    let shop = records.iter().find(|r| r.fqdn == "shop.example.com.").unwrap();
    assert_eq!(shop.record_type, RecordType::Cname);
    assert_eq!(shop.value, "lb-1.elb.example.net");

    let admin = records.iter().find(|r| r.fqdn == "admin.example.com.").unwrap();
    assert_eq!(admin.record_type, RecordType::A);
    assert_eq!(admin.value, "198.51.100.8");

    let blank = records.iter().find(|r| r.fqdn == "blank.example.com.").unwrap();
    assert_eq!(blank.record_type, RecordType::A);
    assert_eq!(blank.value, "198.51.100.10");

    let written = std::fs::read_to_string(&zone_path).unwrap();
    assert!(written.contains("zone: example.com"));
    assert!(written.contains("shop.example.com."));
    assert!(!written.contains("www.example.org"));
}
