//! Ingress objects as DNS record sources.
//!
//! Records come from the rule hosts and the load-balancer ingress points in
//! the status. Empty hosts, hostnames and addresses are treated as absent.

use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerIngress};

use crate::watch::SourceObject;

use super::record::{Record, prefer_cnames};

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

impl SourceObject for Ingress {
    fn source_name(&self) -> String {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        match self.metadata.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}/{name}"),
            _ => name.to_string(),
        }
    }

    fn records(&self) -> Vec<Record> {
        let points: Vec<&IngressLoadBalancerIngress> = self
            .status
            .iter()
            .filter_map(|status| status.load_balancer.as_ref())
            .flat_map(|lb| lb.ingress.iter().flatten())
            .collect();
        let hosts = self
            .spec
            .iter()
            .flat_map(|spec| spec.rules.iter().flatten())
            .filter_map(|rule| present(rule.host.as_ref()));

        let mut records = Vec::new();
        for host in hosts {
            for point in &points {
                if let Some(hostname) = present(point.hostname.as_ref()) {
                    records.push(Record::cname(host, hostname));
                }
                if let Some(ip) = present(point.ip.as_ref()) {
                    records.push(Record::a(host, ip));
                }
            }
        }
        prefer_cnames(records)
    }
}
