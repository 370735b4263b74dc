//! Builds the task set for a run from cluster configuration.

use tracing::debug;

use crate::config::ClusterConfig;
use crate::provider::ResourceKind;

use super::elastic_ip::ElasticIp;
use super::load_balancer::{Listener, LoadBalancer};
use super::network::{SecurityGroup, Subnet};
use super::reference::ResourceKey;
use super::task::{Task, TaskNode};

/// Turns a [`ClusterConfig`] into one task per declared resource.
///
/// References are recorded by key only; ordering is the graph's concern.
#[must_use]
pub fn build_tasks(config: &ClusterConfig) -> Vec<Box<dyn Task>> {
    let settings = &config.cluster;
    let mut tasks: Vec<Box<dyn Task>> = Vec::with_capacity(config.resource_count());

    for subnet in &config.subnets {
        let resource = Subnet {
            name: subnet.name.clone(),
            id: subnet.id.clone(),
            cidr: subnet.cidr.clone(),
            zone: subnet.zone.clone(),
            shared: subnet.shared,
        };
        tasks.push(Box::new(TaskNode::new(resource, settings.standard_tags(&subnet.name))));
    }

    for group in &config.security_groups {
        let resource = SecurityGroup {
            name: group.name.clone(),
            id: group.id.clone(),
            description: group.description.clone(),
            shared: group.shared,
        };
        tasks.push(Box::new(TaskNode::new(resource, settings.standard_tags(&group.name))));
    }

    for lb in &config.load_balancers {
        let mut resource = LoadBalancer::new(&lb.name);
        resource.id.clone_from(&lb.id);
        resource.subnet_refs = lb
            .subnets
            .iter()
            .map(|s| ResourceKey::new(ResourceKind::Subnet, s))
            .collect();
        resource.security_group_refs = lb
            .security_groups
            .iter()
            .map(|s| ResourceKey::new(ResourceKind::SecurityGroup, s))
            .collect();
        resource.listeners = lb
            .listeners
            .iter()
            .map(|(port, l)| {
                (
                    *port,
                    Listener {
                        instance_port: l.instance_port,
                    },
                )
            })
            .collect();
        tasks.push(Box::new(TaskNode::new(resource, settings.standard_tags(&lb.name))));
    }

    for eip in &config.elastic_ips {
        let mut resource = ElasticIp::new(&eip.name);
        resource.id.clone_from(&eip.id);
        resource.public_ip.clone_from(&eip.public_ip);
        resource.subnet_ref = Some(ResourceKey::new(ResourceKind::Subnet, &eip.subnet));
        tasks.push(Box::new(TaskNode::new(resource, settings.standard_tags(&eip.name))));
    }

    debug!("Built {} tasks for cluster {}", tasks.len(), settings.name);
    tasks
}
