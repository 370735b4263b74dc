//! Resource model.
//!
//! This module provides the typed desired-state objects, their diff and
//! validation rules, the reference registry, and the object-safe task
//! wrapper the executor drives.

mod builder;
mod elastic_ip;
mod load_balancer;
mod network;
mod reference;
mod resource;
mod task;

pub use builder::build_tasks;
pub use elastic_ip::{ASSOCIATED_ALLOCATION_TAG, ASSOCIATED_IP_TAG, ElasticIp, ElasticIpChanges};
pub use load_balancer::{Listener, LoadBalancer, LoadBalancerChanges};
pub use network::{SecurityGroup, SecurityGroupChanges, Subnet, SubnetChanges};
pub use reference::{Registry, ResourceKey};
pub use resource::{Changeset, Resource};
pub use task::{Pending, Renderable, RunContext, Task, TaskNode, TaskOutcome};
