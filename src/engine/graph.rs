//! Dependency resolution.
//!
//! Orders tasks so every resource runs after the resources it references.
//! Ties are broken by key, so the same configuration always yields the same
//! order.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::ConfigError;
use crate::model::{ResourceKey, Task};

/// Computes a topological order over `tasks`, as indices into the slice.
///
/// # Errors
///
/// Returns a configuration error on a duplicate key, a reference to an
/// undeclared resource, or a dependency cycle.
pub fn execution_order(tasks: &[Box<dyn Task>]) -> Result<Vec<usize>, ConfigError> {
    let mut index: BTreeMap<ResourceKey, usize> = BTreeMap::new();
    for (i, task) in tasks.iter().enumerate() {
        let key = task.key();
        if index.contains_key(&key) {
            return Err(ConfigError::DuplicateName {
                kind: key.kind.to_string(),
                name: key.name,
            });
        }
        index.insert(key, i);
    }

    let mut in_degree = vec![0usize; tasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, task) in tasks.iter().enumerate() {
        let deps: BTreeSet<ResourceKey> = task.dependencies().into_iter().collect();
        for dep in deps {
            let Some(&j) = index.get(&dep) else {
                return Err(ConfigError::UnknownReference {
                    resource: task.key().to_string(),
                    reference: dep.to_string(),
                });
            };
            in_degree[i] += 1;
            dependents[j].push(i);
        }
    }

    let key_of = |i: usize| tasks[i].key();
    let mut ready: BTreeSet<(ResourceKey, usize)> = (0..tasks.len())
        .filter(|&i| in_degree[i] == 0)
        .map(|i| (key_of(i), i))
        .collect();
    let mut order = Vec::with_capacity(tasks.len());

    while let Some((_, i)) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.insert((key_of(d), d));
            }
        }
    }

    if order.len() < tasks.len() {
        let cycle: Vec<String> = (0..tasks.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| key_of(i).to_string())
            .collect();
        return Err(ConfigError::CircularDependency {
            cycle: cycle.join(" -> "),
        });
    }

    debug!(
        "Execution order: {:?}",
        order.iter().map(|&i| key_of(i).to_string()).collect::<Vec<_>>()
    );
    Ok(order)
}
