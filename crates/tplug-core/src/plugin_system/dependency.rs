use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use thiserror::Error;

use crate::plugin_system::info::PluginInfo;

/// Error that can occur when ordering plugins by their dependencies
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DependencyError {
    /// Dependency cycle detected; holds the plugins that could not be ordered
    #[error("Circular dependency detected among: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
}

/// Orders a batch of descriptors so that every plugin comes after the plugins
/// it requires.
///
/// Only edges between members of the batch are considered; requirements that
/// point outside the batch are checked later against the loaded set. Among the
/// plugins that are ready at any step, the one earliest in the input goes first.
pub fn sort(plugins: Vec<PluginInfo>) -> Result<Vec<PluginInfo>, DependencyError> {
    let order = topological_order(&plugins)?;

    let mut slots: Vec<Option<PluginInfo>> = plugins.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|idx| slots[idx].take()).collect())
}

/// Kahn's algorithm over batch indexes. Returns the indexes prerequisites-first.
pub fn topological_order(plugins: &[PluginInfo]) -> Result<Vec<usize>, DependencyError> {
    // first occurrence wins when a name is duplicated in the batch
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for (idx, info) in plugins.iter().enumerate() {
        index_of.entry(info.name.as_str()).or_insert(idx);
    }

    // edge R -> P when P requires R
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); plugins.len()];
    let mut in_degree = vec![0usize; plugins.len()];

    for (idx, info) in plugins.iter().enumerate() {
        for required in &info.required_plugins {
            if let Some(&req_idx) = index_of.get(required.as_str()) {
                if req_idx == idx {
                    // a plugin requiring itself can never be satisfied
                    return Err(DependencyError::CyclicDependency(vec![info.name.clone()]));
                }
                dependents[req_idx].push(idx);
                in_degree[idx] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..plugins.len())
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(plugins.len());

    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &dep in &dependents[idx] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                ready.push(Reverse(dep));
            }
        }
    }

    if order.len() != plugins.len() {
        let mut cycle: Vec<String> = (0..plugins.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| plugins[i].name.clone())
            .collect();
        cycle.sort();
        cycle.dedup();
        return Err(DependencyError::CyclicDependency(cycle));
    }

    log::debug!(
        "Plugin load order: {}",
        order.iter().map(|&i| plugins[i].name.as_str()).collect::<Vec<_>>().join(" -> ")
    );

    Ok(order)
}
