//! Dependency graph over registered artifacts.

use std::collections::{BTreeSet, HashMap};

use crate::error::RegistryError;

use super::ArtifactSpec;

/// Directed graph where an edge `a -> b` means `a` must be deployed before `b`.
///
/// Nodes are identified by their registration index, which doubles as the
/// tie-break key when several artifacts are ready at once.
#[derive(Debug)]
pub(crate) struct DependencyGraph<'a> {
    names: Vec<&'a str>,
    /// For each node, the nodes it depends on.
    dependencies: Vec<BTreeSet<usize>>,
    /// For each node, the nodes depending on it.
    dependents: Vec<BTreeSet<usize>>,
}

impl<'a> DependencyGraph<'a> {
    pub(crate) fn build(artifacts: &'a [ArtifactSpec]) -> Result<Self, RegistryError> {
        let index: HashMap<&str, usize> = artifacts
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name.as_str(), i))
            .collect();

        let mut dependencies = vec![BTreeSet::new(); artifacts.len()];
        let mut dependents = vec![BTreeSet::new(); artifacts.len()];

        for (node, spec) in artifacts.iter().enumerate() {
            for dependency in spec.dependencies() {
                let dep = *index.get(dependency).ok_or_else(|| {
                    RegistryError::UnknownDependency {
                        artifact: spec.name.clone(),
                        dependency: dependency.to_string(),
                    }
                })?;
                dependencies[node].insert(dep);
                dependents[dep].insert(node);
            }
        }

        Ok(Self {
            names: artifacts.iter().map(|spec| spec.name.as_str()).collect(),
            dependencies,
            dependents,
        })
    }

    /// Kahn's algorithm, always emitting the lowest ready registration index.
    pub(crate) fn topological_order(&self) -> Result<Vec<usize>, RegistryError> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| node)
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.names.len() {
            let blocked: BTreeSet<usize> = (0..self.names.len())
                .filter(|node| in_degree[*node] > 0)
                .collect();
            return Err(RegistryError::CyclicDependency {
                cycle: self.find_cycle(&blocked),
            });
        }

        Ok(order)
    }

    /// Walks dependency edges inside the blocked set until a node repeats.
    ///
    /// Every blocked node has at least one blocked dependency, so the walk
    /// always closes a loop.
    fn find_cycle(&self, blocked: &BTreeSet<usize>) -> Vec<String> {
        let Some(&start) = blocked.first() else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = self.dependencies[current]
                .iter()
                .copied()
                .find(|dep| blocked.contains(dep));
            let Some(next) = next else {
                break;
            };

            // Reported in "depends on" direction, closed on the first node.
            if let Some(pos) = path.iter().position(|node| *node == next) {
                let mut cycle: Vec<String> = path[pos..]
                    .iter()
                    .map(|node| self.names[*node].to_string())
                    .collect();
                cycle.push(self.names[next].to_string());
                return cycle;
            }

            path.push(next);
            current = next;
        }

        path.iter().map(|node| self.names[*node].to_string()).collect()
    }
}
