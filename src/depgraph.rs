//! Dependency & Cycle Engine: builds the dependency graph over the Issue
//! Store's indexes and answers cycle-detection and blocked-issue queries.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::issue::{IssueStore, ResolveResult, Status};

const MAX_CYCLE_DEPTH: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum DepGraphError {
    #[error("dependency graph exceeds the maximum DFS depth of {0}")]
    DepthExceeded(usize),
}

/// The status of one unresolved dependency, for the blocked-issue query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStatus {
    Closed,
    Open,
    InProgress,
    Unknown,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct BlockingDependency {
    pub name: String,
    pub status: DependencyStatus,
}

pub struct DependencyGraph {
    /// Explicit + implicit edges: issue -> issues it depends on / decomposes into.
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn build(store: &IssueStore) -> DependencyGraph {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();

        for issue in store.by_qualified_name.values() {
            let mut targets = Vec::new();

            if matches!(issue.state.status, Status::Open | Status::InProgress) {
                for dep in &issue.state.dependencies {
                    match store.resolve(dep) {
                        ResolveResult::Found(resolved) => {
                            targets.push(resolved.qualified_name.raw.clone());
                        }
                        ResolveResult::Ambiguous(candidates) => targets.extend(candidates),
                        ResolveResult::NotFound => {}
                    }
                }
            }

            for child in &issue.state.decomposed_into {
                if store.by_qualified_name.contains_key(child) {
                    targets.push(child.clone());
                }
            }

            edges.insert(issue.qualified_name.raw.clone(), targets);
        }

        DependencyGraph { edges }
    }

    /// Every cycle, each reported once in canonical `A -> B -> C -> A` form.
    pub fn find_cycles(&self) -> Result<Vec<String>, DepGraphError> {
        let mut cycles = BTreeSet::new();
        let mut global_visited = HashSet::new();

        for start in self.edges.keys() {
            if global_visited.contains(start) {
                continue;
            }
            let mut on_path = Vec::new();
            let mut on_path_set = HashSet::new();
            self.dfs(start, &mut on_path, &mut on_path_set, &mut global_visited, &mut cycles, 0)?;
        }

        Ok(cycles.into_iter().collect())
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs(
        &self,
        node: &str,
        on_path: &mut Vec<String>,
        on_path_set: &mut HashSet<String>,
        global_visited: &mut HashSet<String>,
        cycles: &mut BTreeSet<String>,
        depth: usize,
    ) -> Result<(), DepGraphError> {
        if depth > MAX_CYCLE_DEPTH {
            return Err(DepGraphError::DepthExceeded(MAX_CYCLE_DEPTH));
        }

        on_path.push(node.to_string());
        on_path_set.insert(node.to_string());

        if let Some(targets) = self.edges.get(node) {
            for target in targets {
                if let Some(start_idx) = on_path.iter().position(|n| n == target) {
                    let cycle = canonical_cycle(&on_path[start_idx..]);
                    cycles.insert(cycle);
                } else if !global_visited.contains(target) {
                    self.dfs(target, on_path, on_path_set, global_visited, cycles, depth + 1)?;
                }
            }
        }

        on_path.pop();
        on_path_set.remove(node);
        global_visited.insert(node.to_string());
        Ok(())
    }

    /// Whether `name` participates in any reported cycle.
    pub fn is_cyclic(&self, name: &str, cycles: &[String]) -> bool {
        cycles.iter().any(|c| c.split(" -> ").any(|n| n == name))
    }

    /// For each open/in-progress issue, the list of its unresolved
    /// dependencies and their statuses.
    pub fn blocked_issues(&self, store: &IssueStore) -> HashMap<String, Vec<BlockingDependency>> {
        let mut out = HashMap::new();

        for issue in store.by_qualified_name.values() {
            if !matches!(issue.state.status, Status::Open | Status::InProgress) {
                continue;
            }

            let mut blocking = Vec::new();
            for dep in &issue.state.dependencies {
                match store.resolve(dep) {
                    ResolveResult::Found(resolved) => {
                        let status = match resolved.state.status {
                            Status::Closed => continue,
                            Status::Open => DependencyStatus::Open,
                            Status::InProgress => DependencyStatus::InProgress,
                            Status::Decomposed => DependencyStatus::Unknown,
                        };
                        blocking.push(BlockingDependency {
                            name: resolved.qualified_name.raw.clone(),
                            status,
                        });
                    }
                    ResolveResult::Ambiguous(_) => blocking.push(BlockingDependency {
                        name: dep.clone(),
                        status: DependencyStatus::Unknown,
                    }),
                    ResolveResult::NotFound => blocking.push(BlockingDependency {
                        name: dep.clone(),
                        status: DependencyStatus::NotFound,
                    }),
                }
            }

            if !blocking.is_empty() {
                out.insert(issue.qualified_name.raw.clone(), blocking);
            }
        }

        out
    }
}

fn canonical_cycle(path: &[String]) -> String {
    // Rotate so the lexicographically smallest node starts the cycle, giving
    // a stable representative regardless of which DFS root found it.
    let min_idx = path
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| n.as_str())
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut rotated: Vec<&str> = path[min_idx..].iter().map(String::as_str).collect();
    rotated.extend(path[..min_idx].iter().map(String::as_str));
    rotated.push(rotated[0]);
    rotated.join(" -> ")
}
