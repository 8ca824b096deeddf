//! Dependency bookkeeping, cycle reporting, and critical-path estimation.
//!
//! `DependencyGraph` is the scheduler's ready-queue driver: it tracks the
//! unmet dependencies of every step and releases dependents as steps
//! complete. `petgraph` is used for the graph-level questions (strongly
//! connected components for deadlock reports, topological order for
//! duration estimates).

use std::collections::{HashMap, HashSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::DiGraph;
use toolflow_types::workflow::{StepComplexity, StepSpec};

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Unmet-dependency counters for one execution.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Definition order, used to keep release order deterministic.
    order: Vec<String>,
    unmet: HashMap<String, HashSet<String>>,
    dependents: HashMap<String, Vec<String>>,
    released: HashSet<String>,
}

impl DependencyGraph {
    pub fn new(steps: &[StepSpec]) -> Self {
        let mut unmet = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for step in steps {
            let deps: HashSet<String> = step.dependencies.iter().cloned().collect();
            for dep in &deps {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(step.id.clone());
            }
            unmet.insert(step.id.clone(), deps);
        }
        Self {
            order: steps.iter().map(|s| s.id.clone()).collect(),
            unmet,
            dependents,
            released: HashSet::new(),
        }
    }

    /// Steps with no dependencies, in definition order. Marks them released.
    pub fn initial_ready(&mut self) -> Vec<String> {
        let ready: Vec<String> = self
            .order
            .iter()
            .filter(|id| self.unmet.get(*id).is_some_and(HashSet::is_empty))
            .cloned()
            .collect();
        self.released.extend(ready.iter().cloned());
        ready
    }

    /// Record `step_id` as completed and return the dependents that just
    /// became ready. A dependent is released at most once.
    pub fn complete(&mut self, step_id: &str) -> Vec<String> {
        let Some(dependents) = self.dependents.get(step_id) else {
            return Vec::new();
        };
        let mut ready = Vec::new();
        for dependent in dependents {
            if self.released.contains(dependent) {
                continue;
            }
            if let Some(deps) = self.unmet.get_mut(dependent) {
                deps.remove(step_id);
                if deps.is_empty() {
                    ready.push(dependent.clone());
                }
            }
        }
        self.released.extend(ready.iter().cloned());
        ready
    }
}

// ---------------------------------------------------------------------------
// Graph queries
// ---------------------------------------------------------------------------

fn build_graph(steps: &[StepSpec]) -> (DiGraph<&str, ()>, HashMap<&str, petgraph::graph::NodeIndex>) {
    let mut graph = DiGraph::<&str, ()>::new();
    let nodes: HashMap<&str, _> = steps
        .iter()
        .map(|s| (s.id.as_str(), graph.add_node(s.id.as_str())))
        .collect();
    for step in steps {
        for dep in &step.dependencies {
            if let Some(&from) = nodes.get(dep.as_str()) {
                graph.add_edge(from, nodes[step.id.as_str()], ());
            }
        }
    }
    (graph, nodes)
}

/// Dependency cycles among `stuck` steps.
///
/// Each cycle is a sorted list of step IDs; cycles are sorted by their first
/// member. Self-loops count as cycles of one.
pub fn find_cycles(steps: &[StepSpec], stuck: &[String]) -> Vec<Vec<String>> {
    let stuck: HashSet<&str> = stuck.iter().map(String::as_str).collect();
    let subset: Vec<StepSpec> = steps
        .iter()
        .filter(|s| stuck.contains(s.id.as_str()))
        .cloned()
        .collect();
    let (graph, _) = build_graph(&subset);

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut ids: Vec<String> = scc.iter().map(|n| graph[*n].to_string()).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    cycles
}

/// Estimated duration of the longest dependency chain, in milliseconds.
///
/// Steps without a complexity hint count as medium. A cyclic graph has no
/// critical path; every step's estimate is summed instead.
pub fn critical_path_ms(steps: &[StepSpec]) -> u64 {
    let estimate = |s: &StepSpec| {
        s.complexity
            .unwrap_or(StepComplexity::Medium)
            .estimated_duration_ms()
    };
    let (graph, _) = build_graph(steps);
    let by_id: HashMap<&str, &StepSpec> = steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let Ok(sorted) = toposort(&graph, None) else {
        return steps.iter().map(estimate).sum();
    };

    let mut finish: HashMap<&str, u64> = HashMap::new();
    for node in sorted {
        let id = graph[node];
        let step = by_id[id];
        let start = step
            .dependencies
            .iter()
            .filter_map(|d| finish.get(d.as_str()).copied())
            .max()
            .unwrap_or(0);
        finish.insert(id, start + estimate(step));
    }
    finish.values().copied().max().unwrap_or(0)
}
