//! RG-DAG-004: the build graph is closed and acyclic.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};

use crate::checks::ReviewerCheck;
use crate::context::{ReviewSubject, Violation, ViolationKind};
use crate::manifest::CheckId;
use crate::plan::BuildDag;

/// Reports at most `max_findings` dangling endpoints or cycles.
#[derive(Debug)]
pub struct DagCheck {
    max_findings: usize,
}

impl DagCheck {
    pub fn new(max_findings: usize) -> Self {
        Self {
            max_findings: max_findings.max(1),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Edge endpoints missing from the node list, in edge order.
pub fn dangling_endpoints(dag: &BuildDag) -> Vec<(usize, &str)> {
    let declared: HashSet<&str> = dag.nodes.iter().map(String::as_str).collect();
    let mut dangling = Vec::new();
    for (i, (from, to)) in dag.edges.iter().enumerate() {
        for endpoint in [from, to] {
            if !declared.contains(endpoint.as_str()) {
                dangling.push((i, endpoint.as_str()));
            }
        }
    }
    dangling
}

/// Back edges found by a DFS over nodes in declared order, at most `limit`.
///
/// Each cycle is returned as the on-stack path from the repeated node back to
/// itself, e.g. `["A", "B", "C", "A"]`. Assumes every edge endpoint is a node.
pub fn find_cycles(dag: &BuildDag, limit: usize) -> Vec<Vec<String>> {
    let index: HashMap<&str, usize> = dag
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); dag.nodes.len()];
    for (from, to) in &dag.edges {
        if let (Some(&f), Some(&t)) = (index.get(from.as_str()), index.get(to.as_str())) {
            adjacency[f].push(t);
        }
    }

    let mut marks = vec![Mark::Unvisited; dag.nodes.len()];
    // Stack position of every node currently marked OnStack.
    let mut depth = vec![0usize; dag.nodes.len()];
    let mut cycles = Vec::new();

    for root in 0..dag.nodes.len() {
        if cycles.len() >= limit {
            break;
        }
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, next edge to follow); also the current path
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;

        while let Some(top) = stack.last_mut() {
            let (node, cursor) = *top;
            if let Some(&next) = adjacency[node].get(cursor) {
                top.1 += 1;
                match marks[next] {
                    Mark::Unvisited => {
                        marks[next] = Mark::OnStack;
                        depth[next] = stack.len();
                        stack.push((next, 0));
                    }
                    Mark::OnStack => {
                        let mut path: Vec<String> = stack[depth[next]..]
                            .iter()
                            .map(|&(n, _)| dag.nodes[n].clone())
                            .collect();
                        path.push(dag.nodes[next].clone());
                        cycles.push(path);
                        if cycles.len() >= limit {
                            return cycles;
                        }
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    cycles
}

impl ReviewerCheck for DagCheck {
    fn check_id(&self) -> CheckId {
        CheckId::Dag
    }

    fn sections(&self) -> Vec<String> {
        vec!["build_dag".to_string()]
    }

    fn definition(&self) -> Value {
        json!({
            "check_id": self.check_id().as_str(),
            "gating": false,
            "sections": self.sections(),
            "rule": {
                "closure": "edge endpoints must appear in build_dag.nodes",
                "acyclic": "dfs in declared node order; report node repeated on the stack",
            },
        })
    }

    fn evaluate(&self, subject: &ReviewSubject<'_>) -> Vec<Violation> {
        let Some(plan) = subject.plan else {
            return Vec::new();
        };
        let dag = &plan.build_dag;

        let dangling = dangling_endpoints(dag);
        if !dangling.is_empty() {
            return dangling
                .into_iter()
                .take(self.max_findings)
                .map(|(edge, endpoint)| {
                    Violation::new(
                        CheckId::Dag,
                        ViolationKind::DagDanglingNode,
                        "build_dag",
                        format!("Edge {edge} references undeclared node '{endpoint}'"),
                    )
                    .with_reference(endpoint)
                })
                .collect();
        }

        find_cycles(dag, self.max_findings)
            .into_iter()
            .filter_map(|path| {
                let node = path.last()?.clone();
                Some(
                    Violation::new(
                        CheckId::Dag,
                        ViolationKind::DagCycle,
                        "build_dag",
                        format!(
                            "Cycle detected involving node '{node}' ({})",
                            path.join(" -> ")
                        ),
                    )
                    .with_reference(node),
                )
            })
            .collect()
    }
}
