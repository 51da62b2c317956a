// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WU dependency graph: an edge `A -> B` means A blocks B.
//!
//! Both `blocks` and `blocked_by` contribute edges, so a relationship
//! recorded on only one side still counts. Node order is first appearance
//! in the input, which keeps every result deterministic.

use indexmap::IndexSet;
use lk_core::{WorkUnit, WuId};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphValidation {
    pub has_cycle: bool,
    /// Each cycle listed once, starting from its first node in input order.
    pub cycles: Vec<Vec<WuId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalPath {
    pub path: Vec<WuId>,
    /// Number of WUs on the path.
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bottleneck {
    pub id: WuId,
    /// Number of WUs this one directly blocks.
    pub score: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexSet<WuId>,
    out: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn build(units: &[WorkUnit]) -> Self {
        let mut graph = Self::default();
        for unit in units {
            graph.node(&unit.id);
        }
        for unit in units {
            for blocked in &unit.blocks {
                graph.edge(&unit.id, blocked);
            }
            for blocker in &unit.blocked_by {
                graph.edge(blocker, &unit.id);
            }
        }
        graph
    }

    fn node(&mut self, id: &WuId) -> usize {
        let (index, added) = self.nodes.insert_full(id.clone());
        if added {
            self.out.push(BTreeSet::new());
        }
        index
    }

    fn edge(&mut self, from: &WuId, to: &WuId) {
        let from = self.node(from);
        let to = self.node(to);
        self.out[from].insert(to);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// WUs that `id` directly blocks.
    pub fn blocks(&self, id: &WuId) -> Vec<WuId> {
        self.nodes
            .get_index_of(id)
            .map(|i| self.ids(self.out[i].iter().copied()))
            .unwrap_or_default()
    }

    fn ids(&self, indices: impl IntoIterator<Item = usize>) -> Vec<WuId> {
        indices.into_iter().filter_map(|i| self.nodes.get_index(i).cloned()).collect()
    }

    /// Depth-first cycle search. A self-block is a one-node cycle.
    pub fn validate_graph(&self) -> GraphValidation {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        let mut cycles = Vec::new();

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::New {
                continue;
            }
            let mut path = vec![start];
            let successors: Vec<usize> = self.out[start].iter().rev().copied().collect();
            let mut stack: Vec<(usize, Vec<usize>)> = vec![(start, successors)];
            marks[start] = Mark::OnStack;

            while let Some((node, pending)) = stack.last_mut() {
                let Some(next) = pending.pop() else {
                    marks[*node] = Mark::Done;
                    path.pop();
                    stack.pop();
                    continue;
                };
                match marks[next] {
                    Mark::New => {
                        marks[next] = Mark::OnStack;
                        path.push(next);
                        stack.push((next, self.out[next].iter().rev().copied().collect()));
                    }
                    Mark::OnStack => {
                        let from = path.iter().position(|&n| n == next).unwrap_or(0);
                        let cycle = rotate_to_min(&path[from..]);
                        if seen.insert(cycle.clone()) {
                            cycles.push(self.ids(cycle));
                        }
                    }
                    Mark::Done => {}
                }
            }
        }

        GraphValidation { has_cycle: !cycles.is_empty(), cycles }
    }

    /// Blockers before the WUs they block. Ties keep input order. On a
    /// cyclic graph the WUs caught in cycles are appended in input order.
    pub fn topological_sort(&self) -> Vec<WuId> {
        self.ids(self.order())
    }

    fn order(&self) -> Vec<usize> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        for targets in &self.out {
            for &t in targets {
                indegree[t] += 1;
            }
        }
        let mut ready: BinaryHeap<Reverse<usize>> =
            (0..n).filter(|&i| indegree[i] == 0).map(Reverse).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            placed[node] = true;
            for &t in &self.out[node] {
                indegree[t] -= 1;
                if indegree[t] == 0 {
                    ready.push(Reverse(t));
                }
            }
        }
        order.extend((0..n).filter(|&i| !placed[i]));
        order
    }

    /// Longest blocking chain. Edges that point backwards in topological
    /// order (only possible inside cycles) are ignored.
    pub fn critical_path(&self) -> CriticalPath {
        let order = self.order();
        let mut position = vec![0usize; order.len()];
        for (pos, &node) in order.iter().enumerate() {
            position[node] = pos;
        }

        // Longest chain starting at each node, walking the order backwards
        let mut best = vec![1usize; order.len()];
        let mut next: Vec<Option<usize>> = vec![None; order.len()];
        for &node in order.iter().rev() {
            for &t in &self.out[node] {
                if position[t] > position[node] && best[t] + 1 > best[node] {
                    best[node] = best[t] + 1;
                    next[node] = Some(t);
                }
            }
        }

        let start = order.iter().copied().max_by_key(|&n| (best[n], Reverse(position[n])));
        let Some(start) = start else {
            return CriticalPath { path: Vec::new(), length: 0 };
        };
        let mut path = vec![start];
        let mut cur = start;
        while let Some(t) = next[cur] {
            path.push(t);
            cur = t;
        }
        CriticalPath { length: path.len(), path: self.ids(path) }
    }

    /// WUs ranked by how many others they directly block. WUs that block
    /// nothing are not bottlenecks and are left out.
    pub fn bottlenecks(&self, limit: usize) -> Vec<Bottleneck> {
        let mut ranked: Vec<(usize, usize)> = self
            .out
            .iter()
            .enumerate()
            .map(|(i, t)| (i, t.len()))
            .filter(|&(_, score)| score > 0)
            .collect();
        ranked.sort_by_key(|&(i, score)| (Reverse(score), i));
        ranked
            .into_iter()
            .take(limit)
            .filter_map(|(i, score)| {
                self.nodes.get_index(i).map(|id| Bottleneck { id: id.clone(), score })
            })
            .collect()
    }
}

fn rotate_to_min(cycle: &[usize]) -> Vec<usize> {
    let start = cycle.iter().enumerate().min_by_key(|&(_, n)| n).map(|(i, _)| i).unwrap_or(0);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
