//! Graph topology analysis: ordering, cycle detection and reachability
//!
//! Nodes are addressed by their position in the graph's step map.

use crate::core::graph::GraphStep;
use crate::error::{PipelineError, PipelineResult};
use indexmap::IndexMap;
use std::collections::VecDeque;

pub(crate) struct Topology {
    /// node -> nodes consuming it
    fwd: Vec<Vec<usize>>,
    /// node -> nodes it consumes
    bwd: Vec<Vec<usize>>,
}

impl Topology {
    /// Build adjacency lists; fails on the first dangling reference
    pub(crate) fn new(steps: &IndexMap<String, GraphStep>) -> PipelineResult<Self> {
        let n = steps.len();
        let mut fwd = vec![Vec::new(); n];
        let mut bwd = vec![Vec::new(); n];

        for (to, (name, step)) in steps.iter().enumerate() {
            for reference in step.inputs() {
                let from = steps.get_index_of(reference).ok_or_else(|| {
                    PipelineError::DanglingReference {
                        node: name.clone(),
                        reference: reference.to_string(),
                    }
                })?;
                fwd[from].push(to);
                bwd[to].push(from);
            }
        }

        Ok(Self { fwd, bwd })
    }

    /// Kahn's algorithm, ties broken by declaration order
    ///
    /// On a cycle, returns the nodes that lie on (or between) cycles.
    pub(crate) fn order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let n = self.fwd.len();
        let mut in_degree: Vec<usize> = self.bwd.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in &self.fwd[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            Err(self.prune_to_cycles(&in_degree))
        }
    }

    /// Nodes left after Kahn include everything downstream of a cycle; peel
    /// off those that feed nothing else in the leftover set.
    fn prune_to_cycles(&self, in_degree: &[usize]) -> Vec<usize> {
        let n = self.fwd.len();
        let mut left: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
        let mut out_degree: Vec<usize> = (0..n)
            .map(|i| {
                if left[i] {
                    self.fwd[i].iter().filter(|&&j| left[j]).count()
                } else {
                    0
                }
            })
            .collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| left[i] && out_degree[i] == 0).collect();

        while let Some(node) = queue.pop_front() {
            left[node] = false;
            for &prev in &self.bwd[node] {
                if left[prev] {
                    out_degree[prev] -= 1;
                    if out_degree[prev] == 0 {
                        queue.push_back(prev);
                    }
                }
            }
        }

        (0..n).filter(|&i| left[i]).collect()
    }

    /// `target` plus everything it transitively consumes
    pub(crate) fn ancestors(&self, target: usize) -> Vec<bool> {
        let mut reachable = vec![false; self.bwd.len()];
        let mut stack = vec![target];
        reachable[target] = true;

        while let Some(node) = stack.pop() {
            for &prev in &self.bwd[node] {
                if !reachable[prev] {
                    reachable[prev] = true;
                    stack.push(prev);
                }
            }
        }

        reachable
    }
}
