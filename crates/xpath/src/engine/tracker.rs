use std::collections::HashSet;

use crate::engine::runtime::Error;
use crate::model::NodeHandle;
use crate::xdm::Value;

/// Nodes read by a single evaluation, in first-read order.
///
/// A tracker lives for exactly one `evaluate_tracked` call and is handed back
/// to the caller with the result; nothing about it is shared between runs.
#[derive(Debug, Clone)]
pub struct DependencyTracker<N> {
    seen: HashSet<N>,
    order: Vec<N>,
}

impl<N> Default for DependencyTracker<N> {
    fn default() -> Self {
        Self { seen: HashSet::new(), order: Vec::new() }
    }
}

impl<N: NodeHandle> DependencyTracker<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node: N) {
        if self.seen.insert(node) {
            self.order.push(node);
        }
    }

    pub fn record_all(&mut self, nodes: impl IntoIterator<Item = N>) {
        for n in nodes {
            self.record(n);
        }
    }

    pub fn contains(&self, node: N) -> bool {
        self.seen.contains(&node)
    }

    pub fn nodes(&self) -> &[N] {
        &self.order
    }

    pub fn into_nodes(self) -> Vec<N> {
        self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Result of a tracked evaluation. Dependencies are kept even when the
/// evaluation failed, so a failing output is still re-run when its inputs change.
#[derive(Debug, Clone)]
pub struct Evaluation<N> {
    pub result: Result<Value<N>, Error>,
    pub dependencies: DependencyTracker<N>,
}
