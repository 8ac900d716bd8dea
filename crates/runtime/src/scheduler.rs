//! Dirty-set recomputation.
//!
//! A pass drains the dirty set to a fixed point. Each evaluation runs with a
//! fresh dependency tracker; its read set replaces the output's previous edges
//! and a changed result dirties every output that read the written node or one
//! of its ancestors. Evaluations per output are capped within a pass so cycles
//! terminate with a diagnostic instead of spinning.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use xforms_core::{BindKind, SelectItem};
use xforms_xpath::parser::ast::Expr;
use xforms_xpath::{
    AtomicValue, Error, EvalContextBuilder, FunctionRegistry, Value, evaluate_tracked,
};

use crate::binds::{BindTable, CompiledItemset};
use crate::error::CycleDiagnostic;
use crate::model::{TreeModel, XNode};
use crate::tree::{InstanceTree, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputKind {
    Relevant,
    Readonly,
    Required,
    Calculate,
    Constraint,
    Itemset,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Relevant => "relevant",
            OutputKind::Readonly => "readonly",
            OutputKind::Required => "required",
            OutputKind::Calculate => "calculate",
            OutputKind::Constraint => "constraint",
            OutputKind::Itemset => "itemset",
        }
    }

    /// Outputs whose result is written into the tree's values.
    fn writes_values(self) -> bool {
        matches!(self, OutputKind::Relevant | OutputKind::Calculate | OutputKind::Itemset)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BindKind> for OutputKind {
    fn from(kind: BindKind) -> Self {
        match kind {
            BindKind::Relevant => OutputKind::Relevant,
            BindKind::Readonly => OutputKind::Readonly,
            BindKind::Required => OutputKind::Required,
            BindKind::Calculate => OutputKind::Calculate,
            BindKind::Constraint => OutputKind::Constraint,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputId {
    pub node: NodeId,
    pub kind: OutputKind,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum OutputValue {
    Flag(bool),
    Text(String),
    Items(Vec<SelectItem>),
}

pub(crate) struct Outcome {
    pub result: Result<OutputValue, Error>,
    pub reads: Vec<NodeId>,
}

/// Everything an evaluation needs besides the tree itself.
pub(crate) struct Environment<'a> {
    pub binds: &'a BindTable,
    pub functions: &'a Arc<FunctionRegistry<XNode>>,
    pub variables: &'a Arc<HashMap<String, AtomicValue>>,
}

impl Environment<'_> {
    pub fn evaluate(&self, tree: &InstanceTree, output: OutputId) -> Outcome {
        let model = TreeModel::new(tree);
        let mut reads = Vec::new();
        let focus = tree.repeat_position(output.node).unwrap_or((1, 1));
        let binds = tree.get(output.node).and_then(|n| self.binds.get(&n.definition.reference));
        let result = match (output.kind, binds) {
            (OutputKind::Itemset, Some(binds)) => match &binds.itemset {
                Some(itemset) => self.itemset(&model, itemset, output.node, focus, &mut reads),
                None => Err(Error::failed("no itemset declared")),
            },
            (kind, Some(binds)) => match binds.expressions.get(&kind) {
                Some(expr) => self
                    .expression(&model, expr, XNode::Element(output.node), focus, &mut reads)
                    .map(|value| match kind {
                        OutputKind::Calculate => OutputValue::Text(value.to_string_value(&model)),
                        _ => OutputValue::Flag(value.to_boolean()),
                    }),
                None => Err(Error::failed(format!("no {kind} expression declared"))),
            },
            (_, None) => Err(Error::failed("node has no bound expressions")),
        };
        let root = tree.root();
        let mut seen = HashSet::new();
        let reads = reads.into_iter().map(|n| n.target(root)).filter(|n| seen.insert(*n)).collect();
        Outcome { result, reads }
    }

    fn expression(
        &self,
        model: &TreeModel<'_>,
        expr: &Expr,
        node: XNode,
        (position, size): (usize, usize),
        reads: &mut Vec<XNode>,
    ) -> Result<Value<XNode>, Error> {
        let ctx = EvalContextBuilder::new(model, node)
            .with_position(position, size)
            .with_variables(Arc::clone(self.variables))
            .with_functions(Arc::clone(self.functions))
            .build();
        let evaluation = evaluate_tracked(expr, &ctx);
        reads.extend(evaluation.dependencies.into_nodes());
        evaluation.result
    }

    fn itemset(
        &self,
        model: &TreeModel<'_>,
        itemset: &CompiledItemset,
        select: NodeId,
        focus: (usize, usize),
        reads: &mut Vec<XNode>,
    ) -> Result<OutputValue, Error> {
        let nodes = self
            .expression(model, &itemset.nodeset, XNode::Element(select), focus, reads)?
            .into_node_set()?;
        let size = nodes.len();
        let mut items: Vec<SelectItem> = Vec::with_capacity(size);
        for (i, node) in nodes.into_iter().enumerate() {
            let value = self
                .expression(model, &itemset.value, node, (i + 1, size), reads)?
                .to_string_value(model);
            let label = self
                .expression(model, &itemset.label, node, (i + 1, size), reads)?
                .to_string_value(model);
            if !items.iter().any(|item| item.value == value) {
                items.push(SelectItem::new(value, label));
            }
        }
        Ok(OutputValue::Items(items))
    }
}

#[derive(Debug, Default)]
pub(crate) struct PassReport {
    pub evaluations: usize,
    pub suppressed: usize,
    pub cycles: Vec<CycleDiagnostic>,
}

/// Dependency edges and the dirty set. Owned by the form; never shared.
pub(crate) struct Scheduler {
    edges: HashMap<OutputId, Vec<NodeId>>,
    dependents: HashMap<NodeId, BTreeSet<OutputId>>,
    dirty: BTreeSet<OutputId>,
    max_evaluations: usize,
}

impl Scheduler {
    pub fn new(max_evaluations: usize) -> Self {
        Self {
            edges: HashMap::new(),
            dependents: HashMap::new(),
            dirty: BTreeSet::new(),
            max_evaluations: max_evaluations.max(1),
        }
    }

    pub fn outputs_of(tree: &InstanceTree, binds: &BindTable, node: NodeId) -> Vec<OutputId> {
        match tree.get(node) {
            Some(n) if !tree.is_range(node) => binds
                .outputs(&n.definition.reference)
                .into_iter()
                .map(|kind| OutputId { node, kind })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn mark_all(&mut self, tree: &InstanceTree, binds: &BindTable) {
        for node in tree.live_nodes() {
            self.dirty.extend(Self::outputs_of(tree, binds, node));
        }
    }

    /// Dirty every output that read `node` or one of its ancestors.
    pub fn mark_dependents(&mut self, tree: &InstanceTree, node: NodeId) {
        for n in std::iter::once(node).chain(tree.ancestors(node)) {
            if let Some(outputs) = self.dependents.get(&n) {
                self.dirty.extend(outputs.iter().copied());
            }
        }
    }

    pub fn dependencies(&self, output: OutputId) -> Option<&[NodeId]> {
        self.edges.get(&output).map(Vec::as_slice)
    }

    /// Drop every edge from or to removed nodes.
    pub fn forget(&mut self, removed: &[NodeId]) {
        let removed: HashSet<NodeId> = removed.iter().copied().collect();
        let dependents = &mut self.dependents;
        self.edges.retain(|output, reads| {
            if !removed.contains(&output.node) {
                return true;
            }
            for read in reads.iter() {
                if let Some(set) = dependents.get_mut(read) {
                    set.remove(output);
                }
            }
            false
        });
        dependents.retain(|node, set| !removed.contains(node) && !set.is_empty());
        self.dirty.retain(|o| !removed.contains(&o.node));
    }

    fn replace_edges(&mut self, output: OutputId, reads: Vec<NodeId>) {
        if let Some(old) = self.edges.remove(&output) {
            for node in old {
                if let Some(set) = self.dependents.get_mut(&node) {
                    set.remove(&output);
                    if set.is_empty() {
                        self.dependents.remove(&node);
                    }
                }
            }
        }
        for node in &reads {
            self.dependents.entry(*node).or_default().insert(output);
        }
        self.edges.insert(output, reads);
    }

    /// A dirty output none of whose reads is about to be rewritten, or the
    /// first dirty output when every candidate waits on another one.
    fn next_ready(&self) -> Option<OutputId> {
        let first = *self.dirty.first()?;
        let pending: HashSet<NodeId> =
            self.dirty.iter().filter(|o| o.kind.writes_values()).map(|o| o.node).collect();
        let ready = self.dirty.iter().find(|o| {
            self.edges
                .get(*o)
                .is_none_or(|reads| reads.iter().all(|r| *r == o.node || !pending.contains(r)))
        });
        Some(ready.copied().unwrap_or(first))
    }

    fn suppressed(tree: &InstanceTree, output: OutputId) -> bool {
        match output.kind {
            OutputKind::Relevant => !tree.ancestors_relevant(output.node),
            _ => !tree.is_relevant(output.node),
        }
    }

    pub fn run(&mut self, tree: &mut InstanceTree, env: &Environment<'_>, trigger: &str) -> PassReport {
        let mut report = PassReport::default();
        let mut attempts: HashMap<OutputId, usize> = HashMap::new();
        let mut capped: HashSet<OutputId> = HashSet::new();
        debug!(trigger, dirty = self.dirty.len(), "recomputation pass started");

        while let Some(output) = self.next_ready() {
            self.dirty.remove(&output);
            if !tree.contains(output.node) || capped.contains(&output) {
                continue;
            }
            let count = attempts.entry(output).or_insert(0);
            if *count >= self.max_evaluations {
                let diagnostic = CycleDiagnostic {
                    reference: tree.instance_reference(output.node),
                    output: output.kind,
                    evaluations: *count,
                };
                warn!(%diagnostic, "dependency cycle");
                report.cycles.push(diagnostic);
                capped.insert(output);
                continue;
            }
            if Self::suppressed(tree, output) {
                report.suppressed += 1;
                continue;
            }
            *count += 1;
            report.evaluations += 1;

            let outcome = env.evaluate(tree, output);
            trace!(node = %output.node, output = %output.kind, reads = outcome.reads.len(), "evaluated");
            self.replace_edges(output, outcome.reads);
            match outcome.result {
                Ok(value) => {
                    if let Some(node) = tree.get_mut(output.node) {
                        node.computed.errors.remove(&output.kind);
                    }
                    self.apply(tree, env.binds, output, value);
                }
                Err(error) => {
                    warn!(
                        reference = %tree.instance_reference(output.node),
                        output = %output.kind,
                        %error,
                        "evaluation failed"
                    );
                    if let Some(node) = tree.get_mut(output.node) {
                        node.computed.errors.insert(output.kind, error.to_string());
                    }
                }
            }
        }

        debug!(
            trigger,
            evaluations = report.evaluations,
            suppressed = report.suppressed,
            cycles = report.cycles.len(),
            "recomputation pass finished"
        );
        report
    }

    fn apply(&mut self, tree: &mut InstanceTree, binds: &BindTable, output: OutputId, value: OutputValue) {
        let node = output.node;
        match (output.kind, value) {
            (OutputKind::Relevant, OutputValue::Flag(relevant)) => {
                let before = tree.is_relevant(node);
                if let Some(n) = tree.get_mut(node) {
                    n.computed.relevant = relevant;
                }
                let after = tree.is_relevant(node);
                if before && !after {
                    for id in tree.subtree(node) {
                        if tree.clear_value(id) {
                            self.mark_dependents(tree, id);
                        }
                    }
                } else if !before && after {
                    for id in tree.subtree(node) {
                        let outputs = Self::outputs_of(tree, binds, id);
                        self.dirty.extend(outputs.into_iter().filter(|o| *o != output));
                    }
                }
            }
            (OutputKind::Calculate, OutputValue::Text(text)) => {
                if tree.write_value(node, &text) {
                    self.mark_dependents(tree, node);
                }
            }
            (OutputKind::Itemset, OutputValue::Items(items)) => {
                if let Some(n) = tree.get_mut(node) {
                    n.computed.items = items;
                }
                if tree.retain_selection(node) {
                    self.mark_dependents(tree, node);
                }
            }
            (kind, OutputValue::Flag(flag)) => {
                if let Some(n) = tree.get_mut(node) {
                    match kind {
                        OutputKind::Readonly => n.computed.readonly = flag,
                        OutputKind::Required => n.computed.required = flag,
                        OutputKind::Constraint => n.computed.constraint = flag,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}
