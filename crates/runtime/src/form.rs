use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use xforms_core::{DefinitionKind, FormDefinition, NodeDefinition, NodeSnapshot, SelectMode};
use xforms_xpath::{
    AtomicValue, CallCtx, DataModel, Error, EvalContextBuilder, ExpressionCache, FunctionRegistry,
    RegistrationError, Value, evaluate,
};

use crate::binds::BindTable;
use crate::config::EngineConfig;
use crate::error::{CycleDiagnostic, FormError, MutationError};
use crate::model::{TreeModel, XNode};
use crate::scheduler::{Environment, OutputId, OutputKind, Scheduler};
use crate::snapshot;
use crate::tree::{Content, InstanceTree, NodeId};

/// A loaded form: the live instance tree plus everything needed to keep its
/// computed state current.
///
/// Every mutation entry point validates first, commits, runs one
/// recomputation pass to a fixed point and returns the rebuilt root snapshot.
/// A rejected call leaves the tree untouched.
pub struct Form {
    definition: FormDefinition,
    config: EngineConfig,
    tree: InstanceTree,
    binds: BindTable,
    cache: ExpressionCache,
    functions: Arc<FunctionRegistry<XNode>>,
    variables: Arc<HashMap<String, AtomicValue>>,
    scheduler: Scheduler,
    diagnostics: Vec<CycleDiagnostic>,
    snapshot: NodeSnapshot,
}

impl Form {
    pub fn new(definition: FormDefinition) -> Result<Self, FormError> {
        Self::with_config(definition, EngineConfig::default())
    }

    pub fn from_json(text: &str) -> Result<Self, FormError> {
        Self::new(FormDefinition::from_json(text)?)
    }

    /// Compile every bind, materialize default instances and run the initial pass.
    pub fn with_config(definition: FormDefinition, config: EngineConfig) -> Result<Self, FormError> {
        let mut cache = ExpressionCache::new(config.expression_cache_capacity());
        let binds = BindTable::compile(definition.root(), &mut cache)?;
        let tree = InstanceTree::new(definition.root());
        let snapshot = snapshot::build_root(&tree, definition.root());
        let mut form = Self {
            scheduler: Scheduler::new(config.max_evaluations_per_output()),
            variables: Arc::new(config.variables().clone()),
            functions: Arc::new(FunctionRegistry::with_builtins()),
            definition,
            config,
            tree,
            binds,
            cache,
            diagnostics: Vec::new(),
            snapshot,
        };
        debug!(root = %form.definition.root().reference, "form loaded");
        form.recompute_all("load");
        Ok(form)
    }

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn snapshot(&self) -> &NodeSnapshot {
        &self.snapshot
    }

    /// Cycle diagnostics raised by the most recent pass.
    pub fn diagnostics(&self) -> &[CycleDiagnostic] {
        &self.diagnostics
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.contains(node)
    }

    /// Snapshot of a single node and its subtree.
    pub fn node_snapshot(&self, node: NodeId) -> Option<NodeSnapshot> {
        snapshot::build(&self.tree, node)
    }

    /// Current text of a value node, or the space-separated selection of a select.
    pub fn value(&self, node: NodeId) -> Option<String> {
        match &self.tree.get(node)?.content {
            Content::Value(v) => Some(v.clone()),
            Content::Select(selected) => Some(selected.join(" ")),
            Content::Structure | Content::Range => None,
        }
    }

    pub fn instances(&self, range: NodeId) -> Vec<NodeId> {
        match self.tree.get(range) {
            Some(node) if node.content == Content::Range => node.children.clone(),
            _ => Vec::new(),
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree.get(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.parent(node)
    }

    /// Instance reference of `node`, e.g. `/f/rep[2]/x`.
    pub fn reference(&self, node: NodeId) -> Result<String, MutationError> {
        if self.tree.contains(node) {
            Ok(self.tree.instance_reference(node))
        } else {
            Err(MutationError::UnknownNode(node))
        }
    }

    /// Nodes read by the latest evaluation of one output of `node`.
    pub fn dependencies(&self, node: NodeId, kind: OutputKind) -> Option<Vec<NodeId>> {
        self.scheduler.dependencies(OutputId { node, kind }).map(<[NodeId]>::to_vec)
    }

    /// Find a node by instance reference (`/f/rep[2]/x`, ranges included) or,
    /// failing that, by evaluating `reference` as an expression from the root.
    pub fn resolve(&mut self, reference: &str) -> Result<NodeId, MutationError> {
        let reference = reference.trim();
        if let Some(id) =
            self.tree.live_nodes().into_iter().find(|id| self.tree.instance_reference(*id) == reference)
        {
            return Ok(id);
        }
        let unknown = || MutationError::UnknownReference(reference.to_string());
        let nodes = self.evaluate(reference).and_then(Value::into_node_set).map_err(|_| unknown())?;
        match nodes.first() {
            Some(XNode::Element(id) | XNode::Text(id)) => Ok(*id),
            Some(XNode::Document) => Ok(self.tree.root()),
            None => Err(unknown()),
        }
    }

    /// Evaluate an ad-hoc expression with the root element as context node.
    pub fn evaluate(&mut self, expression: &str) -> Result<Value<XNode>, Error> {
        let expr = self.cache.get_or_parse(expression)?;
        let model = TreeModel::new(&self.tree);
        let ctx = EvalContextBuilder::new(&model, XNode::Element(self.tree.root()))
            .with_variables(Arc::clone(&self.variables))
            .with_functions(Arc::clone(&self.functions))
            .build();
        evaluate(&expr, &ctx)
    }

    /// String value of a node handed out by [`Form::evaluate`].
    pub fn node_text(&self, node: XNode) -> String {
        TreeModel::new(&self.tree).string_value(node)
    }

    pub fn node_reference(&self, node: XNode) -> String {
        match node {
            XNode::Document => "/".to_string(),
            XNode::Element(id) => self.tree.instance_reference(id),
            XNode::Text(id) => format!("{}/text()", self.tree.instance_reference(id)),
        }
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<&NodeSnapshot, MutationError> {
        let reference = self.reference(node)?;
        match self.tree.get(node).map(|n| &n.content) {
            Some(Content::Value(_)) => {}
            Some(Content::Select(_)) => {
                return Err(MutationError::UnsupportedOperation { reference, operation: "set_value" });
            }
            _ => return Err(MutationError::NotAValueNode(reference)),
        }
        self.check_writable(node, &reference)?;
        if self.tree.write_value(node, value) {
            debug!(%reference, "value set");
            self.scheduler.mark_dependents(&self.tree, node);
        }
        self.recalculate("set_value");
        Ok(&self.snapshot)
    }

    /// Select `item`. A single select replaces its selection, a multiple select adds to it.
    pub fn select(&mut self, node: NodeId, item: &str) -> Result<&NodeSnapshot, MutationError> {
        let (reference, mode, mut selected) = self.writable_select(node, item)?;
        match mode {
            SelectMode::Single => selected = vec![item.to_string()],
            SelectMode::Multiple if !selected.iter().any(|v| v == item) => selected.push(item.to_string()),
            SelectMode::Multiple => {}
        }
        if self.tree.set_selection(node, selected) {
            debug!(%reference, item, "item selected");
            self.scheduler.mark_dependents(&self.tree, node);
        }
        self.recalculate("select");
        Ok(&self.snapshot)
    }

    pub fn deselect(&mut self, node: NodeId, item: &str) -> Result<&NodeSnapshot, MutationError> {
        let (reference, _, mut selected) = self.writable_select(node, item)?;
        selected.retain(|v| v != item);
        if self.tree.set_selection(node, selected) {
            debug!(%reference, item, "item deselected");
            self.scheduler.mark_dependents(&self.tree, node);
        }
        self.recalculate("deselect");
        Ok(&self.snapshot)
    }

    /// Insert `count` instances of the range's template after ordinal
    /// `after_index` (0-based; `-1` inserts at the front, `None` appends).
    pub fn add_instances(
        &mut self,
        range: NodeId,
        after_index: Option<isize>,
        count: usize,
    ) -> Result<&NodeSnapshot, MutationError> {
        let reference = self.reference(range)?;
        let template =
            self.tree.template(range).cloned().ok_or_else(|| MutationError::NotARepeat(reference.clone()))?;
        self.insert(range, reference, after_index, count, &template)
    }

    /// Like [`Form::add_instances`] with an explicit template. The template must
    /// be an instance definition of this range.
    pub fn add_instances_from(
        &mut self,
        range: NodeId,
        after_index: Option<isize>,
        count: usize,
        template: Arc<NodeDefinition>,
    ) -> Result<&NodeSnapshot, MutationError> {
        let reference = self.reference(range)?;
        let own = self.tree.template(range).ok_or_else(|| MutationError::NotARepeat(reference.clone()))?;
        if template.reference != own.reference || !matches!(template.kind, DefinitionKind::RepeatInstance) {
            return Err(MutationError::TemplateMismatch { reference, template: template.reference.clone() });
        }
        self.insert(range, reference, after_index, count, &template)
    }

    fn insert(
        &mut self,
        range: NodeId,
        reference: String,
        after_index: Option<isize>,
        count: usize,
        template: &Arc<NodeDefinition>,
    ) -> Result<&NodeSnapshot, MutationError> {
        let len = self.instances(range).len();
        let last = isize::try_from(len).unwrap_or(isize::MAX) - 1;
        let after = after_index.unwrap_or(last);
        if !(-1..=last).contains(&after) {
            return Err(MutationError::IndexOutOfRange { reference, index: after, len });
        }
        let at = usize::try_from(after + 1).unwrap_or(0);
        let created = self.tree.insert_instances(range, at, count, template);
        debug!(%reference, at, count = created.len(), "instances added");
        self.recompute_all("add_instances");
        Ok(&self.snapshot)
    }

    /// Remove `count` instances starting at 0-based ordinal `start_index`.
    pub fn remove_instances(
        &mut self,
        range: NodeId,
        start_index: usize,
        count: usize,
    ) -> Result<&NodeSnapshot, MutationError> {
        let reference = self.reference(range)?;
        if !self.tree.is_range(range) {
            return Err(MutationError::NotARepeat(reference));
        }
        let len = self.instances(range).len();
        if start_index >= len || count > len - start_index {
            let index = if start_index >= len { start_index } else { len };
            return Err(MutationError::IndexOutOfRange {
                reference,
                index: isize::try_from(index).unwrap_or(isize::MAX),
                len,
            });
        }
        let freed = self.tree.remove_instances(range, start_index, count);
        debug!(%reference, start_index, count, freed = freed.len(), "instances removed");
        self.scheduler.forget(&freed);
        self.recompute_all("remove_instances");
        Ok(&self.snapshot)
    }

    /// Re-run every output without a mutation.
    pub fn recompute(&mut self) -> &NodeSnapshot {
        self.recompute_all("recompute");
        &self.snapshot
    }

    /// Make a host function callable from every expression of this form.
    /// All outputs are recomputed since earlier evaluations may have failed on it.
    pub fn register_function<F>(
        &mut self,
        name: &str,
        arg_types: &[&str],
        return_type: &str,
        func: F,
    ) -> Result<&NodeSnapshot, RegistrationError>
    where
        F: Fn(&CallCtx<XNode>, &[Value<XNode>]) -> Result<Value<XNode>, Error> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.functions).register(name, arg_types, return_type, func)?;
        debug!(name, "function registered");
        self.recompute_all("register_function");
        Ok(&self.snapshot)
    }

    fn check_writable(&self, node: NodeId, reference: &str) -> Result<(), MutationError> {
        if !self.tree.is_relevant(node) {
            return Err(MutationError::NotRelevant(reference.to_string()));
        }
        if self.tree.is_readonly(node) {
            return Err(MutationError::ReadOnly(reference.to_string()));
        }
        Ok(())
    }

    fn writable_select(
        &self,
        node: NodeId,
        item: &str,
    ) -> Result<(String, SelectMode, Vec<String>), MutationError> {
        let reference = self.reference(node)?;
        let Some(n) = self.tree.get(node) else { return Err(MutationError::UnknownNode(node)) };
        let (DefinitionKind::Select { mode, items, itemset, .. }, Content::Select(selected)) =
            (&n.definition.kind, &n.content)
        else {
            return Err(MutationError::NotASelect(reference));
        };
        self.check_writable(node, &reference)?;
        let offers_items = !items.is_empty() || itemset.is_some();
        if offers_items && !n.computed.items.iter().any(|i| i.value == item) {
            return Err(MutationError::UnknownItem { reference, item: item.to_string() });
        }
        Ok((reference, *mode, selected.clone()))
    }

    fn recompute_all(&mut self, trigger: &str) {
        self.scheduler.mark_all(&self.tree, &self.binds);
        self.recalculate(trigger);
    }

    fn recalculate(&mut self, trigger: &str) {
        let env = Environment {
            binds: &self.binds,
            functions: &self.functions,
            variables: &self.variables,
        };
        let report = self.scheduler.run(&mut self.tree, &env, trigger);
        self.diagnostics = report.cycles;
        self.snapshot = snapshot::build_root(&self.tree, self.definition.root());
    }
}
