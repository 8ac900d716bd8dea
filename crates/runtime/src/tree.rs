//! Arena-backed instance tree.
//!
//! Nodes are addressed by generational [`NodeId`]s. Freeing a slot bumps its
//! generation, so identifiers of removed repeat instances never resolve again
//! even after the slot is reused.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use xforms_core::{DefinitionKind, NodeDefinition, SelectItem, SelectMode};

use crate::scheduler::OutputKind;

/// Generational index into the instance arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Content {
    /// Root, subtree or repeat instance.
    Structure,
    Range,
    Value(String),
    Select(Vec<String>),
}

/// Last-good computed state of a node.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Computed {
    pub relevant: bool,
    pub readonly: bool,
    pub required: bool,
    pub constraint: bool,
    pub items: Vec<SelectItem>,
    pub errors: BTreeMap<OutputKind, String>,
}

impl Computed {
    fn initial(definition: &NodeDefinition) -> Self {
        let items = match &definition.kind {
            DefinitionKind::Select { items, .. } => items.clone(),
            _ => Vec::new(),
        };
        Self {
            relevant: true,
            readonly: false,
            required: false,
            constraint: true,
            items,
            errors: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct InstanceNode {
    pub definition: Arc<NodeDefinition>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub content: Content,
    pub computed: Computed,
}

struct Slot {
    generation: u32,
    node: Option<InstanceNode>,
}

pub(crate) struct InstanceTree {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    root: NodeId,
}

impl InstanceTree {
    pub fn new(root: &Arc<NodeDefinition>) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
        };
        tree.root = tree.build(root, None);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, node: InstanceNode) -> NodeId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    fn free(&mut self, id: NodeId) {
        if self.contains(id) {
            let slot = &mut self.slots[id.index as usize];
            slot.node = None;
            slot.generation += 1;
            self.free_list.push(id.index);
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&InstanceNode> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut InstanceNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    /// Materialize `definition` and its subtree with fresh default values.
    fn build(&mut self, definition: &Arc<NodeDefinition>, parent: Option<NodeId>) -> NodeId {
        let content = match &definition.kind {
            DefinitionKind::Root | DefinitionKind::Subtree | DefinitionKind::RepeatInstance => {
                Content::Structure
            }
            DefinitionKind::Repeat { .. } => Content::Range,
            DefinitionKind::Value { default } => Content::Value(default.clone()),
            DefinitionKind::Select { default, items, mode, .. } => {
                let mut selected: Vec<String> = default
                    .iter()
                    .filter(|v| items.is_empty() || items.iter().any(|i| &i.value == *v))
                    .cloned()
                    .collect();
                if *mode == SelectMode::Single {
                    selected.truncate(1);
                }
                Content::Select(selected)
            }
        };
        let id = self.alloc(InstanceNode {
            definition: Arc::clone(definition),
            parent,
            children: Vec::new(),
            content,
            computed: Computed::initial(definition),
        });
        let child_defs: Vec<Arc<NodeDefinition>> = match &definition.kind {
            DefinitionKind::Repeat { instances, .. } => instances.clone(),
            _ => definition.children.clone(),
        };
        let children = child_defs.iter().map(|d| self.build(d, Some(id))).collect();
        if let Some(node) = self.get_mut(id) {
            node.children = children;
        }
        id
    }

    pub fn template(&self, range: NodeId) -> Option<&Arc<NodeDefinition>> {
        match &self.get(range)?.definition.kind {
            DefinitionKind::Repeat { template, .. } => Some(template),
            _ => None,
        }
    }

    /// Insert `count` instances of `template` so the first lands at ordinal `at`.
    pub fn insert_instances(
        &mut self,
        range: NodeId,
        at: usize,
        count: usize,
        template: &Arc<NodeDefinition>,
    ) -> Vec<NodeId> {
        let created: Vec<NodeId> = (0..count).map(|_| self.build(template, Some(range))).collect();
        if let Some(node) = self.get_mut(range) {
            let at = at.min(node.children.len());
            node.children.splice(at..at, created.iter().copied());
        }
        created
    }

    /// Detach and free the instances at ordinals `start..start + count`.
    /// Returns every freed node, descendants included.
    pub fn remove_instances(&mut self, range: NodeId, start: usize, count: usize) -> Vec<NodeId> {
        let removed: Vec<NodeId> = match self.get_mut(range) {
            Some(node) => {
                let end = (start + count).min(node.children.len());
                node.children.drain(start.min(end)..end).collect()
            }
            None => Vec::new(),
        };
        let mut freed = Vec::new();
        for instance in removed {
            freed.extend(self.subtree(instance));
        }
        for id in &freed {
            self.free(*id);
        }
        freed
    }

    /// `id` and its descendants in document order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    pub fn live_nodes(&self) -> Vec<NodeId> {
        self.subtree(self.root)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    pub fn is_range(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.content == Content::Range)
    }

    /// Value and select nodes.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| matches!(n.content, Content::Value(_) | Content::Select(_)))
    }

    /// Parent as seen by expressions: repeat ranges are skipped.
    pub fn xpath_parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        if self.is_range(parent) { self.parent(parent) } else { Some(parent) }
    }

    /// Children as seen by expressions: a range is replaced by its instances.
    pub fn xpath_children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.get(id) else { return Vec::new() };
        let mut out = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            match self.get(child) {
                Some(c) if c.content == Content::Range => out.extend(c.children.iter().copied()),
                Some(_) => out.push(child),
                None => {}
            }
        }
        out
    }

    /// 1-based ordinal and instance count of the nearest enclosing repeat instance.
    pub fn repeat_position(&self, id: NodeId) -> Option<(usize, usize)> {
        let mut current = id;
        loop {
            let parent = self.parent(current)?;
            if let Some(range) = self.get(parent).filter(|p| p.content == Content::Range) {
                let position = range.children.iter().position(|c| *c == current)?;
                return Some((position + 1, range.children.len()));
            }
            current = parent;
        }
    }

    pub fn text(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else { return String::new() };
        match &node.content {
            Content::Value(v) => v.clone(),
            Content::Select(selected) => selected.join(" "),
            Content::Structure | Content::Range => {
                node.children.iter().map(|c| self.text(*c)).collect()
            }
        }
    }

    pub fn is_relevant(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.computed.relevant)
            && self.ancestors(id).iter().all(|a| self.get(*a).is_some_and(|n| n.computed.relevant))
    }

    /// Ancestors are relevant; the node's own expression is not consulted.
    pub fn ancestors_relevant(&self, id: NodeId) -> bool {
        self.ancestors(id).iter().all(|a| self.get(*a).is_some_and(|n| n.computed.relevant))
    }

    /// Readonly when the node or an ancestor says so, or when the node is calculated.
    pub fn is_readonly(&self, id: NodeId) -> bool {
        let calculated = self.get(id).is_some_and(|n| n.definition.bind.calculate.is_some());
        calculated
            || std::iter::once(id)
                .chain(self.ancestors(id))
                .any(|n| self.get(n).is_some_and(|n| n.computed.readonly))
    }

    /// Empty a value or select node. Returns whether anything changed.
    pub fn clear_value(&mut self, id: NodeId) -> bool {
        match self.get_mut(id).map(|n| &mut n.content) {
            Some(Content::Value(v)) if !v.is_empty() => {
                v.clear();
                true
            }
            Some(Content::Select(selected)) if !selected.is_empty() => {
                selected.clear();
                true
            }
            _ => false,
        }
    }

    /// Write text into a value node, or a space-separated selection into a select.
    pub fn write_value(&mut self, id: NodeId, text: &str) -> bool {
        let Some(node) = self.get_mut(id) else { return false };
        match &mut node.content {
            Content::Value(v) => {
                if v == text {
                    return false;
                }
                *v = text.to_string();
                true
            }
            Content::Select(_) => {
                let mut values: Vec<String> = Vec::new();
                for v in text.split_whitespace() {
                    if !values.iter().any(|x| x == v) {
                        values.push(v.to_string());
                    }
                }
                self.set_selection(id, values)
            }
            Content::Structure | Content::Range => false,
        }
    }

    /// Replace a selection, keeping only values offered by the current items
    /// when the select declares any.
    pub fn set_selection(&mut self, id: NodeId, mut values: Vec<String>) -> bool {
        let Some(node) = self.get_mut(id) else { return false };
        let (single, offers_items) = match &node.definition.kind {
            DefinitionKind::Select { mode, items, itemset, .. } => {
                (*mode == SelectMode::Single, !items.is_empty() || itemset.is_some())
            }
            _ => return false,
        };
        if offers_items {
            values.retain(|v| node.computed.items.iter().any(|i| &i.value == v));
        }
        if single {
            values.truncate(1);
        }
        match &mut node.content {
            Content::Select(selected) if *selected != values => {
                *selected = values;
                true
            }
            _ => false,
        }
    }

    /// Drop selected values no longer offered by the current items.
    pub fn retain_selection(&mut self, id: NodeId) -> bool {
        let selected = match self.get(id).map(|n| &n.content) {
            Some(Content::Select(selected)) => selected.clone(),
            _ => return false,
        };
        self.set_selection(id, selected)
    }

    /// Reference with 1-based positions for repeat instances, e.g. `/f/rep[2]/x`.
    pub fn instance_reference(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else { return String::new() };
        let name = &node.definition.node_name;
        let Some(parent) = node.parent else { return format!("/{name}") };
        if let Some(range) = self.get(parent).filter(|p| p.content == Content::Range) {
            let position = range.children.iter().position(|c| *c == id).map_or(0, |p| p + 1);
            let base = range.parent.map(|p| self.instance_reference(p)).unwrap_or_default();
            return format!("{base}/{name}[{position}]");
        }
        format!("{}/{name}", self.instance_reference(parent))
    }
}
