use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Computed properties a bind can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindKind {
    Relevant,
    Readonly,
    Required,
    Calculate,
    Constraint,
}

impl BindKind {
    pub const ALL: [BindKind; 5] = [
        BindKind::Relevant,
        BindKind::Readonly,
        BindKind::Required,
        BindKind::Calculate,
        BindKind::Constraint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BindKind::Relevant => "relevant",
            BindKind::Readonly => "readonly",
            BindKind::Required => "required",
            BindKind::Calculate => "calculate",
            BindKind::Constraint => "constraint",
        }
    }
}

impl fmt::Display for BindKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expression text bound to a node, one optional expression per property.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct BindDefinition {
    pub relevant: Option<String>,
    pub readonly: Option<String>,
    pub required: Option<String>,
    pub calculate: Option<String>,
    pub constraint: Option<String>,
    pub constraint_message: Option<String>,
}

impl BindDefinition {
    pub fn expression(&self, kind: BindKind) -> Option<&str> {
        let text = match kind {
            BindKind::Relevant => &self.relevant,
            BindKind::Readonly => &self.readonly,
            BindKind::Required => &self.required,
            BindKind::Calculate => &self.calculate,
            BindKind::Constraint => &self.constraint,
        };
        text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Declared expressions in [`BindKind::ALL`] order.
    pub fn expressions(&self) -> impl Iterator<Item = (BindKind, &str)> + '_ {
        BindKind::ALL.into_iter().filter_map(|kind| self.expression(kind).map(|e| (kind, e)))
    }

    pub fn is_empty(&self) -> bool {
        self.expressions().next().is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    /// Selecting an item replaces the current selection.
    #[default]
    Single,
    /// Selecting an item adds to the current selection.
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectItem {
    pub value: String,
    #[serde(default)]
    pub label: String,
}

impl SelectItem {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }
}

/// Items computed from the instance: `nodeset` selects one node per item,
/// `value` and `label` are evaluated relative to each of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsetDefinition {
    pub nodeset: String,
    #[serde(default = "ItemsetDefinition::default_value")]
    pub value: String,
    #[serde(default = "ItemsetDefinition::default_label")]
    pub label: String,
}

impl ItemsetDefinition {
    pub fn new(
        nodeset: impl Into<String>,
        value: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self { nodeset: nodeset.into(), value: value.into(), label: label.into() }
    }

    fn default_value() -> String {
        "value".to_string()
    }

    fn default_label() -> String {
        "label".to_string()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DefinitionKind {
    Root,
    Subtree,
    /// `template` is shared by every instance added at runtime; `instances`
    /// are the default instances materialized at load.
    Repeat { template: Arc<NodeDefinition>, instances: Vec<Arc<NodeDefinition>> },
    RepeatInstance,
    Value { default: String },
    Select {
        mode: SelectMode,
        default: Vec<String>,
        items: Vec<SelectItem>,
        itemset: Option<ItemsetDefinition>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Root,
    Subtree,
    RepeatRange,
    RepeatInstance,
    ValueNode,
    Select,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Subtree => "subtree",
            NodeType::RepeatRange => "repeat-range",
            NodeType::RepeatInstance => "repeat-instance",
            NodeType::ValueNode => "value-node",
            NodeType::Select => "select",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Structure,
    Control,
}

/// One node of the immutable definition tree.
///
/// Definitions are built once per loaded form and shared through `Arc`; every
/// repeat instance added at runtime points at its range's template.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDefinition {
    /// Absolute path without positional predicates, e.g. `/data/rep/x`.
    pub reference: String,
    pub node_name: String,
    pub kind: DefinitionKind,
    pub bind: BindDefinition,
    pub label: Option<String>,
    pub hint: Option<String>,
    pub children: Vec<Arc<NodeDefinition>>,
}

impl NodeDefinition {
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            DefinitionKind::Root => NodeType::Root,
            DefinitionKind::Subtree => NodeType::Subtree,
            DefinitionKind::Repeat { .. } => NodeType::RepeatRange,
            DefinitionKind::RepeatInstance => NodeType::RepeatInstance,
            DefinitionKind::Value { .. } => NodeType::ValueNode,
            DefinitionKind::Select { .. } => NodeType::Select,
        }
    }

    pub fn category(&self) -> Category {
        match self.kind {
            DefinitionKind::Value { .. } | DefinitionKind::Select { .. } => Category::Control,
            _ => Category::Structure,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.category() == Category::Control
    }

    /// Depth-first search by definition reference, descending into repeat templates.
    pub fn find(&self, reference: &str) -> Option<&NodeDefinition> {
        if self.reference == reference {
            return Some(self);
        }
        if let DefinitionKind::Repeat { template, .. } = &self.kind {
            return template.find(reference);
        }
        self.children.iter().find_map(|c| c.find(reference))
    }
}
