use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::definition::{
    BindDefinition, DefinitionKind, ItemsetDefinition, NodeDefinition, SelectItem, SelectMode,
};
use crate::error::DefinitionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderKind {
    Group,
    Repeat,
    Value,
    /// Multiple selection.
    Select,
    /// Single selection.
    Select1,
}

/// Description of a form node as handed over by a definition parser.
///
/// The same shape is used for JSON form files. Without an explicit `kind`, a
/// node with children is a group and a node without children is a value.
///
/// Repeats list their default `instances`; one of them may carry
/// `"template": true` to declare the template explicitly. A repeat's own
/// `children` also count as an explicit template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeBuilder {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BuilderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "BindDefinition::is_empty")]
    pub bind: BindDefinition,
    /// Default value; space-separated values for selects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeBuilder>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<NodeBuilder>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<SelectItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itemset: Option<ItemsetDefinition>,
}

impl NodeBuilder {
    fn with_kind(name: impl Into<String>, kind: BuilderKind) -> Self {
        Self { name: name.into(), kind: Some(kind), ..Self::default() }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, BuilderKind::Group)
    }

    pub fn repeat(name: impl Into<String>) -> Self {
        Self::with_kind(name, BuilderKind::Repeat)
    }

    pub fn value(name: impl Into<String>) -> Self {
        Self::with_kind(name, BuilderKind::Value)
    }

    pub fn select(name: impl Into<String>, mode: SelectMode) -> Self {
        let kind = match mode {
            SelectMode::Single => BuilderKind::Select1,
            SelectMode::Multiple => BuilderKind::Select,
        };
        Self::with_kind(name, kind)
    }

    /// Default instance body for a repeat.
    pub fn instance() -> Self {
        Self::default()
    }

    pub fn child(mut self, child: NodeBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_instance(mut self, instance: NodeBuilder) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_template(mut self, mut template: NodeBuilder) -> Self {
        template.template = true;
        self.instances.push(template);
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_relevant(mut self, expr: impl Into<String>) -> Self {
        self.bind.relevant = Some(expr.into());
        self
    }

    pub fn with_readonly(mut self, expr: impl Into<String>) -> Self {
        self.bind.readonly = Some(expr.into());
        self
    }

    pub fn with_required(mut self, expr: impl Into<String>) -> Self {
        self.bind.required = Some(expr.into());
        self
    }

    pub fn with_calculate(mut self, expr: impl Into<String>) -> Self {
        self.bind.calculate = Some(expr.into());
        self
    }

    pub fn with_constraint(mut self, expr: impl Into<String>, message: Option<&str>) -> Self {
        self.bind.constraint = Some(expr.into());
        self.bind.constraint_message = message.map(str::to_string);
        self
    }

    pub fn with_item(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.items.push(SelectItem::new(value, label));
        self
    }

    pub fn with_itemset(mut self, itemset: ItemsetDefinition) -> Self {
        self.itemset = Some(itemset);
        self
    }

    fn resolved_kind(&self) -> BuilderKind {
        match self.kind {
            Some(kind) => kind,
            None if self.children.is_empty() => BuilderKind::Value,
            None => BuilderKind::Group,
        }
    }
}

/// A validated definition tree, ready to be materialized.
#[derive(Clone, Debug, PartialEq)]
pub struct FormDefinition {
    root: Arc<NodeDefinition>,
}

impl FormDefinition {
    pub fn from_builder(root: NodeBuilder) -> Result<Self, DefinitionError> {
        let kind = root.resolved_kind();
        if kind != BuilderKind::Group {
            return Err(DefinitionError::InvalidRoot { kind: format!("{kind:?}").to_lowercase() });
        }
        validate_name(&root.name, "/")?;
        let reference = format!("/{}", root.name);
        let children = build_children(&root.children, &reference)?;
        let root = NodeDefinition {
            reference,
            node_name: root.name,
            kind: DefinitionKind::Root,
            bind: root.bind,
            label: root.label,
            hint: root.hint,
            children,
        };
        Ok(Self { root: Arc::new(root) })
    }

    pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
        let builder: NodeBuilder = serde_json::from_str(text)?;
        Self::from_builder(builder)
    }

    pub fn root(&self) -> &Arc<NodeDefinition> {
        &self.root
    }

    pub fn find(&self, reference: &str) -> Option<&NodeDefinition> {
        self.root.find(reference)
    }
}

fn validate_name(name: &str, parent: &str) -> Result<(), DefinitionError> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(DefinitionError::InvalidName { name: name.to_string(), parent: parent.to_string() })
    }
}

fn build_children(
    builders: &[NodeBuilder],
    parent: &str,
) -> Result<Vec<Arc<NodeDefinition>>, DefinitionError> {
    builders.iter().map(|b| build_node(b, parent).map(Arc::new)).collect()
}

fn build_node(builder: &NodeBuilder, parent: &str) -> Result<NodeDefinition, DefinitionError> {
    validate_name(&builder.name, parent)?;
    let reference = format!("{parent}/{}", builder.name);
    let mut children = Vec::new();
    let kind = match builder.resolved_kind() {
        BuilderKind::Group => {
            children = build_children(&builder.children, &reference)?;
            DefinitionKind::Subtree
        }
        BuilderKind::Value => {
            DefinitionKind::Value { default: builder.default.clone().unwrap_or_default() }
        }
        BuilderKind::Select | BuilderKind::Select1 => {
            if !builder.items.is_empty() && builder.itemset.is_some() {
                return Err(DefinitionError::ConflictingItems { reference });
            }
            let mode = if builder.resolved_kind() == BuilderKind::Select1 {
                SelectMode::Single
            } else {
                SelectMode::Multiple
            };
            let mut default: Vec<String> = Vec::new();
            for value in builder.default.as_deref().unwrap_or_default().split_whitespace() {
                if !default.iter().any(|v| v == value) {
                    default.push(value.to_string());
                }
            }
            if mode == SelectMode::Single {
                default.truncate(1);
            }
            DefinitionKind::Select {
                mode,
                default,
                items: builder.items.clone(),
                itemset: builder.itemset.clone(),
            }
        }
        BuilderKind::Repeat => build_repeat(builder, &reference)?,
    };
    Ok(NodeDefinition {
        reference,
        node_name: builder.name.clone(),
        kind,
        bind: if builder.resolved_kind() == BuilderKind::Repeat {
            BindDefinition::default()
        } else {
            builder.bind.clone()
        },
        label: builder.label.clone(),
        hint: builder.hint.clone(),
        children,
    })
}

fn build_repeat(builder: &NodeBuilder, reference: &str) -> Result<DefinitionKind, DefinitionError> {
    let declared = builder.instances.iter().filter(|i| i.template).count()
        + usize::from(!builder.children.is_empty());
    if declared > 1 {
        return Err(DefinitionError::DuplicateTemplate { reference: reference.to_string() });
    }
    let instance = |body: &[NodeBuilder]| -> Result<NodeDefinition, DefinitionError> {
        Ok(NodeDefinition {
            reference: reference.to_string(),
            node_name: builder.name.clone(),
            kind: DefinitionKind::RepeatInstance,
            bind: builder.bind.clone(),
            label: builder.label.clone(),
            hint: builder.hint.clone(),
            children: build_children(body, reference)?,
        })
    };

    let template = if let Some(explicit) = builder.instances.iter().find(|i| i.template) {
        instance(&explicit.children)?
    } else if !builder.children.is_empty() {
        instance(&builder.children)?
    } else if let Some(first) = builder.instances.first() {
        cleared(&instance(&first.children)?)
    } else {
        instance(&[])?
    };
    let instances = builder
        .instances
        .iter()
        .filter(|i| !i.template)
        .map(|i| instance(&i.children).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DefinitionKind::Repeat { template: Arc::new(template), instances })
}

/// Copy of `definition` with every leaf default emptied.
fn cleared(definition: &NodeDefinition) -> NodeDefinition {
    let kind = match &definition.kind {
        DefinitionKind::Value { .. } => DefinitionKind::Value { default: String::new() },
        DefinitionKind::Select { mode, items, itemset, .. } => DefinitionKind::Select {
            mode: *mode,
            default: Vec::new(),
            items: items.clone(),
            itemset: itemset.clone(),
        },
        DefinitionKind::Repeat { template, instances } => DefinitionKind::Repeat {
            template: Arc::new(cleared(template)),
            instances: instances.iter().map(|i| Arc::new(cleared(i))).collect(),
        },
        other => other.clone(),
    };
    NodeDefinition {
        kind,
        children: definition.children.iter().map(|c| Arc::new(cleared(c))).collect(),
        ..definition.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_xml_rules() {
        assert!(validate_name("a-b.c_d", "/").is_ok());
        assert!(validate_name("_x", "/").is_ok());
        assert!(validate_name("", "/").is_err());
        assert!(validate_name("1a", "/").is_err());
        assert!(validate_name("a b", "/").is_err());
        assert!(validate_name("a/b", "/").is_err());
    }

    #[test]
    fn kind_is_inferred_from_children() {
        assert_eq!(NodeBuilder::default().resolved_kind(), BuilderKind::Value);
        let group = NodeBuilder { children: vec![NodeBuilder::value("x")], ..Default::default() };
        assert_eq!(group.resolved_kind(), BuilderKind::Group);
    }
}
