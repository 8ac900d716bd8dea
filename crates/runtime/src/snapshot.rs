use xforms_core::{ItemSnapshot, NodeDefinition, NodeSnapshot};

use crate::tree::{Content, InstanceTree, NodeId};

/// Materialize the read view of `id` and its subtree.
pub(crate) fn build(tree: &InstanceTree, id: NodeId) -> Option<NodeSnapshot> {
    let node = tree.get(id)?;
    let definition = &node.definition;
    let value = match &node.content {
        Content::Value(v) => Some(v.clone()),
        Content::Select(selected) => Some(selected.join(" ")),
        Content::Structure | Content::Range => None,
    };
    let items = matches!(node.content, Content::Select(_)).then(|| {
        node.computed
            .items
            .iter()
            .map(|i| ItemSnapshot { value: i.value.clone(), label: i.label.clone() })
            .collect()
    });
    let mut errors: Vec<String> =
        node.computed.errors.iter().map(|(kind, message)| format!("{kind}: {message}")).collect();
    if !node.computed.constraint
        && let Some(message) = &definition.bind.constraint_message
    {
        errors.push(message.clone());
    }

    let relevant = tree.is_relevant(id);
    let required = node.computed.required;
    let filled = value.as_deref().is_none_or(|v| !v.is_empty());
    let valid = !relevant
        || (node.computed.errors.is_empty() && node.computed.constraint && (!required || filled));

    Some(NodeSnapshot {
        id: id.to_string(),
        reference: tree.instance_reference(id),
        definition_reference: definition.reference.clone(),
        node_name: definition.node_name.clone(),
        node_type: definition.node_type(),
        category: definition.category(),
        label: definition.label.clone(),
        hint: definition.hint.clone(),
        value,
        relevant,
        readonly: tree.is_readonly(id),
        required,
        valid,
        errors,
        items,
        children: node.children.iter().filter_map(|c| build(tree, *c)).collect(),
    })
}

/// Snapshot of the root, falling back to the bare definition if the root slot
/// is gone.
pub(crate) fn build_root(tree: &InstanceTree, definition: &NodeDefinition) -> NodeSnapshot {
    build(tree, tree.root()).unwrap_or_else(|| NodeSnapshot {
        id: tree.root().to_string(),
        reference: definition.reference.clone(),
        definition_reference: definition.reference.clone(),
        node_name: definition.node_name.clone(),
        node_type: definition.node_type(),
        category: definition.category(),
        label: definition.label.clone(),
        hint: definition.hint.clone(),
        value: None,
        relevant: true,
        readonly: false,
        required: false,
        valid: true,
        errors: Vec::new(),
        items: None,
        children: Vec::new(),
    })
}
