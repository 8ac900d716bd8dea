use serde::Serialize;

use crate::definition::{Category, NodeType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemSnapshot {
    pub value: String,
    pub label: String,
}

/// Read-only view of one instance node after a completed recomputation pass.
///
/// Computed properties of a node that is not relevant carry no meaning; the
/// engine still reports its last values here.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: String,
    /// Instance reference with 1-based positions for repeat instances, e.g. `/f/rep[2]/x`.
    pub reference: String,
    pub definition_reference: String,
    pub node_name: String,
    pub node_type: NodeType,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Value nodes hold their text, selects their space-separated selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub relevant: bool,
    pub readonly: bool,
    pub required: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemSnapshot>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    /// Depth-first search by instance reference.
    pub fn find(&self, reference: &str) -> Option<&NodeSnapshot> {
        if self.reference == reference {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(reference))
    }

    /// Value of the node at `reference`, if it is a value or select node.
    pub fn value_of(&self, reference: &str) -> Option<&str> {
        self.find(reference).and_then(|n| n.value.as_deref())
    }

    pub fn walk(&self) -> Vec<&NodeSnapshot> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}
