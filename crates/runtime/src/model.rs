//! Expression view of the instance tree.

use xforms_xpath::{DataModel, NodeKind};

use crate::tree::{InstanceTree, NodeId};

/// Node handle handed to the evaluator: a synthetic document node above the
/// form root, one element per non-range instance node, and one text node
/// under every value or select node whose value is non-empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum XNode {
    Document,
    Element(NodeId),
    Text(NodeId),
}

impl XNode {
    /// Instance node a read of this handle depends on.
    pub fn target(self, tree_root: NodeId) -> NodeId {
        match self {
            XNode::Document => tree_root,
            XNode::Element(id) | XNode::Text(id) => id,
        }
    }
}

pub(crate) struct TreeModel<'a> {
    tree: &'a InstanceTree,
}

impl<'a> TreeModel<'a> {
    pub fn new(tree: &'a InstanceTree) -> Self {
        Self { tree }
    }
}

impl DataModel for TreeModel<'_> {
    type Node = XNode;

    fn kind(&self, node: XNode) -> NodeKind {
        match node {
            XNode::Document => NodeKind::Document,
            XNode::Element(_) => NodeKind::Element,
            XNode::Text(_) => NodeKind::Text,
        }
    }

    fn name(&self, node: XNode) -> Option<String> {
        match node {
            XNode::Document | XNode::Text(_) => None,
            XNode::Element(id) => self.tree.get(id).map(|n| n.definition.node_name.clone()),
        }
    }

    fn string_value(&self, node: XNode) -> String {
        self.tree.text(node.target(self.tree.root()))
    }

    fn parent(&self, node: XNode) -> Option<XNode> {
        match node {
            XNode::Document => None,
            XNode::Element(id) if id == self.tree.root() => Some(XNode::Document),
            XNode::Element(id) => self.tree.xpath_parent(id).map(XNode::Element),
            XNode::Text(id) => Some(XNode::Element(id)),
        }
    }

    fn children(&self, node: XNode) -> Vec<XNode> {
        match node {
            XNode::Document => vec![XNode::Element(self.tree.root())],
            XNode::Element(id) if self.tree.is_leaf(id) => {
                if self.tree.text(id).is_empty() { Vec::new() } else { vec![XNode::Text(id)] }
            }
            XNode::Element(id) => {
                self.tree.xpath_children(id).into_iter().map(XNode::Element).collect()
            }
            XNode::Text(_) => Vec::new(),
        }
    }

    fn root(&self, _node: XNode) -> XNode {
        XNode::Document
    }
}
