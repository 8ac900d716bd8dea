//! Simple in-memory tree implementing `DataModel`, used in tests, benches and
//! for evaluating expressions without a form.
//!
//! Example:
//! ```
//! use xforms_xpath::simple_node::{doc, elem, text, attr};
//! use xforms_xpath::DataModel;
//!
//! // <root id="r"><child>Hello</child><child world="yes"/></root>
//! let document = doc()
//!     .child(
//!         elem("root")
//!             .attr(attr("id", "r"))
//!             .child(elem("child").child(text("Hello")))
//!             .child(elem("child").attr(attr("world", "yes"))),
//!     )
//!     .build();
//!
//! let root = document.root_element().unwrap();
//! assert_eq!(document.name(root).as_deref(), Some("root"));
//! assert_eq!(document.children(root).len(), 2);
//! assert_eq!(document.string_value(root), "Hello");
//! ```
use core::cmp::Ordering;

use crate::model::{DataModel, NodeKind};

/// Handle into a `SimpleDocument`. Handles are assigned in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimpleNodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    name: Option<String>,
    value: String,
    parent: Option<usize>,
    children: Vec<usize>,
    attributes: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct SimpleDocument {
    nodes: Vec<NodeData>,
}

impl SimpleDocument {
    pub fn document(&self) -> SimpleNodeId {
        SimpleNodeId(0)
    }

    pub fn root_element(&self) -> Option<SimpleNodeId> {
        self.nodes[0]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[*c].kind == NodeKind::Element)
            .map(SimpleNodeId)
    }

    fn push(&mut self, data: NodeData) -> usize {
        self.nodes.push(data);
        self.nodes.len() - 1
    }

    fn append(&mut self, parent: usize, builder: SimpleNodeBuilder) {
        let (kind, name, value, attrs, children) = match builder {
            SimpleNodeBuilder::Element { name, attrs, children } => {
                (NodeKind::Element, Some(name), String::new(), attrs, children)
            }
            SimpleNodeBuilder::Text(t) => (NodeKind::Text, None, t, Vec::new(), Vec::new()),
            SimpleNodeBuilder::Comment(t) => (NodeKind::Comment, None, t, Vec::new(), Vec::new()),
        };
        let id = self.push(NodeData {
            kind,
            name,
            value,
            parent: Some(parent),
            children: Vec::new(),
            attributes: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        for (n, v) in attrs {
            let a = self.push(NodeData {
                kind: NodeKind::Attribute,
                name: Some(n),
                value: v,
                parent: Some(id),
                children: Vec::new(),
                attributes: Vec::new(),
            });
            self.nodes[id].attributes.push(a);
        }
        for child in children {
            self.append(id, child);
        }
    }

    fn collect_text(&self, idx: usize, out: &mut String) {
        for &c in &self.nodes[idx].children {
            match self.nodes[c].kind {
                NodeKind::Text => out.push_str(&self.nodes[c].value),
                NodeKind::Element => self.collect_text(c, out),
                _ => {}
            }
        }
    }
}

impl DataModel for SimpleDocument {
    type Node = SimpleNodeId;

    fn kind(&self, node: SimpleNodeId) -> NodeKind {
        self.nodes[node.0].kind
    }

    fn name(&self, node: SimpleNodeId) -> Option<String> {
        self.nodes[node.0].name.clone()
    }

    fn string_value(&self, node: SimpleNodeId) -> String {
        let data = &self.nodes[node.0];
        match data.kind {
            NodeKind::Document | NodeKind::Element => {
                let mut out = String::new();
                self.collect_text(node.0, &mut out);
                out
            }
            _ => data.value.clone(),
        }
    }

    fn parent(&self, node: SimpleNodeId) -> Option<SimpleNodeId> {
        self.nodes[node.0].parent.map(SimpleNodeId)
    }

    fn children(&self, node: SimpleNodeId) -> Vec<SimpleNodeId> {
        self.nodes[node.0].children.iter().copied().map(SimpleNodeId).collect()
    }

    fn attributes(&self, node: SimpleNodeId) -> Vec<SimpleNodeId> {
        self.nodes[node.0].attributes.iter().copied().map(SimpleNodeId).collect()
    }

    fn root(&self, _node: SimpleNodeId) -> SimpleNodeId {
        SimpleNodeId(0)
    }

    fn compare_document_order(&self, a: SimpleNodeId, b: SimpleNodeId) -> Ordering {
        a.cmp(&b)
    }
}

#[derive(Debug, Clone)]
pub enum SimpleNodeBuilder {
    Element { name: String, attrs: Vec<(String, String)>, children: Vec<SimpleNodeBuilder> },
    Text(String),
    Comment(String),
}

impl SimpleNodeBuilder {
    pub fn attr(mut self, attribute: (String, String)) -> Self {
        if let SimpleNodeBuilder::Element { attrs, .. } = &mut self {
            attrs.push(attribute);
        }
        self
    }

    pub fn child(mut self, child: SimpleNodeBuilder) -> Self {
        if let SimpleNodeBuilder::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    children: Vec<SimpleNodeBuilder>,
}

impl DocumentBuilder {
    pub fn child(mut self, child: SimpleNodeBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub fn build(self) -> SimpleDocument {
        let mut document = SimpleDocument {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                name: None,
                value: String::new(),
                parent: None,
                children: Vec::new(),
                attributes: Vec::new(),
            }],
        };
        for child in self.children {
            document.append(0, child);
        }
        document
    }
}

pub fn doc() -> DocumentBuilder {
    DocumentBuilder::default()
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::Element { name: name.to_string(), attrs: Vec::new(), children: Vec::new() }
}

pub fn text(value: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::Text(value.to_string())
}

pub fn comment(value: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::Comment(value.to_string())
}

pub fn attr(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}
