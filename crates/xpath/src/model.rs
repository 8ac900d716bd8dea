use core::cmp::Ordering;
use core::fmt::Debug;
use core::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
}

/// Node handle bound shared by every host tree.
pub trait NodeHandle: Copy + Eq + Ord + Hash + Debug + 'static {}

impl<T: Copy + Eq + Ord + Hash + Debug + 'static> NodeHandle for T {}

/// Read access to a host tree.
///
/// Node handles are small copyable identifiers owned by the host; the model is
/// consulted for every structural question, so a host can expose a live tree
/// without handing out references into its storage.
pub trait DataModel {
    type Node: NodeHandle;

    fn kind(&self, node: Self::Node) -> NodeKind;
    /// Qualified name for elements and attributes.
    fn name(&self, node: Self::Node) -> Option<String>;
    fn string_value(&self, node: Self::Node) -> String;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;
    fn attributes(&self, _node: Self::Node) -> Vec<Self::Node> {
        Vec::new()
    }

    /// Topmost ancestor of `node` (the document node for attached trees).
    fn root(&self, node: Self::Node) -> Self::Node {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    fn compare_document_order(&self, a: Self::Node, b: Self::Node) -> Ordering {
        compare_by_ancestry(self, a, b)
    }
}

/// Fallback comparator for document order based on ancestry and sibling position.
///
/// - An ancestor precedes its descendants.
/// - Among siblings, attributes come first, then children, each in adapter order.
/// - Nodes of different roots fall back to handle order so the result stays total.
pub fn compare_by_ancestry<M>(model: &M, a: M::Node, b: M::Node) -> Ordering
where
    M: DataModel + ?Sized,
{
    if a == b {
        return Ordering::Equal;
    }
    let path_to_root = |mut n: M::Node| {
        let mut p = vec![n];
        while let Some(parent) = model.parent(n) {
            p.push(parent);
            n = parent;
        }
        p.reverse();
        p
    };
    let pa = path_to_root(a);
    let pb = path_to_root(b);
    let len = pa.len().min(pb.len());
    let mut i = 0usize;
    while i < len && pa[i] == pb[i] {
        i += 1;
    }
    if i == len {
        return pa.len().cmp(&pb.len());
    }
    if i == 0 {
        return a.cmp(&b);
    }
    let parent = pa[i - 1];
    let mut sibs = model.attributes(parent);
    sibs.extend(model.children(parent));
    let posa = sibs.iter().position(|n| *n == pa[i]);
    let posb = sibs.iter().position(|n| *n == pb[i]);
    match (posa, posb) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => pa[i].cmp(&pb[i]),
    }
}

/// Sort nodes into document order and drop duplicates.
pub fn sort_document_order<M>(model: &M, nodes: &mut Vec<M::Node>)
where
    M: DataModel + ?Sized,
{
    nodes.sort_by(|a, b| model.compare_document_order(*a, *b));
    nodes.dedup();
}
