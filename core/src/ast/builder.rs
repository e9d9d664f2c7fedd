use super::{Ast, Node, NodeId, NodeKind, Span};
use std::path::PathBuf;

/// Bottom-up constructor for an [`Ast`]. Children must be pushed before the
/// node that owns them; parent links are filled in as owners are pushed.
#[derive(Debug)]
pub struct AstBuilder {
    file: PathBuf,
    content_hash: u64,
    nodes: Vec<Node>,
}

impl AstBuilder {
    pub fn new(file: impl Into<PathBuf>, content_hash: u64) -> Self {
        Self {
            file: file.into(),
            content_hash,
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let mut children = Vec::new();
        let kind = kind.map_children(&mut |child| {
            children.push(child);
            child
        });
        for &child in &children {
            let slot = &mut self.nodes[child.index()];
            debug_assert!(slot.parent.is_none(), "node {child:?} already has a parent");
            slot.parent = Some(id);
        }
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
            children,
        });
        id
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Fresh copy of the subtree rooted at `id`, so desugaring can reuse an
    /// operand in two places without giving a node two parents.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let node = self.nodes[id.index()].clone();
        let kind = node.kind.map_children(&mut |child| self.deep_copy(child));
        self.push(kind, node.span)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn finish(self, root: NodeId) -> Ast {
        Ast {
            file: self.file,
            content_hash: self.content_hash,
            nodes: self.nodes,
            root,
        }
    }
}
