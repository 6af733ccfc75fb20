//! Parsed document graph
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. An alias is
//! not a node of its own: it resolves to the id of the anchored node, so a
//! node reached twice is the same id both times.

use crate::error::SourceLocation;

/// Handle of a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// How a scalar was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar
    Literal,
    /// `>` block scalar
    Folded,
}

/// Scalar content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
}

impl Scalar {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            style: ScalarStyle::Plain,
        }
    }

    pub fn is_plain(&self) -> bool {
        self.style == ScalarStyle::Plain
    }
}

/// Node content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Scalar(Scalar),
    Sequence(Vec<NodeId>),
    Mapping(Vec<(NodeId, NodeId)>),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Mapping(_) => "mapping",
        }
    }
}

/// Document node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub tag: Option<String>,
    pub location: SourceLocation,
}

impl Node {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// True for a scalar with no text, whatever its style
    pub fn is_empty_scalar(&self) -> bool {
        self.as_scalar().is_some_and(|scalar| scalar.value.is_empty())
    }
}

/// Document: node arena plus root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add an untagged plain scalar.
    pub fn plain(&mut self, value: impl Into<String>) -> NodeId {
        self.push_kind(NodeKind::Scalar(Scalar::plain(value)))
    }

    /// Add an untagged double-quoted scalar.
    pub fn quoted(&mut self, value: impl Into<String>) -> NodeId {
        self.push_kind(NodeKind::Scalar(Scalar {
            value: value.into(),
            style: ScalarStyle::DoubleQuoted,
        }))
    }

    pub fn sequence(&mut self, items: Vec<NodeId>) -> NodeId {
        self.push_kind(NodeKind::Sequence(items))
    }

    /// Add a mapping with plain scalar keys.
    pub fn mapping<K: Into<String>>(&mut self, entries: Vec<(K, NodeId)>) -> NodeId {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (self.plain(key), value))
            .collect();
        self.push_kind(NodeKind::Mapping(entries))
    }

    pub fn set_tag(&mut self, id: NodeId, tag: impl Into<String>) {
        self.nodes[id.0].tag = Some(tag.into());
    }

    fn push_kind(&mut self, kind: NodeKind) -> NodeId {
        self.push(Node {
            kind,
            tag: None,
            location: SourceLocation::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_graph() {
        let mut doc = Document::new();
        let shared = doc.plain("abcd");
        doc.set_tag(shared, "!test-type");
        let root = doc.mapping(vec![("field_one", shared), ("field_two", shared)]);
        doc.set_root(root);

        assert_eq!(doc.root(), Some(root));
        assert_eq!(doc.node(shared).tag.as_deref(), Some("!test-type"));
        match &doc.node(root).kind {
            NodeKind::Mapping(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].1, entries[1].1);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_empty_scalar() {
        let mut doc = Document::new();
        let plain = doc.plain("");
        let quoted = doc.quoted("");
        let text = doc.plain("x");
        assert!(doc.node(plain).is_empty_scalar());
        assert!(doc.node(quoted).is_empty_scalar());
        assert!(!doc.node(text).is_empty_scalar());
        assert_eq!(doc.node(quoted).kind.name(), "scalar");
    }
}
