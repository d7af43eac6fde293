//! Arena-backed syntax tree with whitespace-preserving leaves.

use tree_sitter::Node;

/// Index of a node inside its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Start position of a node (1-indexed line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A single node of the tree.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    /// Tree-sitter kind name (`identifier`, `assignment`, `+`, ...).
    pub kind: &'static str,
    /// Whether the grammar names this node (as opposed to a literal token).
    pub named: bool,
    /// Field name under the parent, if any.
    pub field: Option<&'static str>,
    pub parent: Option<NodeId>,
    pub start: Position,
    data: NodeData,
}

#[derive(Debug, Clone)]
enum NodeData {
    /// A token: `prefix` holds everything between the previous token and this one.
    Leaf { prefix: String, value: String },
    Branch { children: Vec<NodeId> },
}

/// A mutable syntax tree that renders back to its exact source text.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    root: NodeId,
    trailing: String,
}

impl SyntaxTree {
    pub(super) fn from_tree_sitter(root: Node<'_>, source: &str) -> Self {
        let mut builder = Builder {
            source,
            nodes: Vec::new(),
            last_end: 0,
        };
        let root_id = builder.build(root, None, None);
        let trailing = source.get(builder.last_end..).unwrap_or_default().to_string();
        Self {
            nodes: builder.nodes,
            root: root_id,
            trailing,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &'static str {
        self.nodes[id.0].kind
    }

    pub fn is_named(&self, id: NodeId) -> bool {
        self.nodes[id.0].named
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn field(&self, id: NodeId) -> Option<&'static str> {
        self.nodes[id.0].field
    }

    pub fn start(&self, id: NodeId) -> Position {
        self.nodes[id.0].start
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Leaf { .. })
    }

    /// Children of a branch; empty for leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].data {
            NodeData::Branch { children } => children,
            NodeData::Leaf { .. } => &[],
        }
    }

    /// Token text of a leaf.
    pub fn value(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Leaf { value, .. } => Some(value),
            NodeData::Branch { .. } => None,
        }
    }

    /// Whitespace and comments preceding a leaf.
    pub fn leaf_prefix(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Leaf { prefix, .. } => Some(prefix),
            NodeData::Branch { .. } => None,
        }
    }

    /// Prefix of the first token under `id`.
    pub fn prefix(&self, id: NodeId) -> &str {
        self.first_leaf(id)
            .and_then(|leaf| self.leaf_prefix(leaf))
            .unwrap_or_default()
    }

    pub fn first_leaf(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            match &self.nodes[current.0].data {
                NodeData::Leaf { .. } => return Some(current),
                NodeData::Branch { children } => current = *children.first()?,
            }
        }
    }

    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.field(child) == Some(field))
    }

    /// Source text of a subtree, without the prefix of its first token.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        let prefix_len = self.prefix(id).len();
        out.split_off(prefix_len)
    }

    /// Replace the token text of a leaf, keeping its prefix.
    pub fn set_value(&mut self, id: NodeId, new_value: String) {
        if let NodeData::Leaf { value, .. } = &mut self.nodes[id.0].data {
            *value = new_value;
        }
    }

    /// Replace the children of a branch.
    pub fn set_children(&mut self, id: NodeId, new_children: Vec<NodeId>) {
        for &child in &new_children {
            self.nodes[child.0].parent = Some(id);
        }
        if let NodeData::Branch { children } = &mut self.nodes[id.0].data {
            *children = new_children;
        }
    }

    /// Allocate a detached leaf positioned at `at`.
    pub fn new_leaf(
        &mut self,
        kind: &'static str,
        prefix: impl Into<String>,
        value: impl Into<String>,
        at: Position,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode {
            kind,
            named: false,
            field: None,
            parent: None,
            start: at,
            data: NodeData::Leaf {
                prefix: prefix.into(),
                value: value.into(),
            },
        });
        id
    }

    /// Serialize the (possibly mutated) tree back to source text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.trailing.len() + self.nodes.len() * 4);
        self.render_into(self.root, &mut out);
        out.push_str(&self.trailing);
        out
    }

    fn render_into(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match &self.nodes[current.0].data {
                NodeData::Leaf { prefix, value } => {
                    out.push_str(prefix);
                    out.push_str(value);
                }
                NodeData::Branch { children } => stack.extend(children.iter().rev()),
            }
        }
    }
}

struct Builder<'s> {
    source: &'s str,
    nodes: Vec<SyntaxNode>,
    last_end: usize,
}

impl Builder<'_> {
    fn build(&mut self, node: Node<'_>, field: Option<&'static str>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let position = node.start_position();
        let start = Position {
            line: position.row + 1,
            column: position.column + 1,
        };

        let data = if node.child_count() == 0 {
            let start_byte = node.start_byte().max(self.last_end);
            let end_byte = node.end_byte().max(start_byte);
            let prefix = self.slice(self.last_end, start_byte);
            let value = self.slice(start_byte, end_byte);
            self.last_end = end_byte;
            NodeData::Leaf { prefix, value }
        } else {
            NodeData::Branch {
                children: Vec::new(),
            }
        };

        self.nodes.push(SyntaxNode {
            kind: node.kind(),
            named: node.is_named(),
            field,
            parent,
            start,
            data,
        });

        if node.child_count() > 0 {
            let mut children = Vec::with_capacity(node.child_count());
            let mut cursor = node.walk();
            if cursor.goto_first_child() {
                loop {
                    let child = cursor.node();
                    let child_field = cursor.field_name();
                    children.push(self.build(child, child_field, Some(id)));
                    if !cursor.goto_next_sibling() {
                        break;
                    }
                }
            }
            self.nodes[id.0].data = NodeData::Branch { children };
        }

        id
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.source.get(start..end).unwrap_or_default().to_string()
    }
}
