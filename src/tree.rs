//! Syntax tree data model.
//!
//! The tree is produced by an external parser and handed to the engine as a
//! JSON document. The engine treats node kinds and field labels as opaque
//! strings; nothing here knows any particular grammar's semantics.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Index into the tree's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug)]
pub struct NodeData {
    pub kind: String,
    /// Field label assigned by the parent production (e.g. `name`, `body`).
    pub field: Option<String>,
    /// Byte range into the source text.
    pub start: usize,
    pub end: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Nested node shape as produced by the external parser.
#[derive(Debug, Deserialize)]
pub struct RawNode {
    pub kind: String,
    #[serde(default)]
    pub field: Option<String>,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub children: Vec<RawNode>,
}

/// Top-level tree document: one parsed file version.
#[derive(Debug, Deserialize)]
pub struct TreeDocument {
    pub grammar: String,
    pub source: String,
    pub root: RawNode,
}

/// Immutable arena-backed syntax tree for one file version.
#[derive(Debug)]
pub struct SyntaxTree {
    grammar: String,
    source: String,
    nodes: Vec<NodeData>,
    /// Byte offsets where each line starts (0-indexed into source)
    line_starts: Vec<usize>,
}

impl SyntaxTree {
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: TreeDocument =
            serde_json::from_str(json).context("failed to parse tree document")?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: TreeDocument) -> Self {
        let mut nodes = Vec::new();
        flatten(&doc.root, None, &mut nodes);
        let line_starts = compute_line_starts(doc.source.as_bytes());
        Self {
            grammar: doc.grammar,
            source: doc.source,
            nodes,
            line_starts,
        }
    }

    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> &str {
        &self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).children.is_empty()
    }

    /// Exact source text spanned by a node. Out-of-range offsets (a malformed
    /// document) yield an empty string rather than a panic.
    pub fn text(&self, id: NodeId) -> &str {
        let n = self.node(id);
        self.source.get(n.start..n.end).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the node has any child carrying the given field label.
    pub fn has_field_child(&self, id: NodeId, field: &str) -> bool {
        self.children(id)
            .iter()
            .any(|&c| self.node(c).field.as_deref() == Some(field))
    }

    /// Deterministic pre-order traversal of the whole tree.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: if self.nodes.is_empty() {
                Vec::new()
            } else {
                vec![self.root()]
            },
        }
    }

    /// Convert a byte offset into a (1-indexed line, 0-indexed column) pair.
    /// Column is a character offset (UTF-8 codepoint count) within the line.
    pub fn offset_to_line_col(&self, byte_offset: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let end = byte_offset.min(self.source.len());
        let line_bytes = &self.source.as_bytes()[line_start.min(end)..end];
        let col = line_bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count();
        (line_idx + 1, col)
    }
}

pub struct Preorder<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        // Push children reversed so the first child is visited next.
        for &child in self.tree.children(id).iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

fn flatten(raw: &RawNode, parent: Option<NodeId>, nodes: &mut Vec<NodeData>) -> NodeId {
    let id = NodeId(nodes.len() as u32);
    nodes.push(NodeData {
        kind: raw.kind.clone(),
        field: raw.field.clone(),
        start: raw.start,
        end: raw.end,
        parent,
        children: Vec::with_capacity(raw.children.len()),
    });
    for child in &raw.children {
        let child_id = flatten(child, Some(id), nodes);
        nodes[id.0 as usize].children.push(child_id);
    }
    id
}

fn compute_line_starts(content: &[u8]) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, &b) in content.iter().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{leaf, node, tree};

    #[test]
    fn from_json_roundtrip() {
        let json = r#"{
            "grammar": "rust",
            "source": "fn foo() {}",
            "root": {
                "kind": "source_file", "start": 0, "end": 11,
                "children": [
                    {"kind": "function_item", "start": 0, "end": 11, "children": [
                        {"kind": "fn", "start": 0, "end": 2},
                        {"kind": "identifier", "field": "name", "start": 3, "end": 6}
                    ]}
                ]
            }
        }"#;
        let tree = SyntaxTree::from_json(json).unwrap();
        assert_eq!(tree.grammar(), "rust");
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.kind(tree.root()), "source_file");
        let func = tree.children(tree.root())[0];
        assert_eq!(tree.kind(func), "function_item");
        let name = tree.children(func)[1];
        assert_eq!(tree.text(name), "foo");
        assert_eq!(tree.node(name).field.as_deref(), Some("name"));
    }

    #[test]
    fn from_json_malformed() {
        assert!(SyntaxTree::from_json("{not json").is_err());
        assert!(SyntaxTree::from_json(r#"{"grammar": "x"}"#).is_err());
    }

    #[test]
    fn preorder_is_depth_first() {
        let t = tree(
            "ab cd",
            node(
                "root",
                0,
                5,
                vec![
                    node("pair", 0, 2, vec![leaf("a", 0, 1), leaf("b", 1, 2)]),
                    node("pair", 3, 5, vec![leaf("c", 3, 4), leaf("d", 4, 5)]),
                ],
            ),
        );
        let kinds: Vec<&str> = t.preorder().map(|id| t.kind(id)).collect();
        assert_eq!(kinds, vec!["root", "pair", "a", "b", "pair", "c", "d"]);
    }

    #[test]
    fn text_clamps_bad_ranges() {
        let t = tree("ab", node("root", 0, 99, vec![]));
        assert_eq!(t.text(t.root()), "");
    }

    #[test]
    fn offset_to_line_col_multiline() {
        let t = tree("let x = 1;\nlet y = 2;\n", node("root", 0, 22, vec![]));
        assert_eq!(t.offset_to_line_col(0), (1, 0));
        assert_eq!(t.offset_to_line_col(4), (1, 4));
        assert_eq!(t.offset_to_line_col(11), (2, 0));
        assert_eq!(t.offset_to_line_col(15), (2, 4));
    }

    #[test]
    fn has_field_child() {
        let t = tree(
            "fn foo",
            node(
                "function_item",
                0,
                6,
                vec![leaf("fn", 0, 2), {
                    let mut n = leaf("identifier", 3, 6);
                    n.field = Some("name".to_string());
                    n
                }],
            ),
        );
        assert!(t.has_field_child(t.root(), "name"));
        assert!(!t.has_field_child(t.root(), "body"));
    }
}
