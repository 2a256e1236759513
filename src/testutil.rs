use crate::tree::{RawNode, SyntaxTree};

/// Build a leaf node over a byte range.
pub fn leaf(kind: &str, start: usize, end: usize) -> RawNode {
    RawNode {
        kind: kind.to_string(),
        field: None,
        start,
        end,
        children: Vec::new(),
    }
}

/// Build an interior node with children.
pub fn node(kind: &str, start: usize, end: usize, children: Vec<RawNode>) -> RawNode {
    RawNode {
        kind: kind.to_string(),
        field: None,
        start,
        end,
        children,
    }
}

/// Attach a field label to a node.
pub fn field(name: &str, mut raw: RawNode) -> RawNode {
    raw.field = Some(name.to_string());
    raw
}

/// Assemble a tree under the `test` grammar.
pub fn tree(source: &str, root: RawNode) -> SyntaxTree {
    SyntaxTree::from_document(crate::tree::TreeDocument {
        grammar: "test".to_string(),
        source: source.to_string(),
        root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let t = tree(
            "fn foo",
            node(
                "function_item",
                0,
                6,
                vec![leaf("fn", 0, 2), field("name", leaf("identifier", 3, 6))],
            ),
        );
        assert_eq!(t.len(), 3);
        assert!(t.has_field_child(t.root(), "name"));
        let name = t.children(t.root())[1];
        assert_eq!(t.text(name), "foo");
    }
}
