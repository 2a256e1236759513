//! Classification assigner.
//!
//! Replays surviving matches in pattern declaration order into an overwrite
//! map, so a broad base rule declared early (a generic identifier) is refined
//! by later, more specific rules. Emits an ordered, non-overlapping token
//! stream for the presentation layer.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::CaptureMappings;
use crate::query::QueryMatch;
use crate::tree::{NodeId, SyntaxTree};

/// Capture-name namespace consumed by the scope resolver, not by
/// classification.
pub const LOCALS_NAMESPACE: &str = "local.";

/// One classified token: a byte range plus its semantic category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
    pub category: String,
}

/// Whether a capture name carries a semantic category.
///
/// Names starting with `_` are predicate-only scratch captures; the
/// `local.` namespace belongs to the scope resolver.
pub fn is_category_capture(name: &str) -> bool {
    !name.starts_with('_') && !name.starts_with(LOCALS_NAMESPACE)
}

/// Resolve surviving matches into at most one category per node.
///
/// `matches` must be ordered by pattern declaration index; later patterns
/// unconditionally overwrite earlier ones for the same exact node. Within one
/// match, captures apply in declaration order (two category captures on the
/// same node is a pattern-authoring error; the last one wins).
pub fn assign(
    matches: &[QueryMatch],
    mappings: Option<&CaptureMappings>,
) -> HashMap<NodeId, String> {
    debug_assert!(
        matches.windows(2).all(|w| w[0].pattern_index <= w[1].pattern_index),
        "matches must be replayed in pattern declaration order"
    );

    let mut categories: HashMap<NodeId, String> = HashMap::new();
    for m in matches {
        for (name, nodes) in &m.captures {
            if !is_category_capture(name) {
                continue;
            }
            let category = mappings
                .and_then(|map| map.get(name))
                .cloned()
                .unwrap_or_else(|| name.clone());
            for &node in nodes {
                categories.insert(node, category.clone());
            }
        }
    }
    categories
}

/// Flatten a category map into an ordered, non-overlapping span stream.
///
/// Where classified nodes overlap, the inner (shorter) token wins and the
/// enclosing span is dropped, regardless of where inside the enclosing span
/// the inner token starts.
pub fn spans(tree: &SyntaxTree, categories: &HashMap<NodeId, String>) -> Vec<TokenSpan> {
    let mut entries: Vec<(usize, usize, NodeId, &String)> = categories
        .iter()
        .filter_map(|(&id, category)| {
            let n = tree.node(id);
            if n.start < n.end {
                Some((n.start, n.end, id, category))
            } else {
                None
            }
        })
        .collect();

    // Shortest spans claim their range first. Children sit after their parent
    // in the arena, so at equal (len, start) the higher NodeId is the deeper,
    // more specific node.
    entries.sort_by(|a, b| {
        (a.1 - a.0, a.0, std::cmp::Reverse(a.2)).cmp(&(b.1 - b.0, b.0, std::cmp::Reverse(b.2)))
    });

    // `out` stays sorted by start; accepted spans are disjoint, so a binary
    // search on end offsets finds the only possible collision.
    let mut out: Vec<TokenSpan> = Vec::with_capacity(entries.len());
    for (start, end, _, category) in entries {
        let idx = out.partition_point(|t| t.end <= start);
        let collides = out.get(idx).is_some_and(|t| t.start < end);
        if !collides {
            out.insert(
                idx,
                TokenSpan {
                    start,
                    end,
                    category: category.clone(),
                },
            );
        }
    }
    out
}
