//! Structural match executor.
//!
//! Applies a compiled pattern at every node of the tree in pre-order. Child
//! sequences are matched with a single-pass, non-backtracking greedy scan:
//! grammar subtrees are well-formed, so backtracking buys nothing. Any unmet
//! constraint aborts the (pattern, node) attempt; no partial captures escape.

use super::parser::{Pattern, Quantifier, Step, StepMatcher};
use crate::tree::{NodeId, SyntaxTree};

/// One successful (pattern, root node) application.
///
/// Captures appear in first-bound order; a capture under a quantifier binds
/// an ordered node sequence in sibling order.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub pattern_index: usize,
    pub captures: Vec<(String, Vec<NodeId>)>,
}

impl QueryMatch {
    /// Nodes bound to a capture name, or `None` if it never bound.
    pub fn nodes_for(&self, name: &str) -> Option<&[NodeId]> {
        self.captures
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, nodes)| nodes.as_slice())
    }
}

type Captures = Vec<(String, Vec<NodeId>)>;

fn bind(caps: &mut Captures, name: &str, node: NodeId) {
    match caps.iter_mut().find(|(n, _)| n == name) {
        Some((_, nodes)) => nodes.push(node),
        None => caps.push((name.to_string(), vec![node])),
    }
}

/// Run one pattern over the whole tree, attempting a match rooted at every
/// node in pre-order. Deterministic and restartable.
pub fn run_pattern(tree: &SyntaxTree, pattern: &Pattern) -> Vec<QueryMatch> {
    let mut out = Vec::new();
    for node in tree.preorder() {
        if let Some(m) = match_at(tree, pattern, node) {
            out.push(m);
        }
    }
    out
}

/// Attempt a structural match of `pattern` rooted at `node`.
pub fn match_at(tree: &SyntaxTree, pattern: &Pattern, node: NodeId) -> Option<QueryMatch> {
    let mut captures = Captures::new();
    if match_step(tree, &pattern.root, node, &mut captures) {
        Some(QueryMatch {
            pattern_index: pattern.index,
            captures,
        })
    } else {
        None
    }
}

fn match_step(tree: &SyntaxTree, step: &Step, node: NodeId, caps: &mut Captures) -> bool {
    match &step.matcher {
        StepMatcher::Kind(kind) => {
            if tree.kind(node) != kind {
                return false;
            }
        }
        StepMatcher::Literal(text) => {
            // Anonymous token nodes carry their text as kind; fall back to
            // exact source text for leaves whose kind differs.
            if tree.kind(node) != text && !(tree.is_leaf(node) && tree.text(node) == text) {
                return false;
            }
        }
        StepMatcher::Wildcard => {}
        StepMatcher::Alternation(alternatives) => {
            if !alternatives
                .iter()
                .any(|alt| try_step(tree, alt, node, caps))
            {
                return false;
            }
        }
    }

    for field in &step.negated_fields {
        if tree.has_field_child(node, field) {
            return false;
        }
    }

    if !step.children.is_empty() && !match_children(tree, step, node, caps) {
        return false;
    }

    for name in &step.captures {
        bind(caps, name, node);
    }
    true
}

/// Attempt a step with rollback: bindings from a failed attempt are discarded.
fn try_step(tree: &SyntaxTree, step: &Step, node: NodeId, caps: &mut Captures) -> bool {
    let checkpoint = caps.clone();
    if match_step(tree, step, node, caps) {
        true
    } else {
        *caps = checkpoint;
        false
    }
}

/// Whether `kid` can satisfy `step`, honoring its field constraint.
fn candidate(tree: &SyntaxTree, step: &Step, kid: NodeId, caps: &mut Captures) -> bool {
    if let Some(field) = &step.field {
        if tree.node(kid).field.as_deref() != Some(field.as_str()) {
            return false;
        }
    }
    try_step(tree, step, kid, caps)
}

/// Scan forward from `from` for the first child satisfying `step`.
/// Bindings commit only for the child that matched.
fn scan(
    tree: &SyntaxTree,
    step: &Step,
    kids: &[NodeId],
    from: usize,
    caps: &mut Captures,
) -> Option<usize> {
    (from..kids.len()).find(|&j| candidate(tree, step, kids[j], caps))
}

/// Match the pattern's child sequence against the node's children.
///
/// Single pass, left to right. Quantifiers consume greedily; zero-width
/// success is a success. `anchor_first`/`anchor_last` pin the first/last
/// pattern child to the first/last tree child.
fn match_children(tree: &SyntaxTree, parent: &Step, node: NodeId, caps: &mut Captures) -> bool {
    let kids = tree.children(node);
    let count = parent.children.len();
    let mut cursor = 0usize;

    for (i, pchild) in parent.children.iter().enumerate() {
        let must_start = parent.anchor_first && i == 0;
        let must_end = parent.anchor_last && i == count - 1;

        match pchild.quantifier {
            Quantifier::One => {
                let Some(found) = scan(tree, pchild, kids, cursor, caps) else {
                    return false;
                };
                if must_start && found != 0 {
                    return false;
                }
                if must_end && found != kids.len() - 1 {
                    return false;
                }
                cursor = found + 1;
            }
            Quantifier::Optional => {
                if let Some(found) = scan(tree, pchild, kids, cursor, caps) {
                    if must_start && found != 0 {
                        return false;
                    }
                    if must_end && found != kids.len() - 1 {
                        return false;
                    }
                    cursor = found + 1;
                }
            }
            Quantifier::ZeroOrMore | Quantifier::OneOrMore => {
                match scan(tree, pchild, kids, cursor, caps) {
                    None => {
                        if pchild.quantifier == Quantifier::OneOrMore {
                            return false;
                        }
                    }
                    Some(first) => {
                        if must_start && first != 0 {
                            return false;
                        }
                        // Greedily consume consecutive matching siblings.
                        let mut last = first;
                        while last + 1 < kids.len()
                            && candidate(tree, pchild, kids[last + 1], caps)
                        {
                            last += 1;
                        }
                        if must_end && last != kids.len() - 1 {
                            return false;
                        }
                        cursor = last + 1;
                    }
                }
            }
        }
    }

    true
}
