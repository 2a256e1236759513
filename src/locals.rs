//! Lexical scope resolution.
//!
//! Consumes the `local.*` capture namespace: `local.scope` marks scope
//! boundaries, `local.definition[.<type>]` registers names, and
//! `local.reference[.<type>]` marks uses to resolve. The scope tree mirrors
//! tree ancestry restricted to marked nodes, under an implicit root scope
//! covering the whole file.
//!
//! Resolution is declared-before-use with automatic shadowing: the nearest
//! preceding same-name definition in the innermost enclosing scope wins, then
//! the walk moves outward. Definition types like `function` are hoisted and
//! visible before their declaration point. Unresolved is a normal outcome for
//! names defined outside the analyzed file.

use crate::query::QueryMatch;
use crate::tree::{NodeId, SyntaxTree};

pub const SCOPE_CAPTURE: &str = "local.scope";
pub const DEFINITION_CAPTURE: &str = "local.definition";
pub const REFERENCE_CAPTURE: &str = "local.reference";

/// Definition types visible before their declaration point.
fn allows_forward_reference(def_type: &str) -> bool {
    matches!(
        def_type,
        "function" | "method" | "type" | "struct" | "enum" | "class"
    )
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub node: NodeId,
    pub name: String,
    /// Suffix of the capture name (`local.definition.var` → `var`), empty if
    /// the capture carried no type.
    pub def_type: String,
    pub start: usize,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub node: NodeId,
    pub name: String,
    pub ref_type: String,
    pub start: usize,
    /// The definition node this reference resolved to, if any. `None` is a
    /// valid terminal state, not an error.
    pub resolved: Option<NodeId>,
}

#[derive(Debug)]
pub struct Scope {
    /// The syntax node marking this scope; `None` for the implicit root.
    pub node: Option<NodeId>,
    pub start: usize,
    pub end: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Local definitions ordered by source position.
    pub definitions: Vec<Definition>,
}

/// Scope tree for one file. Index 0 is always the implicit root scope.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn root(&self) -> usize {
        0
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Innermost scope containing the given byte offset.
    pub fn scope_at(&self, offset: usize) -> usize {
        let mut current = self.root();
        'descend: loop {
            for &child in &self.scopes[current].children {
                let scope = &self.scopes[child];
                if scope.start <= offset && offset < scope.end {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }
}

/// Build the scope tree from surviving locals matches and resolve every
/// reference. Requires the complete match set for the file: definitions are
/// re-sorted by byte offset before resolution, because pattern declaration
/// order is unrelated to source order.
pub fn build(tree: &SyntaxTree, matches: &[QueryMatch]) -> (ScopeTree, Vec<Reference>) {
    let mut scope_nodes: Vec<NodeId> = Vec::new();
    let mut definitions: Vec<Definition> = Vec::new();
    let mut references: Vec<Reference> = Vec::new();

    for m in matches {
        for (name, nodes) in &m.captures {
            if name == SCOPE_CAPTURE {
                scope_nodes.extend(nodes.iter().copied());
            } else if let Some(rest) = name.strip_prefix(DEFINITION_CAPTURE) {
                let def_type = rest.trim_start_matches('.').to_string();
                for &node in nodes {
                    definitions.push(Definition {
                        node,
                        name: tree.text(node).to_string(),
                        def_type: def_type.clone(),
                        start: tree.node(node).start,
                    });
                }
            } else if let Some(rest) = name.strip_prefix(REFERENCE_CAPTURE) {
                let ref_type = rest.trim_start_matches('.').to_string();
                for &node in nodes {
                    references.push(Reference {
                        node,
                        name: tree.text(node).to_string(),
                        ref_type: ref_type.clone(),
                        start: tree.node(node).start,
                        resolved: None,
                    });
                }
            }
        }
    }

    let mut scopes = build_scope_tree(tree, scope_nodes);

    // Global position sort: match discovery order is pattern order, not
    // source order.
    definitions.sort_by_key(|d| (d.start, d.node));
    for def in definitions {
        let scope = scope_index_at(&scopes, def.start);
        scopes[scope].definitions.push(def);
    }

    let scope_tree = ScopeTree { scopes };

    references.sort_by_key(|r| (r.start, r.node));
    for reference in &mut references {
        reference.resolved = resolve(&scope_tree, reference);
    }

    (scope_tree, references)
}

fn build_scope_tree(tree: &SyntaxTree, mut scope_nodes: Vec<NodeId>) -> Vec<Scope> {
    scope_nodes.sort();
    scope_nodes.dedup();
    // Outer scopes first: by start ascending, then end descending.
    scope_nodes.sort_by_key(|&id| {
        let n = tree.node(id);
        (n.start, std::cmp::Reverse(n.end), id)
    });

    let mut scopes = vec![Scope {
        node: None,
        start: 0,
        end: tree.source().len(),
        parent: None,
        children: Vec::new(),
        definitions: Vec::new(),
    }];

    let mut stack: Vec<usize> = vec![0];
    for id in scope_nodes {
        let n = tree.node(id);
        while stack.len() > 1 {
            let top = &scopes[stack[stack.len() - 1]];
            if top.start <= n.start && n.end <= top.end {
                break;
            }
            stack.pop();
        }
        let parent = stack.last().copied().unwrap_or(0);
        let index = scopes.len();
        scopes.push(Scope {
            node: Some(id),
            start: n.start,
            end: n.end,
            parent: Some(parent),
            children: Vec::new(),
            definitions: Vec::new(),
        });
        scopes[parent].children.push(index);
        stack.push(index);
    }

    scopes
}

fn scope_index_at(scopes: &[Scope], offset: usize) -> usize {
    let mut current = 0;
    'descend: loop {
        for &child in &scopes[current].children {
            let scope = &scopes[child];
            if scope.start <= offset && offset < scope.end {
                current = child;
                continue 'descend;
            }
        }
        return current;
    }
}

/// Walk outward from the reference's innermost scope, preferring the nearest
/// preceding definition (declared-before-use). Hoistable definition types may
/// resolve forward when no preceding definition exists in the scope.
fn resolve(scopes: &ScopeTree, reference: &Reference) -> Option<NodeId> {
    let mut scope = scopes.scope_at(reference.start);
    loop {
        let defs = &scopes.scopes()[scope].definitions;

        let preceding = defs
            .iter()
            .filter(|d| d.name == reference.name && d.node != reference.node)
            .filter(|d| d.start < reference.start)
            .max_by_key(|d| d.start);
        if let Some(def) = preceding {
            return Some(def.node);
        }

        let hoisted = defs
            .iter()
            .filter(|d| d.name == reference.name && d.node != reference.node)
            .filter(|d| d.start >= reference.start && allows_forward_reference(&d.def_type))
            .min_by_key(|d| d.start);
        if let Some(def) = hoisted {
            return Some(def.node);
        }

        match scopes.scopes()[scope].parent {
            Some(parent) => scope = parent,
            None => return None,
        }
    }
}
