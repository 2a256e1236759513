//! Predicate clauses — post-match filters over captured text.
//!
//! Recognized clause kinds: `#eq?` / `#not-eq?` (literal or capture RHS),
//! `#any-of?` / `#not-any-of?`, and `#match?` / `#not-match?` (regex).
//! Unrecognized names pass vacuously with a warning; resilience over
//! strictness, since query files evolve faster than the engine.

use regex::Regex;

use super::matcher::QueryMatch;
use super::{QuerySyntaxError, Warning};
use crate::tree::SyntaxTree;

/// Clause argument as parsed, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawArg {
    Capture(String),
    Literal(String),
}

/// A predicate clause as parsed: `(#name arg...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawClause {
    pub name: String,
    pub args: Vec<RawArg>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateArg {
    Capture(String),
    Literal(String),
}

#[derive(Debug, Clone)]
pub enum PredicateKind {
    /// Captured text equals a literal or another capture's text. A capture
    /// RHS compares against the text of its first bound node; quantified RHS
    /// captures do not compare positionally.
    Eq { other: PredicateArg },
    /// Captured text is a member of a literal string set (case-sensitive).
    AnyOf { values: Vec<String> },
    /// Captured text matches a regular expression.
    Match { regex: Regex },
    /// Unrecognized predicate; evaluates vacuously true.
    Unknown { name: String },
}

#[derive(Debug, Clone)]
pub struct PredicateClause {
    /// The capture the clause tests. Empty for unknown clauses.
    pub capture: String,
    pub negated: bool,
    pub kind: PredicateKind,
}

/// Resolve a raw clause into typed form.
///
/// Structural problems (missing capture argument, invalid regex) are
/// `QuerySyntaxError`s; an unrecognized predicate name is only a warning.
pub fn resolve_clause(
    raw: RawClause,
    pattern: usize,
) -> Result<(PredicateClause, Option<Warning>), QuerySyntaxError> {
    let trimmed = raw.name.trim_end_matches(['?', '!']);
    let (base, negated) = match trimmed.strip_prefix("not-") {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let kind_known = matches!(base, "eq" | "any-of" | "match");
    if !kind_known {
        return Ok((
            PredicateClause {
                capture: String::new(),
                negated: false,
                kind: PredicateKind::Unknown {
                    name: raw.name.clone(),
                },
            },
            Some(Warning::UnknownPredicate {
                name: raw.name,
                pattern,
            }),
        ));
    }

    let capture = match raw.args.first() {
        Some(RawArg::Capture(name)) => name.clone(),
        _ => {
            return Err(QuerySyntaxError::new(
                format!("predicate `#{}` requires a capture as first argument", raw.name),
                raw.offset,
            ));
        }
    };

    let kind = match base {
        "eq" => {
            let other = match raw.args.get(1) {
                Some(RawArg::Capture(name)) => PredicateArg::Capture(name.clone()),
                Some(RawArg::Literal(text)) => PredicateArg::Literal(text.clone()),
                None => {
                    return Err(QuerySyntaxError::new(
                        format!("predicate `#{}` requires two arguments", raw.name),
                        raw.offset,
                    ));
                }
            };
            PredicateKind::Eq { other }
        }
        "any-of" => {
            let mut values = Vec::new();
            for arg in &raw.args[1..] {
                match arg {
                    RawArg::Literal(text) => values.push(text.clone()),
                    RawArg::Capture(_) => {
                        return Err(QuerySyntaxError::new(
                            format!("predicate `#{}` takes literal arguments only", raw.name),
                            raw.offset,
                        ));
                    }
                }
            }
            if values.is_empty() {
                return Err(QuerySyntaxError::new(
                    format!("predicate `#{}` requires at least one value", raw.name),
                    raw.offset,
                ));
            }
            PredicateKind::AnyOf { values }
        }
        "match" => {
            let pattern_text = match raw.args.get(1) {
                Some(RawArg::Literal(text)) => text.clone(),
                _ => {
                    return Err(QuerySyntaxError::new(
                        format!("predicate `#{}` requires a pattern argument", raw.name),
                        raw.offset,
                    ));
                }
            };
            let regex = Regex::new(&pattern_text).map_err(|e| {
                QuerySyntaxError::new(format!("invalid regex in `#{}`: {e}", raw.name), raw.offset)
            })?;
            PredicateKind::Match { regex }
        }
        _ => unreachable!(),
    };

    Ok((
        PredicateClause {
            capture,
            negated,
            kind,
        },
        None,
    ))
}

/// Evaluate all clauses against one match. Every clause must pass.
///
/// A quantified capture must satisfy a clause for every bound node. A clause
/// over an unbound capture (an optional step that matched zero nodes) passes
/// vacuously.
pub fn accept(m: &QueryMatch, clauses: &[PredicateClause], tree: &SyntaxTree) -> bool {
    clauses.iter().all(|clause| clause_holds(m, clause, tree))
}

fn clause_holds(m: &QueryMatch, clause: &PredicateClause, tree: &SyntaxTree) -> bool {
    if matches!(clause.kind, PredicateKind::Unknown { .. }) {
        return true;
    }
    let Some(nodes) = m.nodes_for(&clause.capture) else {
        return true;
    };

    for &node in nodes {
        let text = tree.text(node);
        let base = match &clause.kind {
            PredicateKind::Eq { other } => match other {
                PredicateArg::Literal(value) => text == value,
                PredicateArg::Capture(name) => {
                    // First-bound-node semantics for the RHS capture.
                    match m.nodes_for(name).and_then(|ns| ns.first()) {
                        Some(&other_node) => text == tree.text(other_node),
                        // Unbound RHS capture: nothing to compare against.
                        None => continue,
                    }
                }
            },
            PredicateKind::AnyOf { values } => values.iter().any(|v| v == text),
            PredicateKind::Match { regex } => regex.is_match(text),
            PredicateKind::Unknown { .. } => unreachable!(),
        };
        if base == clause.negated {
            return false;
        }
    }
    true
}
