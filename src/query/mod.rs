//! Query compilation — lexer, parser, predicates, and the match executor.
//!
//! A query is one or more s-expression patterns with captures and predicate
//! clauses, compiled once per (grammar, query text) pair and executed against
//! any number of syntax trees.

pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod predicate;

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

pub use matcher::{QueryMatch, run_pattern};
pub use parser::{Pattern, Quantifier, Step, StepMatcher};
pub use predicate::{PredicateArg, PredicateClause, PredicateKind};

/// Malformed query text. Fatal only to the file being compiled; other query
/// files remain usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {offset}")]
pub struct QuerySyntaxError {
    pub message: String,
    pub offset: usize,
}

impl QuerySyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Non-fatal conditions detected at compile time. Surfaced to the caller,
/// never abort compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Predicate name outside the recognized set; the clause passes vacuously.
    UnknownPredicate { name: String, pattern: usize },
    /// Node kind absent from the active grammar; the pattern never matches.
    UnknownNodeKind { kind: String, pattern: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownPredicate { name, pattern } => {
                write!(f, "unknown predicate `#{name}` in pattern {pattern}")
            }
            Warning::UnknownNodeKind { kind, pattern } => {
                write!(f, "unknown node kind `{kind}` in pattern {pattern}")
            }
        }
    }
}

/// An ordered pattern list compiled from one query source text.
///
/// Pattern indices follow declaration order; that order is load-bearing for
/// classification (later patterns override earlier ones).
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub patterns: Vec<Pattern>,
    pub warnings: Vec<Warning>,
}

/// Compile query source text into an ordered pattern list.
///
/// `known_kinds`, when provided, is the active grammar's node-kind inventory;
/// kinds outside it produce an `UnknownNodeKind` warning but still compile
/// (grammar/query version skew is tolerated, the matcher just never fires).
pub fn compile(
    text: &str,
    known_kinds: Option<&HashSet<String>>,
) -> Result<CompiledQuery, QuerySyntaxError> {
    let tokens = lexer::Lexer::new(text).tokenize()?;
    let parsed = parser::Parser::new(tokens).parse_query()?;

    let mut patterns = Vec::with_capacity(parsed.len());
    let mut warnings = Vec::new();

    for (index, raw) in parsed.into_iter().enumerate() {
        let mut predicates = Vec::with_capacity(raw.predicates.len());
        for clause in raw.predicates {
            let (clause, warning) = predicate::resolve_clause(clause, index)?;
            if let Some(w) = warning {
                warnings.push(w);
            }
            predicates.push(clause);
        }

        if let Some(kinds) = known_kinds {
            collect_unknown_kinds(&raw.root, kinds, index, &mut warnings);
        }

        patterns.push(Pattern {
            index,
            root: raw.root,
            predicates,
        });
    }

    Ok(CompiledQuery { patterns, warnings })
}

/// Merge independently compiled queries into one, preserving file order.
/// Pattern indices are reassigned so the override policy spans all files;
/// warnings are rebased the same way so they keep citing the right pattern.
pub fn merge(queries: Vec<CompiledQuery>) -> CompiledQuery {
    let mut patterns = Vec::new();
    let mut warnings = Vec::new();
    for query in queries {
        let base = patterns.len();
        for mut pattern in query.patterns {
            pattern.index = patterns.len();
            patterns.push(pattern);
        }
        for warning in query.warnings {
            warnings.push(match warning {
                Warning::UnknownPredicate { name, pattern } => Warning::UnknownPredicate {
                    name,
                    pattern: pattern + base,
                },
                Warning::UnknownNodeKind { kind, pattern } => Warning::UnknownNodeKind {
                    kind,
                    pattern: pattern + base,
                },
            });
        }
    }
    CompiledQuery { patterns, warnings }
}

fn collect_unknown_kinds(
    step: &Step,
    known: &HashSet<String>,
    pattern: usize,
    warnings: &mut Vec<Warning>,
) {
    match &step.matcher {
        StepMatcher::Kind(kind) => {
            if !known.contains(kind) {
                warnings.push(Warning::UnknownNodeKind {
                    kind: kind.clone(),
                    pattern,
                });
            }
        }
        StepMatcher::Alternation(alts) => {
            for alt in alts {
                collect_unknown_kinds(alt, known, pattern, warnings);
            }
        }
        StepMatcher::Literal(_) | StepMatcher::Wildcard => {}
    }
    for child in &step.children {
        collect_unknown_kinds(child, known, pattern, warnings);
    }
}
