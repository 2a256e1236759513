//! Per-file analysis pipeline: run compiled queries against a syntax tree,
//! filter matches through predicates, then classify tokens and resolve
//! lexical references.
//!
//! Patterns execute in parallel shards over rayon, but results are merged in
//! pattern declaration order so the classification override policy never
//! depends on scheduling. Cancellation is checked between shards; a cancelled
//! analysis yields nothing rather than a partial token stream.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::config::CaptureMappings;
use crate::highlight::{self, TokenSpan};
use crate::locals::{self, Reference, ScopeTree};
use crate::query::{CompiledQuery, QueryMatch, predicate, run_pattern};
use crate::tree::SyntaxTree;

/// Complete analysis output for one file.
#[derive(Debug)]
pub struct FileAnalysis {
    /// Ordered, non-overlapping classified tokens.
    pub tokens: Vec<TokenSpan>,
    pub scopes: ScopeTree,
    pub references: Vec<Reference>,
}

/// Analyze one tree. Returns `None` only when `cancel` fired mid-run.
pub fn analyze(
    tree: &SyntaxTree,
    highlight_query: &CompiledQuery,
    locals_query: Option<&CompiledQuery>,
    mappings: Option<&CaptureMappings>,
    cancel: Option<&AtomicBool>,
) -> Option<FileAnalysis> {
    let highlight_matches = collect_matches(tree, highlight_query, cancel)?;
    let categories = highlight::assign(&highlight_matches, mappings);
    let tokens = highlight::spans(tree, &categories);

    let (scopes, references) = match locals_query {
        Some(query) => {
            let matches = collect_matches(tree, query, cancel)?;
            locals::build(tree, &matches)
        }
        None => locals::build(tree, &[]),
    };

    Some(FileAnalysis {
        tokens,
        scopes,
        references,
    })
}

/// Run every pattern and keep only matches that pass their predicate clauses.
///
/// Shards are collected per pattern and flattened afterwards, preserving
/// declaration order regardless of which shard finishes first. Any shard
/// observing the cancel flag poisons the whole collection.
pub fn collect_matches(
    tree: &SyntaxTree,
    query: &CompiledQuery,
    cancel: Option<&AtomicBool>,
) -> Option<Vec<QueryMatch>> {
    let sharded: Option<Vec<Vec<QueryMatch>>> = query
        .patterns
        .par_iter()
        .map(|pattern| {
            if cancelled(cancel) {
                return None;
            }
            let matches = run_pattern(tree, pattern)
                .into_iter()
                .filter(|m| predicate::accept(m, &pattern.predicates, tree))
                .collect();
            Some(matches)
        })
        .collect();

    if cancelled(cancel) {
        return None;
    }
    sharded.map(|shards| shards.into_iter().flatten().collect())
}

fn cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}
