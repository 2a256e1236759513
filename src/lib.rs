pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod formatter;
pub mod highlight;
pub mod locals;
pub mod query;
pub mod tree;

#[cfg(test)]
pub mod testutil;

use std::path::Path;

use anyhow::{Context, Result};

use cache::QueryCache;
use cli::Args;
use config::load_config;
use formatter::create_formatter;
use query::CompiledQuery;
use tree::SyntaxTree;

/// Run the engine over the given tree documents.
/// Returns the exit code: 0 = clean, 1 = some files could not be analyzed.
pub fn run(args: Args) -> Result<i32> {
    let config = load_config(args.config.as_deref())?;

    let highlight_sources = read_query_files(&args.query)?;
    let locals_source = match &args.locals {
        Some(path) => Some(read_query_file(path)?),
        None => None,
    };

    if args.debug {
        eprintln!("debug: {} query files loaded", highlight_sources.len());
        eprintln!("debug: {} tree documents to analyze", args.paths.len());
    }

    let cache = QueryCache::new();
    let formatter = create_formatter(&args.format);
    let mut failed = 0usize;

    for path in &args.paths {
        let display = path.display().to_string();
        let tree = match load_tree(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("error: {display}: {e:#}");
                failed += 1;
                continue;
            }
        };

        let known_kinds = config.known_kinds_for(tree.grammar());
        let highlight = compile_query_set(
            &highlight_sources,
            tree.grammar(),
            &cache,
            known_kinds.as_ref(),
        );
        let Some(highlight) = highlight else {
            eprintln!("error: {display}: no usable highlight queries");
            failed += 1;
            continue;
        };

        let locals = match &locals_source {
            Some((locals_path, text)) => {
                match cache.get_or_compile(tree.grammar(), text, known_kinds.as_ref()) {
                    Ok(compiled) => {
                        for warning in &compiled.warnings {
                            eprintln!("warning: {locals_path}: {warning}");
                        }
                        Some(compiled)
                    }
                    Err(e) => {
                        eprintln!("error: {locals_path}: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        if args.debug {
            eprintln!(
                "debug: {display}: {} nodes, {} highlight patterns",
                tree.len(),
                highlight.patterns.len()
            );
        }

        // No cancellation token in the CLI path; batch runs go to completion.
        let analysis = engine::analyze(
            &tree,
            &highlight,
            locals.as_deref(),
            config.mappings(),
            None,
        );
        if let Some(analysis) = analysis {
            formatter.print(&display, &tree, &analysis);
        }
    }

    if failed == 0 { Ok(0) } else { Ok(1) }
}

fn load_tree(path: &Path) -> Result<SyntaxTree> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tree document {}", path.display()))?;
    SyntaxTree::from_json(&json)
}

fn read_query_file(path: &Path) -> Result<(String, String)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read query file {}", path.display()))?;
    Ok((path.display().to_string(), text))
}

fn read_query_files(paths: &[std::path::PathBuf]) -> Result<Vec<(String, String)>> {
    paths.iter().map(|p| read_query_file(p)).collect()
}

/// Compile each query file and merge the survivors in file order.
///
/// A file that fails to compile is reported and skipped; the remaining files
/// still produce a usable query. Warnings are attributed to the query file
/// that produced them. Returns `None` when nothing compiled.
fn compile_query_set(
    sources: &[(String, String)],
    grammar: &str,
    cache: &QueryCache,
    known_kinds: Option<&std::collections::HashSet<String>>,
) -> Option<CompiledQuery> {
    let mut compiled = Vec::new();
    for (path, text) in sources {
        match cache.get_or_compile(grammar, text, known_kinds) {
            Ok(query) => {
                for warning in &query.warnings {
                    eprintln!("warning: {path}: {warning}");
                }
                compiled.push(query);
            }
            Err(e) => eprintln!("error: {path}: {e}"),
        }
    }
    if compiled.is_empty() {
        return None;
    }
    // Clone out of the cache so `merge` can reindex patterns without
    // disturbing the cached entries.
    Some(query::merge(
        compiled.iter().map(|q| CompiledQuery::clone(q)).collect(),
    ))
}
