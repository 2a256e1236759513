//! Integration tests for the treelight analysis pipeline.
//!
//! These tests exercise the public API end to end: tree documents come in as
//! JSON, queries are compiled from text, and the engine produces classified
//! tokens and resolved references.

use std::sync::atomic::AtomicBool;

use treelight::cache::QueryCache;
use treelight::engine::{analyze, collect_matches};
use treelight::query::{Warning, compile, merge};
use treelight::tree::SyntaxTree;

/// fn foo() { print(foo) }
///
/// A small function tree with one definition and one call.
fn function_doc() -> SyntaxTree {
    SyntaxTree::from_json(
        r#"{
        "grammar": "rust",
        "source": "fn foo() { print(foo) }",
        "root": {
            "kind": "source_file", "start": 0, "end": 23,
            "children": [
                {"kind": "function_item", "start": 0, "end": 23, "children": [
                    {"kind": "fn", "start": 0, "end": 2},
                    {"kind": "identifier", "field": "name", "start": 3, "end": 6},
                    {"kind": "parameters", "start": 6, "end": 8},
                    {"kind": "block", "field": "body", "start": 9, "end": 23, "children": [
                        {"kind": "call_expression", "start": 11, "end": 21, "children": [
                            {"kind": "identifier", "field": "function", "start": 11, "end": 16},
                            {"kind": "arguments", "start": 16, "end": 21, "children": [
                                {"kind": "identifier", "start": 17, "end": 20}
                            ]}
                        ]}
                    ]}
                ]}
            ]
        }
    }"#,
    )
    .unwrap()
}

/// MAX_SIZE and max_size side by side.
fn constants_doc() -> SyntaxTree {
    SyntaxTree::from_json(
        r#"{
        "grammar": "rust",
        "source": "MAX_SIZE max_size",
        "root": {
            "kind": "source_file", "start": 0, "end": 17,
            "children": [
                {"kind": "identifier", "start": 0, "end": 8},
                {"kind": "identifier", "start": 9, "end": 17}
            ]
        }
    }"#,
    )
    .unwrap()
}

fn categories_at(analysis: &treelight::engine::FileAnalysis) -> Vec<(usize, &str)> {
    analysis
        .tokens
        .iter()
        .map(|t| (t.start, t.category.as_str()))
        .collect()
}

#[test]
fn named_function_gets_function_category() {
    let tree = function_doc();
    let query = compile(
        "(identifier) @variable\n\
         (function_item name: (identifier) @function)",
        None,
    )
    .unwrap();

    let analysis = analyze(&tree, &query, None, None, None).unwrap();
    let cats = categories_at(&analysis);
    // `foo` at 3 is a function; the identifiers inside the body stay variables.
    assert!(cats.contains(&(3, "function")));
    assert!(cats.contains(&(11, "variable")));
    assert!(cats.contains(&(17, "variable")));
}

#[test]
fn screaming_case_overrides_base_category() {
    let tree = constants_doc();
    let query = compile(
        r#"(identifier) @variable
           ((identifier) @constant (#match? @constant "^[A-Z][A-Z_0-9]*$"))"#,
        None,
    )
    .unwrap();

    let analysis = analyze(&tree, &query, None, None, None).unwrap();
    assert_eq!(
        categories_at(&analysis),
        vec![(0, "constant"), (9, "variable")]
    );
}

#[test]
fn any_of_narrows_then_base_applies_elsewhere() {
    let tree = SyntaxTree::from_json(
        r#"{
        "grammar": "rust",
        "source": "print assert custom",
        "root": {
            "kind": "source_file", "start": 0, "end": 19,
            "children": [
                {"kind": "identifier", "start": 0, "end": 5},
                {"kind": "identifier", "start": 6, "end": 12},
                {"kind": "identifier", "start": 13, "end": 19}
            ]
        }
    }"#,
    )
    .unwrap();
    let query = compile(
        r#"(identifier) @variable
           ((identifier) @function.builtin (#any-of? @function.builtin "print" "assert"))"#,
        None,
    )
    .unwrap();

    let analysis = analyze(&tree, &query, None, None, None).unwrap();
    assert_eq!(
        categories_at(&analysis),
        vec![
            (0, "function.builtin"),
            (6, "function.builtin"),
            (13, "variable")
        ]
    );
}

#[test]
fn query_files_merge_with_later_files_overriding() {
    let tree = constants_doc();
    let base = compile("(identifier) @variable", None).unwrap();
    let overrides = compile(
        r#"((identifier) @constant (#match? @constant "^[A-Z]"))"#,
        None,
    )
    .unwrap();
    let query = merge(vec![base, overrides]);

    let analysis = analyze(&tree, &query, None, None, None).unwrap();
    assert_eq!(
        categories_at(&analysis),
        vec![(0, "constant"), (9, "variable")]
    );
}

#[test]
fn shadowed_variable_resolves_to_inner_definition() {
    // let x = 1; { let x = 2; print(x) }
    let tree = SyntaxTree::from_json(
        r#"{
        "grammar": "rust",
        "source": "let x = 1; { let x = 2; print(x) }",
        "root": {
            "kind": "source_file", "start": 0, "end": 34,
            "children": [
                {"kind": "let_declaration", "start": 0, "end": 10, "children": [
                    {"kind": "identifier", "field": "pattern", "start": 4, "end": 5}
                ]},
                {"kind": "block", "start": 11, "end": 34, "children": [
                    {"kind": "let_declaration", "start": 13, "end": 23, "children": [
                        {"kind": "identifier", "field": "pattern", "start": 17, "end": 18}
                    ]},
                    {"kind": "call_expression", "start": 24, "end": 32, "children": [
                        {"kind": "identifier", "field": "function", "start": 24, "end": 29},
                        {"kind": "arguments", "start": 29, "end": 32, "children": [
                            {"kind": "identifier", "start": 30, "end": 31}
                        ]}
                    ]}
                ]}
            ]
        }
    }"#,
    )
    .unwrap();
    let highlight = compile("(identifier) @variable", None).unwrap();
    let locals = compile(
        "(block) @local.scope\n\
         (let_declaration pattern: (identifier) @local.definition.var)\n\
         (arguments (identifier) @local.reference)",
        None,
    )
    .unwrap();

    let analysis = analyze(&tree, &highlight, Some(&locals), None, None).unwrap();
    assert_eq!(analysis.references.len(), 1);
    let reference = &analysis.references[0];
    assert_eq!(reference.name, "x");
    let def = reference.resolved.expect("x must resolve");
    // The inner definition at byte 17 shadows the outer one at byte 4.
    assert_eq!(tree.node(def).start, 17);
}

#[test]
fn quantified_pattern_matches_any_arity() {
    let tree = SyntaxTree::from_json(
        r#"{
        "grammar": "rust",
        "source": "[] [a] [a, b, c]",
        "root": {
            "kind": "source_file", "start": 0, "end": 16,
            "children": [
                {"kind": "array", "start": 0, "end": 2},
                {"kind": "array", "start": 3, "end": 6, "children": [
                    {"kind": "identifier", "start": 4, "end": 5}
                ]},
                {"kind": "array", "start": 7, "end": 16, "children": [
                    {"kind": "identifier", "start": 8, "end": 9},
                    {"kind": "identifier", "start": 11, "end": 12},
                    {"kind": "identifier", "start": 14, "end": 15}
                ]}
            ]
        }
    }"#,
    )
    .unwrap();
    let query = compile("(array (identifier)* @element) @array", None).unwrap();
    let matches = collect_matches(&tree, &query, None).unwrap();
    // One match per array node, regardless of element count.
    assert_eq!(matches.len(), 3);

    let element_counts: Vec<usize> = matches
        .iter()
        .map(|m| m.nodes_for("element").map_or(0, |ns| ns.len()))
        .collect();
    assert_eq!(element_counts, vec![0, 1, 3]);
}

#[test]
fn warnings_surface_through_compilation() {
    let known = ["identifier".to_string(), "source_file".to_string()]
        .into_iter()
        .collect();
    let query = compile(
        "((no_such_kind) @x (#frobnicate? @x))\n(identifier) @variable",
        Some(&known),
    )
    .unwrap();
    assert_eq!(query.warnings.len(), 2);
    assert!(matches!(
        query.warnings[0],
        Warning::UnknownPredicate { .. } | Warning::UnknownNodeKind { .. }
    ));

    // The unknown kind pattern never fires; the rest of the query still works.
    let tree = constants_doc();
    let analysis = analyze(&tree, &query, None, None, None).unwrap();
    assert_eq!(analysis.tokens.len(), 2);
}

#[test]
fn analysis_is_deterministic_across_runs() {
    let tree = function_doc();
    let query = compile(
        r#"(identifier) @variable
           (function_item name: (identifier) @function)
           ((identifier) @constant (#match? @constant "^[A-Z]"))"#,
        None,
    )
    .unwrap();

    let first = analyze(&tree, &query, None, None, None).unwrap();
    for _ in 0..10 {
        let next = analyze(&tree, &query, None, None, None).unwrap();
        assert_eq!(first.tokens, next.tokens);
    }
}

#[test]
fn cancellation_discards_whole_file() {
    let tree = function_doc();
    let query = compile("(identifier) @variable", None).unwrap();
    let cancel = AtomicBool::new(true);
    assert!(analyze(&tree, &query, None, None, Some(&cancel)).is_none());
}

#[test]
fn cache_reuses_compiled_queries_across_files() {
    let cache = QueryCache::new();
    let text = "(identifier) @variable";
    let first = cache.get_or_compile("rust", text, None).unwrap();
    let second = cache.get_or_compile("rust", text, None).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    // Both tree documents analyze fine with the shared compilation.
    for tree in [function_doc(), constants_doc()] {
        let analysis = analyze(&tree, &first, None, None, None).unwrap();
        assert!(!analysis.tokens.is_empty());
    }
}

#[test]
fn capture_mappings_rename_output_categories() {
    let tree = constants_doc();
    let query = compile("(identifier) @variable.builtin", None).unwrap();
    let mut mappings = treelight::config::CaptureMappings::new();
    mappings.insert("variable.builtin".to_string(), "variable".to_string());

    let analysis = analyze(&tree, &query, None, Some(&mappings), None).unwrap();
    assert!(analysis.tokens.iter().all(|t| t.category == "variable"));
}

#[test]
fn run_reports_partial_failure_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("ok.json");
    std::fs::write(
        &tree_path,
        r#"{"grammar": "test", "source": "x", "root": {"kind": "identifier", "start": 0, "end": 1}}"#,
    )
    .unwrap();
    let query_path = dir.path().join("highlights.scm");
    std::fs::write(&query_path, "(identifier) @variable\n").unwrap();

    let ok_args = |paths: Vec<std::path::PathBuf>| treelight::cli::Args {
        paths,
        query: vec![query_path.clone()],
        locals: None,
        config: None,
        format: "json".to_string(),
        debug: false,
    };

    // All inputs load: exit 0.
    assert_eq!(treelight::run(ok_args(vec![tree_path.clone()])).unwrap(), 0);

    // One input missing: the good one is still analyzed, exit 1.
    let missing = dir.path().join("missing.json");
    assert_eq!(treelight::run(ok_args(vec![tree_path, missing])).unwrap(), 1);
}

#[test]
fn run_fails_hard_on_unreadable_query_file() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("ok.json");
    std::fs::write(
        &tree_path,
        r#"{"grammar": "test", "source": "x", "root": {"kind": "identifier", "start": 0, "end": 1}}"#,
    )
    .unwrap();

    let args = treelight::cli::Args {
        paths: vec![tree_path],
        query: vec![dir.path().join("no_such.scm")],
        locals: None,
        config: None,
        format: "text".to_string(),
        debug: false,
    };
    let err = treelight::run(args).unwrap_err();
    assert!(format!("{err:#}").contains("failed to read query file"));
}

#[test]
fn syntax_error_reports_offset() {
    let err = compile("(identifier @x", None).unwrap_err();
    assert!(err.offset <= "(identifier @x".len());
    let message = format!("{err}");
    assert!(message.contains("at byte"));
}

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// Flat document: the given words as identifier leaves, space-separated.
    fn flat_doc(words: &[String]) -> SyntaxTree {
        let mut children = Vec::new();
        let mut offset = 0usize;
        for word in words {
            children.push(serde_json::json!({
                "kind": "identifier", "start": offset, "end": offset + word.len()
            }));
            offset += word.len() + 1;
        }
        let source = words.join(" ");
        let doc = serde_json::json!({
            "grammar": "test",
            "source": source,
            "root": {"kind": "source_file", "start": 0, "end": source.len(), "children": children}
        });
        SyntaxTree::from_json(&doc.to_string()).unwrap()
    }

    proptest! {
        #[test]
        fn tokens_are_sorted_and_disjoint(
            words in prop::collection::vec("[a-zA-Z_][a-zA-Z_0-9]{0,8}", 1..20),
        ) {
            let tree = flat_doc(&words);
            let query = compile(
                r#"(identifier) @variable
                   ((identifier) @constant (#match? @constant "^[A-Z][A-Z_0-9]*$"))"#,
                None,
            )
            .unwrap();
            let analysis = analyze(&tree, &query, None, None, None).unwrap();

            prop_assert_eq!(analysis.tokens.len(), words.len());
            let mut last_end = 0usize;
            for token in &analysis.tokens {
                prop_assert!(token.start >= last_end);
                prop_assert!(token.start < token.end);
                last_end = token.end;
            }
        }

        #[test]
        fn classification_is_idempotent(
            words in prop::collection::vec("[a-zA-Z_][a-zA-Z_0-9]{0,8}", 1..12),
        ) {
            let tree = flat_doc(&words);
            let query = compile(
                r#"(identifier) @variable
                   ((identifier) @constant (#match? @constant "^[A-Z]"))"#,
                None,
            )
            .unwrap();
            let first = analyze(&tree, &query, None, None, None).unwrap();
            let second = analyze(&tree, &query, None, None, None).unwrap();
            prop_assert_eq!(first.tokens, second.tokens);
        }
    }
}
