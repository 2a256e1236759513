use std::io::Write;

use serde::Serialize;

use crate::engine::FileAnalysis;
use crate::formatter::Formatter;
use crate::highlight::TokenSpan;
use crate::tree::SyntaxTree;

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonOutput<'a> {
    path: &'a str,
    tokens: &'a [TokenSpan],
    references: Vec<JsonReference<'a>>,
}

#[derive(Serialize)]
struct JsonReference<'a> {
    name: &'a str,
    start: usize,
    end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    definition: Option<usize>,
}

impl Formatter for JsonFormatter {
    fn format_to(
        &self,
        path: &str,
        tree: &SyntaxTree,
        analysis: &FileAnalysis,
        out: &mut dyn Write,
    ) {
        let references = analysis
            .references
            .iter()
            .map(|r| JsonReference {
                name: &r.name,
                start: r.start,
                end: tree.node(r.node).end,
                definition: r.resolved.map(|def| tree.node(def).start),
            })
            .collect();

        let output = JsonOutput {
            path,
            tokens: &analysis.tokens,
            references,
        };

        if let Ok(json) = serde_json::to_string_pretty(&output) {
            let _ = writeln!(out, "{json}");
        }
    }
}
