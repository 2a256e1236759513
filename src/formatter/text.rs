use std::io::Write;

use crate::engine::FileAnalysis;
use crate::formatter::Formatter;
use crate::tree::SyntaxTree;

/// Line-oriented output for terminals: one token per line with 1-based
/// line:column coordinates, then resolved and unresolved references.
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_to(
        &self,
        path: &str,
        tree: &SyntaxTree,
        analysis: &FileAnalysis,
        out: &mut dyn Write,
    ) {
        // Columns are 1-based in human-facing output.
        for token in &analysis.tokens {
            let (line, col) = tree.offset_to_line_col(token.start);
            let text = tree
                .source()
                .get(token.start..token.end)
                .unwrap_or_default();
            let _ = writeln!(out, "{path}:{line}:{}: {} `{text}`", col + 1, token.category);
        }

        for reference in &analysis.references {
            let (line, col) = tree.offset_to_line_col(reference.start);
            match reference.resolved {
                Some(def) => {
                    let (def_line, def_col) = tree.offset_to_line_col(tree.node(def).start);
                    let _ = writeln!(
                        out,
                        "{path}:{line}:{}: `{}` defined at {def_line}:{}",
                        col + 1,
                        reference.name,
                        def_col + 1,
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "{path}:{line}:{}: `{}` unresolved",
                        col + 1,
                        reference.name
                    );
                }
            }
        }

        let token_word = if analysis.tokens.len() == 1 {
            "token"
        } else {
            "tokens"
        };
        let _ = writeln!(
            out,
            "\n{} {token_word}, {} scopes, {} references",
            analysis.tokens.len(),
            analysis.scopes.len(),
            analysis.references.len(),
        );
    }
}
