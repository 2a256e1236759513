pub mod json;
pub mod text;

use std::io::Write;

use crate::engine::FileAnalysis;
use crate::tree::SyntaxTree;

pub trait Formatter {
    fn format_to(&self, path: &str, tree: &SyntaxTree, analysis: &FileAnalysis, out: &mut dyn Write);

    fn print(&self, path: &str, tree: &SyntaxTree, analysis: &FileAnalysis) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.format_to(path, tree, analysis, &mut lock);
    }
}

pub fn create_formatter(format: &str) -> Box<dyn Formatter> {
    match format {
        "json" => Box::new(json::JsonFormatter),
        // "text" and any unknown value
        _ => Box::new(text::TextFormatter),
    }
}
