use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "treelight", version, about = "A grammar-agnostic syntax classification engine")]
pub struct Args {
    /// Tree documents to analyze (JSON, one parsed file each)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Highlight query file(s), applied in order (later files override earlier)
    #[arg(short, long, value_name = "FILE", required = true)]
    pub query: Vec<PathBuf>,

    /// Locals query file for lexical scope resolution
    #[arg(long, value_name = "FILE")]
    pub locals: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}
