use std::process;

use clap::Parser;

use treelight::cli::Args;

fn main() {
    let args = Args::parse();
    match treelight::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    }
}
