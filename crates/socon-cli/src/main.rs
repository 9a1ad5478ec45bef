//! The `socon` command-line utility.

use colored::Colorize;
use socon_core::Catalog;

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    match socon_cli::execute_from_command_line(argv, Catalog::new()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}
