//! rbsource CLI — print Ruby definitions from `FILE:LINE` locations.
//!
//! Calls `rbsource-core` directly.

use clap::{CommandFactory, Parser, Subcommand};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use rbsource_core::types::{Extraction, SourceLocator};
use rbsource_core::{load_config, load_config_file, ExtractConfig, Extractor};
use tracing::debug;

/// rbsource — recover the source of a Ruby method, block or accessor.
#[derive(Parser)]
#[command(name = "rbsource", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    /// Syntax oracle: balance, ruby or tree-sitter
    #[arg(long, global = true)]
    oracle: Option<String>,

    /// Config file (default: .rbsource.toml in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ruby interpreter used by the `ruby` oracle
    #[arg(long, global = true)]
    ruby: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the source of the definition at FILE:LINE
    Source {
        /// Location as FILE:LINE (1-indexed)
        location: String,
    },
    /// Print the comment block directly above FILE:LINE
    Comment {
        /// Location as FILE:LINE (1-indexed)
        location: String,
    },
    /// Print the leading comment followed by the source
    Show {
        /// Location as FILE:LINE (1-indexed)
        location: String,
    },
    /// Extract every FILE:LINE listed in a file (one per line, `-` for stdin)
    Batch {
        /// List file; blank lines and lines starting with `#` are ignored
        list: PathBuf,
    },
    /// Run the configured oracle on a whole file and print its diagnostics
    Check {
        /// Ruby file to check
        file: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(format!("Could not encode JSON: {e}")),
    }
}

fn parse_location(location: &str) -> SourceLocator {
    SourceLocator::parse(location)
        .unwrap_or_else(|| fail(format!("Expected FILE:LINE, got '{location}'")))
}

/// Config file (explicit or discovered) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> ExtractConfig {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path).unwrap_or_else(|e| fail(e)),
        None => match std::env::current_dir() {
            Ok(cwd) => load_config(&cwd),
            Err(_) => ExtractConfig::default(),
        },
    };
    if let Some(oracle) = &cli.oracle {
        config.oracle = oracle.clone();
    }
    if let Some(ruby) = &cli.ruby {
        config.ruby = ruby.clone();
    }
    config
}

fn read_list(list: &Path) -> Vec<String> {
    let reader: Box<dyn BufRead> = if list == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        match std::fs::File::open(list) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => fail(format!("Could not read {}: {e}", list.display())),
        }
    };
    reader
        .lines()
        .map_while(|line| line.ok())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rbsource=warn".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "rbsource", &mut io::stdout());
        return;
    }

    let config = resolve_config(&cli);
    let extractor = Extractor::new(config).unwrap_or_else(|e| fail(e));
    debug!(oracle = extractor.oracle_name(), "Extractor ready");

    match &cli.command {
        Commands::Source { location } => {
            let locator = parse_location(location);
            let source = extractor.source(&locator).unwrap_or_else(|e| fail(e));
            if cli.json {
                print_json(&serde_json::json!({
                    "name": locator.name,
                    "file": locator.file_path,
                    "line": locator.start_line,
                    "source": source,
                }));
            } else {
                print!("{source}");
            }
        }
        Commands::Comment { location } => {
            let locator = parse_location(location);
            let comment = extractor.comment(&locator).unwrap_or_else(|e| fail(e));
            if cli.json {
                print_json(&serde_json::json!({
                    "name": locator.name,
                    "file": locator.file_path,
                    "line": locator.start_line,
                    "comment": comment,
                }));
            } else {
                print!("{comment}");
            }
        }
        Commands::Show { location } => {
            let locator = parse_location(location);
            let record: Extraction = extractor.extract(&locator).unwrap_or_else(|e| fail(e));
            if cli.json {
                print_json(&record);
            } else {
                print!("{}{}", record.comment, record.source);
            }
        }
        Commands::Batch { list } => {
            let locators: Vec<SourceLocator> =
                read_list(list).iter().map(|entry| parse_location(entry)).collect();
            let results = extractor.source_many(&locators);
            let failures = results.iter().filter(|r| r.is_err()).count();

            if cli.json {
                let items: Vec<serde_json::Value> = locators
                    .iter()
                    .zip(&results)
                    .map(|(locator, result)| match result {
                        Ok(source) => serde_json::json!({
                            "name": locator.name,
                            "file": locator.file_path,
                            "line": locator.start_line,
                            "source": source,
                        }),
                        Err(e) => serde_json::json!({
                            "name": locator.name,
                            "file": locator.file_path,
                            "line": locator.start_line,
                            "error": e.to_string(),
                        }),
                    })
                    .collect();
                print_json(&items);
            } else {
                for (locator, result) in locators.iter().zip(&results) {
                    match result {
                        Ok(source) => print!("==> {} <==\n{source}\n", locator.name),
                        Err(e) => eprintln!("{e}"),
                    }
                }
                eprintln!("{} extracted, {failures} failed", results.len() - failures);
            }

            if failures > 0 {
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let text = std::fs::read_to_string(file)
                .unwrap_or_else(|e| fail(format!("Could not read {}: {e}", file.display())));
            let mut diagnostics = Vec::new();
            let valid = extractor.check(&text, &mut diagnostics).unwrap_or_else(|e| fail(e));
            let diagnostics = String::from_utf8_lossy(&diagnostics);

            if cli.json {
                print_json(&serde_json::json!({
                    "file": file,
                    "oracle": extractor.oracle_name(),
                    "valid": valid,
                    "diagnostics": diagnostics,
                }));
            } else {
                eprint!("{diagnostics}");
                if valid {
                    println!("Syntax OK");
                }
            }

            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Completions { .. } => {}
    }
}
