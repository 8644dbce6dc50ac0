//! Developer commands for working on agentflow itself.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use agentflow::config;
use agentflow::devtools;
use agentflow::logging::{init_logging, LogConfig};

/// Developer tools for the agentflow repository.
#[derive(Parser, Debug)]
#[command(name = "agentflow-dev")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Write all_code.md and all_docs.md for loading into an AI assistant.
    GenerateAiFiles {
        /// Directory the files are written to.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Serve the documentation with `mdbook serve`.
    Docs,
}

fn repo_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

fn main() {
    init_logging(LogConfig::from(config::settings()));

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::GenerateAiFiles { output } => {
            println!("Repo root: {}", repo_root().display());
            devtools::generate_ai_files(repo_root(), &output).map(|generated| {
                println!(
                    "Generated {} and {}",
                    generated.code.display(),
                    generated.docs.display()
                );
            })
        }
        Commands::Docs => devtools::serve_docs(repo_root()),
    };

    if let Err(e) = result {
        eprintln!("An error occurred: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_defaults_to_current_dir() {
        let cli = Cli::try_parse_from(["agentflow-dev", "generate-ai-files"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::GenerateAiFiles {
                output: PathBuf::from(".")
            }
        );
    }

    #[test]
    fn test_output_flag() {
        let short = Cli::try_parse_from(["agentflow-dev", "generate-ai-files", "-o", "out"]).unwrap();
        let long = Cli::try_parse_from(["agentflow-dev", "generate-ai-files", "--output", "out"]).unwrap();
        let expected = Commands::GenerateAiFiles {
            output: PathBuf::from("out"),
        };
        assert_eq!(short.command, expected);
        assert_eq!(long.command, expected);
    }

    #[test]
    fn test_docs_and_unknown_commands() {
        let cli = Cli::try_parse_from(["agentflow-dev", "docs"]).unwrap();
        assert_eq!(cli.command, Commands::Docs);

        assert!(Cli::try_parse_from(["agentflow-dev", "deploy"]).is_err());
        assert!(Cli::try_parse_from(["agentflow-dev"]).is_err());
    }
}
