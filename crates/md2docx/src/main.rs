//! md2docx CLI - Markdown to Word exporter.
//!
//! Provides commands for:
//! - `convert`: Export a markdown file to `.docx`
//! - `render-diagram`: Render one diagram source file to SVG or PNG

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConvertArgs, RenderDiagramArgs};
use error::CliError;
use output::Output;

/// md2docx - Markdown to Word exporter.
#[derive(Parser)]
#[command(name = "md2docx", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a markdown file to a Word document.
    Convert(ConvertArgs),
    /// Render a single diagram file.
    RenderDiagram(RenderDiagramArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Convert(args) => args.verbose,
            Self::RenderDiagram(args) => args.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("Failed to create tokio runtime: {e}")))
        .and_then(|rt| {
            rt.block_on(async {
                match cli.command {
                    Commands::Convert(args) => args.execute().await,
                    Commands::RenderDiagram(args) => args.execute().await,
                }
            })
        });

    match result {
        Ok(()) => {}
        Err(CliError::Cancelled) => {
            output.warning("Cancelled");
            std::process::exit(130);
        }
        Err(err) => {
            output.error(&format!("Error: {err}"));
            std::process::exit(1);
        }
    }
}
