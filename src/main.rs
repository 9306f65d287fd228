use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rust_csdl::{convert_paths, BatchOptions, ConvertOptions};

#[derive(Parser)]
#[command(name = "rust-csdl")]
#[command(author, version, about = "Convert OData CSDL XML metadata to CSDL JSON")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert metadata documents (V2, V3 or V4 CSDL XML) to CSDL JSON
    Convert {
        /// Input files, directories or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output directory (defaults to next to each input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Reject unexpected attributes, missing mandatory children and invalid names
        #[arg(long)]
        strict: bool,

        /// Add @parser.line to every node
        #[arg(long)]
        line_numbers: bool,

        /// Keep attributes in foreign namespaces as annotations
        #[arg(long)]
        foreign_annotations: bool,

        /// Write compact instead of pretty-printed JSON
        #[arg(long)]
        compact: bool,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            inputs,
            output,
            strict,
            line_numbers,
            foreign_annotations,
            compact,
            verbose,
        } => {
            let default_level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(default_level)),
                )
                .with_writer(std::io::stderr)
                .init();

            let batch = BatchOptions {
                inputs,
                output_dir: output,
                pretty: !compact,
                verbose,
            };
            let convert = ConvertOptions {
                include_line_numbers: line_numbers,
                include_foreign_markup_as_annotations: foreign_annotations,
                strict,
            };

            convert_paths(&batch, &convert)?;
        }
    }

    Ok(())
}
