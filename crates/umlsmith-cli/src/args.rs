//! Command-line argument definitions for the umlsmith CLI.
//!
//! [`Args`] holds the global options shared by every subcommand; the
//! [`Command`] variants map one-to-one onto the pipeline entry points.

use std::{convert::Infallible, path::PathBuf};

use clap::{Parser, Subcommand};

use umlsmith::{generate::Credential, kind::DiagramKind};

/// Command-line arguments for the umlsmith diagram generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Credential for the text-generation service
    #[arg(
        long,
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        global = true,
        value_parser = parse_credential
    )]
    pub api_key: Option<Credential>,
}

/// Pipeline operation to run.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Normalize an input file into records and print them as JSON
    Normalize(NormalizeArgs),

    /// Generate, render and validate a diagram from an input file
    Generate(GenerateArgs),

    /// Apply an instruction to existing diagram source and re-render it
    Refine(RefineArgs),
}

#[derive(clap::Args, Debug)]
pub struct NormalizeArgs {
    /// Path to the input file (.csv, .json, .yaml, .yml or free text)
    pub input: PathBuf,

    /// Diagram kind the records are meant for (sequence, architecture)
    #[arg(short, long, default_value = "sequence")]
    pub kind: DiagramKind,

    /// Write the records JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Path to the input file, or to a records JSON file with --records
    pub input: PathBuf,

    /// Diagram kind to generate (sequence, architecture)
    #[arg(short, long, default_value = "sequence")]
    pub kind: DiagramKind,

    /// Treat the input as an already-normalized records JSON array
    #[arg(long)]
    pub records: bool,

    /// Ask the model to add inferred relations before generating
    #[arg(long)]
    pub enrich: bool,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Write the result envelope JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RefineArgs {
    /// Path to the PlantUML source to refine
    pub source: PathBuf,

    /// Instruction describing the change
    #[arg(short, long)]
    pub message: String,

    /// Diagram kind of the source (sequence, architecture)
    #[arg(short, long, default_value = "sequence")]
    pub kind: DiagramKind,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Write the result envelope JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Where rendered artifacts are written.
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Directory receiving the diagram source and image
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Filename base for the artifacts (defaults to the kind's stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Append a random suffix to the filename base
    #[arg(long)]
    pub unique: bool,
}

fn parse_credential(value: &str) -> Result<Credential, Infallible> {
    Ok(Credential::new(value))
}
