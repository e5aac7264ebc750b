//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dataroom")]
#[command(
    author,
    version,
    about = "Ask questions about the documents in your dataroom"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "DATAROOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the index from a directory
    Rebuild(RebuildArgs),

    /// Show index status
    Status,

    /// Ask a single question
    Ask(AskArgs),

    /// Interactive conversation
    Chat,

    /// Score answers against an evaluation suite
    Eval(EvalArgs),
}

#[derive(Args)]
pub struct RebuildArgs {
    /// Directory holding the dataroom documents
    pub path: PathBuf,

    /// Glob pattern relative to the directory
    #[arg(long, default_value = "**/*")]
    pub pattern: String,

    /// Include hidden files and directories
    #[arg(long)]
    pub hidden: bool,
}

#[derive(Args)]
pub struct AskArgs {
    /// Question
    pub question: Vec<String>,

    /// YAML or JSON file with earlier turns (`role`, `content`)
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Include the pipeline trace in JSON output
    #[arg(long)]
    pub trace: bool,
}

#[derive(Args)]
pub struct EvalArgs {
    /// YAML file with `cases` and optional `history`
    pub cases: PathBuf,
}

#[derive(Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Cli,
    Json,
}
