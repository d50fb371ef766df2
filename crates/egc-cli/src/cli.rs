use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "egc",
    about = "Entity graph cache: normalize responses and read them back",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a schema, and optionally an operation against it
    Check(CheckArgs),
    /// Normalize a response and print the resulting records
    Normalize(NormalizeArgs),
    /// Normalize a response, then read an operation back from the store
    Read(ReadArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    /// Schema file (TOML)
    #[arg(long)]
    pub schema: PathBuf,
    /// Operation file (JSON)
    #[arg(long)]
    pub operation: Option<PathBuf>,
}

/// Inputs shared by every command that writes a response.
#[derive(Args)]
pub struct WriteInput {
    /// Schema file (TOML)
    #[arg(long)]
    pub schema: PathBuf,
    /// Operation the response answers (JSON)
    #[arg(long)]
    pub operation: PathBuf,
    /// Response `data` tree (JSON)
    #[arg(long)]
    pub response: PathBuf,
    /// Operation variables (JSON object)
    #[arg(long)]
    pub vars: Option<PathBuf>,
    /// Cache configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub input: WriteInput,
    /// Drop records unreachable from the roots before printing
    #[arg(long)]
    pub gc: bool,
}

#[derive(Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub input: WriteInput,
    /// Query to read back (JSON); defaults to the written operation
    #[arg(long)]
    pub query: Option<PathBuf>,
    /// Variables for the read query (JSON object)
    #[arg(long)]
    pub query_vars: Option<PathBuf>,
}
