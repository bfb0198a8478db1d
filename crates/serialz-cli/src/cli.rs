use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "serialz",
    about = "Save, load and delete typed records on disk",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage root; overrides the configured root
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub backend: Backend,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum Backend {
    /// One JSON document per record
    Text,
    /// One object stream per record
    Binary,
    /// One entry per record in a per-type store file
    Kv,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set fields on a record and save it
    Put(PutArgs),
    /// Show a record's fields
    Get(GetArgs),
    /// Delete a stored record
    ///
    /// With the text and binary backends a record that was never saved is
    /// first created by the normal open and then removed, so the command
    /// succeeds either way. The kv backend has no entry to remove and does
    /// nothing.
    Delete(DeleteArgs),
}

#[derive(Args)]
pub struct PutArgs {
    /// Record type, e.g. Score
    pub type_tag: String,
    pub id: String,
    /// Fields as NAME=VALUE. VALUE is read as JSON, as hex bytes when
    /// prefixed with `hex:`, and as a plain string otherwise.
    pub fields: Vec<String>,
    /// Discard what is stored before applying the fields
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args)]
pub struct GetArgs {
    pub type_tag: String,
    pub id: String,
    /// Show a single field
    #[arg(long)]
    pub field: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub type_tag: String,
    pub id: String,
}
