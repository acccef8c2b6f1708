//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resolve head entries from JSON and print the result
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Config file (default: head.toml, if it exists)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Print engine diagnostics to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand that resolves entries
#[derive(clap::Args, Debug, Clone)]
pub struct InputArgs {
    /// JSON file holding one entry object or an array of them
    pub input: PathBuf,

    /// Make canonical and social URLs absolute against this base URL
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Add og:title / og:description / twitter:card when missing
    #[arg(long)]
    pub infer_seo: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render the server HTML fragments
    Render {
        #[command(flatten)]
        args: InputArgs,

        /// Also hydrate an in-memory client document and report the writes
        #[arg(long)]
        client: bool,

        /// Print the fragments as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved tag list, one tag per line
    Tags {
        #[command(flatten)]
        args: InputArgs,
    },
}
