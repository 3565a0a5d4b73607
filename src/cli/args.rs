//! CLI argument definitions using clap
//!
//! Commands:
//! - aerotype --config <path> check
//! - aerotype --config <path> describe <root>
//! - aerotype --config <path> resolve [--root <name>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerotype - resolve structured values against variant hierarchies
#[derive(Parser, Debug)]
#[command(name = "aerotype")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./aerotype.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load every definition and print one descriptor per hierarchy
    Check,

    /// Print the descriptor of one hierarchy
    Describe {
        /// Root node name
        root: String,
    },

    /// Resolve one JSON value per stdin line
    Resolve {
        /// Root node name (defaults to `root` from the configuration)
        #[arg(long)]
        root: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
