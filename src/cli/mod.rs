//! CLI module for aerotype
//!
//! Provides command-line interface for:
//! - check: Load every definition and print descriptors
//! - describe: Print the descriptor of one hierarchy
//! - resolve: Resolve JSON lines from stdin against a hierarchy

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, describe, resolve, run, run_command, Config, ResolveSummary};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_requests, write_error, write_line, write_response, Request};
