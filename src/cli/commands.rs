//! CLI command implementations
//!
//! Every command starts the same way:
//! 1. Configuration load (sets the log level)
//! 2. Definition load from `schema_dir`
//!
//! Definition load failures are fatal. Per-input resolution failures are
//! written as error responses and processing continues.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::schema::{HierarchyLoader, LoadedHierarchy};

use super::args::Command;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{read_requests, write_error, write_line, write_response};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory of definition files (required)
    pub schema_dir: String,

    /// Default root for `resolve` (optional)
    #[serde(default)]
    pub root: Option<String>,

    /// Minimum log level (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.schema_dir.trim().is_empty() {
            return Err(CliError::config_error("schema_dir must not be empty"));
        }

        self.severity()?;

        if let Some(root) = &self.root {
            if root.trim().is_empty() {
                return Err(CliError::config_error("root must not be empty when set"));
            }
        }

        Ok(())
    }

    /// Configured minimum log severity
    pub fn severity(&self) -> CliResult<Severity> {
        Severity::from_level(&self.log_level).ok_or_else(|| {
            CliError::config_error(format!(
                "Invalid log_level: '{}'. Expected one of trace, info, warn, error.",
                self.log_level
            ))
        })
    }

    pub fn schema_path(&self) -> &Path {
        Path::new(&self.schema_dir)
    }
}

/// Counts of one `resolve` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(&cli.config, cli.command)
}

/// Run a command against stdin/stdout
pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cmd {
        Command::Check => check(config_path, &mut out),
        Command::Describe { root } => describe(config_path, &root, &mut out),
        Command::Resolve { root } => {
            let stdin = io::stdin();
            resolve(config_path, root.as_deref(), stdin.lock(), &mut out).map(|_| ())
        }
    }
}

/// Load every definition and print one descriptor line per hierarchy
pub fn check<W: Write>(config_path: &Path, out: &mut W) -> CliResult<()> {
    let (_, loader) = boot(config_path)?;
    for loaded in loader.all() {
        write_line(out, &loaded.describe())?;
    }
    Ok(())
}

/// Print the descriptor of one hierarchy
pub fn describe<W: Write>(config_path: &Path, root: &str, out: &mut W) -> CliResult<()> {
    let (_, loader) = boot(config_path)?;
    let loaded = loader.get(root).ok_or_else(|| CliError::unknown_root(root))?;
    write_line(out, &loaded.describe())
}

/// Resolve one JSON value per input line against a hierarchy
///
/// `root` overrides the configured default root.
pub fn resolve<R: BufRead, W: Write>(
    config_path: &Path,
    root: Option<&str>,
    input: R,
    out: &mut W,
) -> CliResult<ResolveSummary> {
    let (config, loader) = boot(config_path)?;
    let root = root
        .or(config.root.as_deref())
        .ok_or_else(CliError::missing_root)?;
    let loaded = loader.get(root).ok_or_else(|| CliError::unknown_root(root))?;

    let summary = resolve_stream(loaded, input, out)?;

    log_event_with_fields(
        Event::ResolveComplete,
        &[
            ("root", root),
            ("accepted", &summary.accepted.to_string()),
            ("rejected", &summary.rejected.to_string()),
            ("malformed", &summary.malformed.to_string()),
        ],
    );

    Ok(summary)
}

fn resolve_stream<R: BufRead, W: Write>(
    loaded: &LoadedHierarchy,
    input: R,
    out: &mut W,
) -> CliResult<ResolveSummary> {
    let hierarchy = loaded.hierarchy();
    let mut summary = ResolveSummary::default();

    for (index, request) in read_requests(input).enumerate() {
        let line = (index + 1).to_string();
        let value = match request? {
            Ok(value) => value,
            Err(reason) => {
                summary.malformed += 1;
                log_event_with_fields(Event::RequestMalformed, &[("line", &line), ("reason", &reason)]);
                write_error(out, CliErrorCode::MalformedRequest.code(), &reason)?;
                continue;
            }
        };

        match hierarchy.resolve(loaded.root(), value) {
            Ok(instance) => {
                summary.accepted += 1;
                log_event_with_fields(
                    Event::ResolveAccepted,
                    &[("line", &line), ("variant", instance.name())],
                );
                write_response(out, instance.name(), instance.to_value())?;
            }
            Err(e) => {
                summary.rejected += 1;
                let event = if e.is_declaration() {
                    Event::ResolveDeclarationFault
                } else {
                    Event::ResolveRejected
                };
                log_event_with_fields(event, &[("line", &line), ("code", e.code().code())]);
                write_error(out, e.code().code(), &e.to_string())?;
            }
        }
    }

    Ok(summary)
}

/// Configuration load, then definition load
fn boot(config_path: &Path) -> CliResult<(Config, HierarchyLoader)> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.severity()?);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("path", &config_path.display().to_string()),
            ("schema_dir", &config.schema_dir),
        ],
    );

    let mut loader = HierarchyLoader::new(config.schema_path());
    if let Err(e) = loader.load_all() {
        log_event_with_fields(
            Event::HierarchyRejected,
            &[("code", e.code().code()), ("error", &e.to_string())],
        );
        return Err(e.into());
    }
    log_event_with_fields(
        Event::HierarchiesLoaded,
        &[("count", &loader.count().to_string())],
    );

    Ok((config, loader))
}
