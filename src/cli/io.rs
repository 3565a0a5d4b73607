//! JSON line I/O for the CLI
//!
//! - Input: one JSON value per line
//! - Output: one JSON object per line
//! - UTF-8 only
//!
//! Readers and writers are passed in so commands can run against buffers.

use std::io::{BufRead, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// One input line: the parsed value, or why it could not be parsed.
pub type Request = Result<Value, String>;

/// Reads JSON values line by line, skipping blank lines.
///
/// A line that is not JSON yields `Err` with the parse message; an I/O
/// failure ends iteration with a `CliError`.
pub fn read_requests<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<Request>> {
    reader.lines().filter_map(|line| match line {
        Err(e) => Some(Err(CliError::from(e))),
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Ok(serde_json::from_str(&line).map_err(|e| e.to_string()))),
    })
}

/// Write a resolved instance
pub fn write_response<W: Write>(writer: &mut W, variant: &str, data: Value) -> CliResult<()> {
    write_json(
        writer,
        &json!({
            "status": "ok",
            "variant": variant,
            "data": data
        }),
    )
}

/// Write an error response
pub fn write_error<W: Write>(writer: &mut W, code: &str, message: &str) -> CliResult<()> {
    write_json(
        writer,
        &json!({
            "status": "error",
            "code": code,
            "message": message
        }),
    )
}

/// Write a plain text line
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> CliResult<()> {
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
}

fn write_json<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
