//! Result export for the CLI and WASM frontends.
//!
//! Writes a [`SimulationResult`] as CSV, an aligned text table, or JSON.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::{Result, TransimError};
use crate::solver::SimulationResult;

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// Comma-separated, one header row
    #[default]
    Csv,
    /// Whitespace-aligned columns, like a SPICE `.print` listing
    Table,
    /// The whole result serialized as one object
    #[cfg(any(feature = "cli", feature = "wasm"))]
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Table => write!(f, "table"),
            #[cfg(any(feature = "cli", feature = "wasm"))]
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TransimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "table" | "txt" => Ok(Self::Table),
            #[cfg(any(feature = "cli", feature = "wasm"))]
            "json" => Ok(Self::Json),
            other => Err(TransimError::invalid_simulation_param(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

fn io_err(source: std::io::Error) -> TransimError {
    TransimError::OutputError { source }
}

/// Write `result` in `format`.
pub fn write_result<W: Write>(
    result: &SimulationResult,
    format: OutputFormat,
    writer: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(result, writer),
        OutputFormat::Table => write_table(result, writer),
        #[cfg(any(feature = "cli", feature = "wasm"))]
        OutputFormat::Json => write_json(result, writer),
    }
}

/// `time,<signal>,...` followed by one line per recorded point.
pub fn write_csv<W: Write>(result: &SimulationResult, writer: &mut W) -> Result<()> {
    write!(writer, "time").map_err(io_err)?;
    for name in &result.signals {
        write!(writer, ",{}", name).map_err(io_err)?;
    }
    writeln!(writer).map_err(io_err)?;

    for (t, row) in result.times.iter().zip(&result.rows) {
        write!(writer, "{:e}", t).map_err(io_err)?;
        for value in row {
            write!(writer, ",{:e}", value).map_err(io_err)?;
        }
        writeln!(writer).map_err(io_err)?;
    }
    Ok(())
}

/// Indexed, right-aligned columns.
pub fn write_table<W: Write>(result: &SimulationResult, writer: &mut W) -> Result<()> {
    const WIDTH: usize = 16;

    write!(writer, "{:>6} {:>WIDTH$}", "Index", "time").map_err(io_err)?;
    for name in &result.signals {
        write!(writer, " {:>WIDTH$}", name).map_err(io_err)?;
    }
    writeln!(writer).map_err(io_err)?;

    for (k, (t, row)) in result.times.iter().zip(&result.rows).enumerate() {
        write!(writer, "{:>6} {:>WIDTH$.6e}", k, t).map_err(io_err)?;
        for value in row {
            write!(writer, " {:>WIDTH$.6e}", value).map_err(io_err)?;
        }
        writeln!(writer).map_err(io_err)?;
    }
    Ok(())
}

/// The result as pretty-printed JSON.
#[cfg(any(feature = "cli", feature = "wasm"))]
pub fn write_json<W: Write>(result: &SimulationResult, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, result).map_err(|e| io_err(e.into()))?;
    writeln!(writer).map_err(io_err)
}

/// The result as a compact JSON string.
#[cfg(any(feature = "cli", feature = "wasm"))]
pub fn to_json_string(result: &SimulationResult) -> Result<String> {
    serde_json::to_string(result).map_err(|e| io_err(e.into()))
}
