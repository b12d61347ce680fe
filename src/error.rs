//! Error types for the transim circuit simulator.
//!
//! This module provides a unified error type [`TransimError`] that covers
//! all error conditions that can occur during netlist parsing, netlist
//! compilation, coupling registration and time-domain simulation.

use thiserror::Error;

/// Result type alias using [`TransimError`].
pub type Result<T> = std::result::Result<T, TransimError>;

/// Unified error type for all transim operations.
#[derive(Error, Debug)]
pub enum TransimError {
    // ============ Netlist Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    // ============ Netlist Compile Errors ============
    /// No stamper is registered for the element's type tag
    #[error("Unknown component type '{component_type}' for element '{element}'")]
    UnknownComponentType {
        component_type: String,
        element: String,
    },

    /// Invalid element parameter value
    #[error("Invalid parameter '{param}' for element '{element}': {message}")]
    InvalidParameter {
        element: String,
        param: String,
        message: String,
    },

    /// A symbolic name could not be resolved
    #[error("Unresolved label '{label}' referenced by '{context}'")]
    UnresolvedLabel { label: String, context: String },

    /// Duplicate element name
    #[error("Duplicate element name '{name}'")]
    DuplicateElement { name: String },

    /// Element index outside the indexer's range
    #[error("Element index {index} out of range (element count {count})")]
    ElementOutOfRange { index: usize, count: usize },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    // ============ Coupling Errors ============
    /// Invalid mutual-coupling definition
    #[error("Invalid coupling: {message}")]
    InvalidCoupling { message: String },

    /// The unordered inductor pair is already coupled
    #[error("Coupling between inductors {first} and {second} already exists")]
    DuplicateCoupling { first: usize, second: usize },

    // ============ Simulation Errors ============
    /// System matrix is singular and cannot be solved
    #[error("Singular system at pivot row {row} - circuit may have a floating node or an invalid element configuration")]
    SingularSystem { row: usize },

    /// A computed signal is NaN or infinite
    #[error("Signal '{signal}' is not a number at t = {time:.6e} s (value: {value})")]
    NotANumber {
        signal: String,
        time: f64,
        value: f64,
    },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing results
    #[error("Failed to write results: {source}")]
    OutputError {
        #[source]
        source: std::io::Error,
    },
}

impl TransimError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        element: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            element: element.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid coupling error
    pub fn invalid_coupling(message: impl Into<String>) -> Self {
        Self::InvalidCoupling {
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_simulation_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// Attach an element name to an error raised by a stamper, which only
    /// knows its own kind.
    pub fn for_element(self, name: &str) -> Self {
        match self {
            Self::InvalidParameter { param, message, .. } => Self::InvalidParameter {
                element: name.to_string(),
                param,
                message,
            },
            Self::UnknownComponentType { component_type, .. } => Self::UnknownComponentType {
                component_type,
                element: name.to_string(),
            },
            Self::NotANumber { time, value, .. } => Self::NotANumber {
                signal: format!("i({})", name),
                time,
                value,
            },
            other => other,
        }
    }

    /// Stamp the simulation time onto a [`TransimError::NotANumber`].
    pub fn at_time(self, time: f64) -> Self {
        match self {
            Self::NotANumber { signal, value, .. } => Self::NotANumber {
                signal,
                time,
                value,
            },
            other => other,
        }
    }

    /// Whether this error belongs to the netlist compile phase.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownComponentType { .. }
                | Self::UnresolvedLabel { .. }
                | Self::InvalidCoupling { .. }
                | Self::DuplicateCoupling { .. }
                | Self::InvalidParameter { .. }
                | Self::DuplicateElement { .. }
                | Self::InvalidTopology { .. }
        )
    }
}
