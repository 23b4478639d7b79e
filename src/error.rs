//! Custom error types for the filter graph.
//!
//! This module defines `FilterError`, the single error type shared by
//! parameters, loaders, filters and configuration loading. It is built with
//! `thiserror` so callers can match on the failure kind and still get a
//! readable message.
//!
//! ## Error Hierarchy
//!
//! - **Parameter errors** (`UnknownParameter`, `TypeMismatch`,
//!   `ConstraintViolation`): raised synchronously by `set_parameter` and
//!   friends. These are the only errors that reach the caller directly.
//! - **`Configuration`**: a filter cannot run with its current parameters
//!   (no file selected, no input connected). Hosts normally learn about this
//!   through `needs_config()` instead.
//! - **`FileRead` / `Format`**: the data source could not be read or parsed.
//! - **`Range`**: a requested port does not exist in the loaded data.
//! - **`InputRejected`**: a proposed upstream connection failed validation.
//! - **`Config`**: wraps `figment` errors from loading a graph configuration.
//!
//! Refresh never returns these as `Err`. A failing refresh hands its error
//! back inside `RefreshStatus::Aborted` and leaves the last good output in
//! place.

use crate::parameter::ParameterType;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the filter error type.
pub type FilterResult<T> = std::result::Result<T, FilterError>;

/// Errors raised while configuring or refreshing filters.
#[derive(Error, Debug)]
pub enum FilterError {
    /// No parameter with this name exists on the filter
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Value could not be coerced to the parameter's type
    #[error("Parameter '{name}' expects a {expected} value")]
    TypeMismatch {
        /// Parameter name
        name: String,
        /// Declared type of the parameter
        expected: ParameterType,
    },

    /// Value outside the parameter's range or choices
    #[error("Value for parameter '{0}' violates its constraints")]
    ConstraintViolation(String),

    /// Filter settings are missing or inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input file could not be read
    #[error("Failed to read '{}': {source}", .path.display())]
    FileRead {
        /// File that was opened
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Input file is malformed
    #[error("Format error in '{}' line {line}: {message}", .path.display())]
    Format {
        /// File being parsed
        path: PathBuf,
        /// 1-based line, or 0 when the problem is not tied to a line
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Requested port does not exist in the loaded data
    #[error("Port {port} out of range (data has {available} ports)")]
    Range {
        /// Port as configured
        port: i64,
        /// Ports present in the data
        available: usize,
    },

    /// Stream offered to an input was refused
    #[error("Input {index} rejected: {reason}")]
    InputRejected {
        /// Input slot
        index: usize,
        /// Why it was refused
        reason: String,
    },

    /// Graph configuration file could not be loaded
    #[error("Configuration file error: {0}")]
    Config(#[from] figment::Error),
}

impl FilterError {
    /// Whether the error stems from missing or invalid user settings, as
    /// opposed to a problem with the data source.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FilterError::Configuration(_)
                | FilterError::UnknownParameter(_)
                | FilterError::TypeMismatch { .. }
                | FilterError::ConstraintViolation(_)
                | FilterError::Config(_)
        )
    }
}
