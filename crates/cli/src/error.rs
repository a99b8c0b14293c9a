//! CLI error types.

use std::fmt;

use amx_adapter_common::error::AdapterError;
use error_stack::Report;

#[derive(Debug)]
pub enum CliError {
    /// Configuration file error or disabled integration
    Config(String),
    /// IO error
    Io(std::io::Error),
    /// JSON input or output error
    Json(serde_json::Error),
    /// TOML serialization error
    Toml(String),
    /// Adapter, ID submodule or pixel failure
    Adapter(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Json(err) => write!(f, "JSON error: {}", err),
            CliError::Toml(msg) => write!(f, "TOML error: {}", msg),
            CliError::Adapter(msg) => write!(f, "Adapter error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            CliError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err)
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        CliError::Toml(err.to_string())
    }
}

impl From<Report<AdapterError>> for CliError {
    fn from(report: Report<AdapterError>) -> Self {
        match report.current_context() {
            AdapterError::Configuration { .. } | AdapterError::Logging { .. } => {
                CliError::Config(format!("{report:?}"))
            }
            _ => CliError::Adapter(format!("{report:?}")),
        }
    }
}
