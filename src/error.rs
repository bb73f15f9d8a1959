use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

use crate::query::OutputFormat;

/// Crate-wide result alias.
pub type Result<T, E = PowerError> = std::result::Result<T, E>;

/// Failure taxonomy of the POWER client.
///
/// Every fallible operation surfaces one of these directly to the caller;
/// nothing is retried or silently recovered.
#[derive(Debug, Error)]
pub enum PowerError {
    /// Bad geometry, date, or parameter inputs.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Incompatible combination of request options, or an unreadable
    /// configuration file.
    #[error("incompatible configuration: {0}")]
    Configuration(String),

    /// Transport-level failure before an HTTP status was obtained.
    #[error("network request failed for {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success HTTP status.
    #[error("POWER service returned HTTP {status} for {url}")]
    Remote {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// The response body could not be decoded in the requested format.
    #[error("failed to decode {format} response: {message}")]
    Format {
        format: OutputFormat,
        message: String,
    },

    /// File-system failure while persisting results.
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PowerError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        PowerError::Validation(msg.into())
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        PowerError::Configuration(msg.into())
    }

    pub(crate) fn format(format: OutputFormat, msg: impl Into<String>) -> Self {
        PowerError::Format {
            format,
            message: msg.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PowerError::Io {
            path: path.into(),
            source,
        }
    }
}
