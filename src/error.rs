//! Error type shared by every part of the calibration utility.
//!
//! Errors fall into two groups. Fatal ones (the port cannot be opened, a file
//! cannot be read or written, the configuration is inconsistent) abort the run.
//! Per-entry ones (a timeout, a blank answer, a failed write on one register)
//! are recorded in the CSV and log and the run moves on to the next entry.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias for results using [`CalError`].
pub type CalResult<T> = std::result::Result<T, CalError>;

#[derive(Error, Debug)]
pub enum CalError {
    /// The serial port could not be opened.
    #[error("could not open serial port '{port}': {source}")]
    Connection {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// No terminated response arrived within the read timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The instrument answered with a blank line.
    #[error("no response")]
    EmptyResponse,

    /// Reading from or writing to the port failed mid-command.
    #[error("serial I/O error: {0}")]
    Serial(#[source] io::Error),

    /// A response was expected to be numeric and was not.
    #[error("'{text}' is not a number")]
    Parse {
        text: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CalError {
    /// Whether this error must abort the whole run rather than one entry.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CalError::Timeout(_) | CalError::EmptyResponse | CalError::Serial(_) | CalError::Parse { .. }
        )
    }

    /// Actionable advice for a failed port open, if this is one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CalError::Connection { source, .. } => Some(open_hint(source)),
            _ => None,
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CalError::File { path: path.into(), source }
    }
}

fn open_hint(err: &serialport::Error) -> &'static str {
    const IN_USE: &str =
        "Access denied while opening the port. The port is likely already in use by another application.";
    const MISSING: &str =
        "Requested serial port does not exist. Verify the port name and device connection.";
    const GENERIC: &str =
        "Failed to open serial port. Check port name, cable/device connection, and application permissions.";

    match err.kind() {
        serialport::ErrorKind::NoDevice => MISSING,
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => MISSING,
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => IN_USE,
        _ => {
            // Windows reports these through the description only.
            let msg = err.description.to_lowercase();
            if msg.contains("access is denied") || msg.contains("permission denied") || msg.contains("busy") {
                IN_USE
            } else if msg.contains("cannot find the file") || msg.contains("no such file") {
                MISSING
            } else {
                GENERIC
            }
        }
    }
}
