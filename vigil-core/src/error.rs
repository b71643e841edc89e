//! Error types for vigil core.

use std::{error::Error, fmt, io};

/// Error type for vigil core operations.
#[derive(Debug)]
pub enum VigilError {
    /// An underlying I/O error.
    Io(io::Error),
    /// Target acquisition failed (bad path or clone failure). Fatal to a scan.
    Acquisition(String),
    /// A catch-all error with a message.
    Other(String),
}

impl fmt::Display for VigilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Acquisition(message) => write!(f, "acquisition failed: {message}"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for VigilError {}

impl From<io::Error> for VigilError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Convenience result type for vigil core.
pub type Result<T> = std::result::Result<T, VigilError>;
