//! Custom error types for smtp-send.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for smtp-send operations.
#[derive(Debug)]
pub enum Error {
    /// A required field is missing or a body variant is empty
    Validation(String),
    /// The transport did not finish within the configured number of seconds
    Timeout(u64),
    /// Failure reported by the mail transport (auth, connection, rejection)
    Transport(String),
    /// The archive directory could not be created
    Directory(PathBuf),
    /// An archive file could not be written
    Write(String),
    /// Configuration errors
    Config(String),
    /// I/O errors outside the archive path
    Io(io::Error),
    /// JSON (de)serialization errors
    Json(serde_json::Error),
    /// A record failed while continue-on-fail was disabled
    Item { index: usize, source: Box<Error> },
}

impl Error {
    /// Wrap this error with the index of the record that produced it.
    #[must_use]
    pub fn at_item(self, index: usize) -> Self {
        Self::Item {
            index,
            source: Box::new(self),
        }
    }

    /// True for errors raised while building a message.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Timeout(secs) => write!(f, "timed out after {secs} seconds"),
            Self::Transport(msg) => write!(f, "{msg}"),
            Self::Directory(path) => {
                write!(f, "unable to create save directory: {}", path.display())
            }
            Self::Write(msg) => write!(f, "error while saving email: {msg}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::Item { index, source } => write!(f, "item {index}: {source}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Item { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<lettre::transport::smtp::Error> for Error {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io_err) => io_err,
            other => Self::other(other.to_string()),
        }
    }
}

/// Result type alias for smtp-send operations.
pub type Result<T> = std::result::Result<T, Error>;
