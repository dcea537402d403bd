//! Centralized error types for detach.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the detach library.
#[derive(Error, Debug)]
pub enum DetachError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required setting is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The message structure could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An attachment declares a transfer encoding we do not decode.
    #[error("Unknown transfer encoding: {0}")]
    UnsupportedEncoding(String),

    /// A base64 payload could not be decoded.
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// A quoted-printable payload could not be decoded.
    #[error("Invalid quoted-printable payload: {0}")]
    InvalidQuotedPrintable(#[from] quoted_printable::QuotedPrintableError),

    /// A directory or file pattern could not be expanded.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The chosen attachment directory already exists.
    #[error("File exists: {0}")]
    DirectoryExists(PathBuf),

    /// The outbound mail relay rejected the message or the connection.
    #[error("SMTP error: {0}")]
    Transport(String),

    /// Operator input ended before a decision was made.
    #[error("Operator input closed")]
    Prompt,

    /// A spam-learn command could not be started.
    #[error("Could not run learn command '{command}': {source}")]
    Learn {
        command: String,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, DetachError>`.
pub type Result<T> = std::result::Result<T, DetachError>;

impl DetachError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether only the current message has to be abandoned.
    ///
    /// Everything else stops the run.
    pub fn is_message_local(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedEncoding(_)
                | Self::InvalidBase64(_)
                | Self::InvalidQuotedPrintable(_)
        )
    }
}

impl From<lettre::transport::smtp::Error> for DetachError {
    fn from(source: lettre::transport::smtp::Error) -> Self {
        Self::Transport(source.to_string())
    }
}
