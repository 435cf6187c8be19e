//! Error types shared by the conversion pipeline, the URL shortener and the QR encoder.

use std::io;
use thiserror::Error;

/// Result type alias for toolhub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Caller-facing classification for a failed conversion request.
pub const MSG_INVALID_CONTAINER: &str = "not a valid container";
pub const MSG_CONVERSION_FAILED: &str = "conversion failed";

#[derive(Error, Debug)]
pub enum Error {
    /// The input bytes are not a readable zip archive.
    #[error("not a valid container: {0}")]
    ContainerFormat(String),

    /// The input exceeds the configured size limit.
    #[error("input too large: {size} bytes exceeds limit of {limit} bytes")]
    InputTooLarge { size: u64, limit: u64 },

    /// One archive member could not be read. The reader logs and drops these.
    #[error("entry {name} could not be decoded: {reason}")]
    EntryDecode { name: String, reason: String },

    /// Writing the output package failed.
    #[error("conversion failed: {0}")]
    Synthesis(String),

    /// An external conversion engine failed.
    #[error("conversion provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("{0}")]
    InvalidUrl(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("QR code generation failed: {0}")]
    QrCode(String),

    /// The request itself is malformed (wrong extension, empty text, ...).
    #[error("{0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn provider(provider: &str, reason: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Message surfaced to the requester. Conversion failures collapse to two classes.
    pub fn user_message(&self) -> String {
        match self {
            Error::ContainerFormat(_) | Error::InputTooLarge { .. } => {
                MSG_INVALID_CONTAINER.to_string()
            }
            Error::EntryDecode { .. } | Error::Synthesis(_) | Error::Provider { .. } => {
                MSG_CONVERSION_FAILED.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            other => Error::ContainerFormat(other.to_string()),
        }
    }
}
