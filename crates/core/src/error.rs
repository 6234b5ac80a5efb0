//! Error taxonomy shared across the sourcepin workspace.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for sourcepin operations.
///
/// Every resolver failure is fatal for the whole run; the assembler wraps
/// resolver errors with [`Error::in_file`] so the offending source file
/// travels with the cause.
#[derive(Error, Debug)]
pub enum Error {
    /// Image reference could not be resolved to a manifest digest.
    #[error("failed to resolve image '{reference}': {message}")]
    ImageResolve {
        /// The image reference as written.
        reference: String,
        /// Underlying cause.
        message: String,
    },

    /// HTTP URL could not be resolved to a content checksum.
    #[error("failed to resolve '{url}': {message}")]
    HttpResolve {
        /// The URL as written.
        url: String,
        /// Underlying cause.
        message: String,
    },

    /// Git ref could not be resolved to a commit id.
    #[error("failed to resolve git ref '{reference}' at '{url}': {message}")]
    GitResolve {
        /// The repository URL.
        url: String,
        /// The requested ref (branch, tag, or empty for HEAD).
        reference: String,
        /// Underlying cause.
        message: String,
    },

    /// Build-instruction text could not be parsed.
    #[error("failed to parse {}: {message}", file.display())]
    Extract {
        /// The input file.
        file: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// An error enriched with the source file it originated from.
    #[error("{}: {source}", file.display())]
    InFile {
        /// The input file the failing reference came from.
        file: PathBuf,
        /// The wrapped resolver error.
        #[source]
        source: Box<Error>,
    },

    /// The run was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// Policy document serialization failed.
    #[error("failed to serialize policy: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an image resolution error.
    #[must_use]
    pub fn image_resolve(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ImageResolve {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP resolution error.
    #[must_use]
    pub fn http_resolve(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HttpResolve {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a git resolution error.
    #[must_use]
    pub fn git_resolve(
        url: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::GitResolve {
            url: url.into(),
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error.
    #[must_use]
    pub fn extract(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extract {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Wrap an error with the source file it originated from.
    ///
    /// Cancellation is deliberately not wrapped so callers can keep matching
    /// on [`Error::Cancelled`] at any depth.
    #[must_use]
    pub fn in_file(self, file: &Path) -> Self {
        match self {
            Self::Cancelled => Self::Cancelled,
            other => Self::InFile {
                file: file.to_path_buf(),
                source: Box::new(other),
            },
        }
    }

    /// True if this error (or the error it wraps) is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::InFile { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type alias for sourcepin operations.
pub type Result<T> = std::result::Result<T, Error>;
