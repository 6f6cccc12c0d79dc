//! Failure classes of a word-count job.
//!
//! Every failure is fatal to the job. The variants only exist so the caller
//! can tell *which* part of the job gave up, and so the binary can pick an
//! exit code.

use std::fmt::Write;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input path does not exist: {0}")]
    SourceNotFound(String),

    #[error("failed to read input {uri}")]
    SourceUnreadable {
        uri: String,
        #[source]
        source: BoxError,
    },

    #[error("output path already exists: {0}")]
    SinkExists(String),

    #[error("failed to write output {uri}")]
    SinkUnwritable {
        uri: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid location `{uri}`: {reason}")]
    InvalidLocation { uri: String, reason: &'static str },

    #[error("unsupported filesystem scheme `{scheme}` in `{uri}`")]
    UnsupportedScheme { uri: String, scheme: String },

    #[error("execution context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("task failed in stage `{stage}`: {message}")]
    TaskFailed { stage: &'static str, message: String },
}

impl Error {
    pub(crate) fn unreadable(uri: impl ToString, source: impl Into<BoxError>) -> Self {
        Error::SourceUnreadable {
            uri: uri.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn unwritable(uri: impl ToString, source: impl Into<BoxError>) -> Self {
        Error::SinkUnwritable {
            uri: uri.to_string(),
            source: source.into(),
        }
    }

    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::SourceNotFound(_) | Error::SourceUnreadable { .. } => 2,
            Error::SinkExists(_) | Error::SinkUnwritable { .. } => 3,
            Error::ContextUnavailable(_) => 4,
            Error::TaskFailed { .. } => 5,
            Error::InvalidLocation { .. } | Error::UnsupportedScheme { .. } => 64,
        }
    }
}

/// Renders an error followed by its chain of causes, one per line.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut current = e.source();
    while let Some(cause) = current {
        let _ = write!(out, "\n  caused by: {}", cause);
        current = cause.source();
    }
    out
}
