//! Error types for volume sessions.
//!
//! [`VolumeError`] is what every session operation returns. Validation
//! failures (bad paths, closed session, foreign handles) are rejected before
//! any codec call; codec and host I/O failures surface as
//! [`VolumeError::OperationFailed`] with a message naming the affected
//! entries, suitable for showing to a user as is.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::path::{LogicalPath, PathError};

/// Underlying cause of an [`VolumeError::OperationFailed`].
#[derive(Error, Debug)]
pub enum FailureCause {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{path}: {source}")]
    Host {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FailureCause {
    pub(crate) fn host(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FailureCause::Host {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("Path '{path}' already exists")]
    AlreadyExists { path: LogicalPath },

    #[error("Parent directory of '{path}' does not exist")]
    ParentNotFound { path: LogicalPath },

    #[error("Path '{path}' does not exist")]
    NotFound { path: LogicalPath },

    #[error("'{path}' is not a directory")]
    NotADirectory { path: LogicalPath },

    #[error("Unable to list files in '{path}': {source}")]
    List {
        path: LogicalPath,
        #[source]
        source: CodecError,
    },

    #[error("Unable to open '{path}': {source}")]
    Open {
        path: LogicalPath,
        #[source]
        source: CodecError,
    },

    #[error("Unable to unlock volume: {0}")]
    Unlock(#[source] CodecError),

    #[error("Invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Volume session is closed")]
    SessionClosed,

    #[error("Handle belongs to a different volume session")]
    ForeignHandle,

    #[error("Nothing to paste")]
    ClipboardEmpty,

    #[error("{detail}")]
    OperationFailed {
        detail: String,
        #[source]
        source: Option<FailureCause>,
    },
}

impl VolumeError {
    pub(crate) fn failed(detail: impl Into<String>, cause: impl Into<FailureCause>) -> Self {
        VolumeError::OperationFailed {
            detail: detail.into(),
            source: Some(cause.into()),
        }
    }

    pub(crate) fn failed_plain(detail: impl Into<String>) -> Self {
        VolumeError::OperationFailed {
            detail: detail.into(),
            source: None,
        }
    }

    /// Stat/lookup failures that are not "missing": report as a failed operation.
    pub(crate) fn lookup(path: &LogicalPath, source: CodecError) -> Self {
        VolumeError::failed(format!("Unable to look up '{path}': {source}"), source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_failed_displays_detail_only() {
        let err = VolumeError::failed(
            "Unable to create folder 'Photos'",
            CodecError::AlreadyExists {
                path: LogicalPath::parse("Photos").unwrap(),
            },
        );
        assert_eq!(err.to_string(), "Unable to create folder 'Photos'");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_path_error_converts() {
        let err: VolumeError = PathError::Empty.into();
        assert!(matches!(err, VolumeError::InvalidPath(PathError::Empty)));
    }
}
