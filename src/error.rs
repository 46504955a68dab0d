//! Error types for file comparison.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for comparison operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a comparison before it reaches a verdict.
///
/// None of these are retried. Open handles are released before the error
/// reaches the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// The path does not resolve to an existing file.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// Offending path.
        path: PathBuf,
    },

    /// Opening or reading the file was denied.
    #[error("permission denied: {}", path.display())]
    PermissionDenied {
        /// Offending path.
        path: PathBuf,
    },

    /// The path exists but is not a regular file.
    #[error("not a regular file: {}", path.display())]
    NotAFile {
        /// Offending path.
        path: PathBuf,
    },

    /// A read failed after the file was opened, including truncation
    /// mid-stream.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File the failing read belonged to.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The comparison was abandoned through its cancellation token.
    #[error("comparison cancelled")]
    Cancelled,
}

impl Error {
    /// Classifies an I/O error raised while working on `path`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound { path },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { path },
            _ => Error::Io { path, source },
        }
    }

    pub(crate) fn truncated(path: impl AsRef<Path>, expected: u64, actual: u64) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended at {actual} bytes, expected {expected}"),
            ),
        }
    }

    pub(crate) fn worker_gone(path: impl AsRef<Path>) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "reader thread terminated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn classify_not_found() {
        let error = Error::io("a", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(error, Error::NotFound { .. }));
    }

    #[test]
    fn classify_permission_denied() {
        let error = Error::io("a", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(error, Error::PermissionDenied { .. }));
    }

    #[test]
    fn classify_other() {
        let error = Error::io("a", io::Error::from(io::ErrorKind::InvalidData));
        assert!(matches!(error, Error::Io { .. }));
    }

    #[test]
    fn truncated_is_unexpected_eof() {
        match Error::truncated("a", 10, 4) {
            Error::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
