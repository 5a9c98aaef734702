//! Error types for lockfile operations.

// False positive warnings from thiserror macro expansion
#![allow(unused_assignments)]

use lockwright_core::Error as CoreError;
use miette::Diagnostic;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Lockfile operation errors.
#[derive(Error, Debug, Diagnostic)]
pub enum LockfileError {
    /// IO error with path context.
    #[error("IO error at {path}: {message}")]
    #[diagnostic(code(lockfile::io))]
    Io {
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A line of a previous lockfile could not be parsed.
    #[error("line {line}: cannot parse '{content}': {source}")]
    #[diagnostic(
        code(lockfile::parse),
        help("regenerate the lockfile or fix the line by hand")
    )]
    Parse {
        /// 1-based line number of the (first physical) line.
        line: usize,
        /// Logical line after joining continuations.
        content: String,
        /// Underlying parse error.
        source: CoreError,
    },

    /// Lock acquisition timeout.
    #[error("Failed to acquire lock on {path} within {timeout:?}")]
    #[diagnostic(code(lockfile::lock_timeout), help("another process may be writing the lockfile"))]
    LockTimeout {
        /// Lock file path.
        path: PathBuf,
        /// Timeout duration.
        timeout: Duration,
    },

    /// Written content did not read back identically.
    #[error("Integrity check failed: expected {expected}, got {actual}")]
    #[diagnostic(code(lockfile::integrity))]
    IntegrityError {
        /// Expected hash.
        expected: String,
        /// Actual hash.
        actual: String,
    },

    /// A pinned entry has no version (only direct sources may omit it).
    #[error("cannot render '{requirement}': {source}")]
    #[diagnostic(code(lockfile::not_pinned))]
    NotPinned {
        /// The offending requirement.
        requirement: String,
        /// Underlying contract error.
        source: CoreError,
    },
}

impl LockfileError {
    /// Create an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Check if this is a "not found" error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { message, .. } if message.contains("not found") || message.contains("No such file"))
    }

    /// Check if this is a lock timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Result type for lockfile operations.
pub type Result<T> = std::result::Result<T, LockfileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LockfileError::LockTimeout {
            path: PathBuf::from("/requirements.txt.lck"),
            timeout: Duration::from_secs(30),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("requirements.txt.lck"));

        let err = LockfileError::Parse {
            line: 7,
            content: "foo=>1".to_string(),
            source: CoreError::invalid_specifier("=>1", "missing comparison operator"),
        };
        assert!(err.to_string().starts_with("line 7:"));
    }

    #[test]
    fn test_io_error() {
        let err = LockfileError::io(
            "/some/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.is_not_found());
    }
}
