//! Error types for Lockwright operations.
//!
//! Each error has:
//! - A unique error code (e.g., E0105) for easy reference and searching
//! - A clear error message explaining what went wrong
//! - Suggestions for how to fix the issue

use std::fmt;
use thiserror::Error;

/// Error codes for Lockwright errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Requirement model errors (E01xx)
    /// Invalid package name
    E0101,
    /// Invalid version string
    E0102,
    /// Invalid version specifier
    E0103,
    /// Invalid requirement line
    E0104,
    /// Specifiers have an empty intersection
    E0105,

    // Contract errors (E02xx)
    /// Requirement is not pinned
    E0201,
    /// Requirements name different packages
    E0202,
    /// Illegal resolver state transition
    E0203,

    // Repository errors (E03xx)
    /// Dependency discovery failed
    E0301,
    /// Repository backend failed
    E0302,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::E0101 => "E0101",
            Self::E0102 => "E0102",
            Self::E0103 => "E0103",
            Self::E0104 => "E0104",
            Self::E0105 => "E0105",
            Self::E0201 => "E0201",
            Self::E0202 => "E0202",
            Self::E0203 => "E0203",
            Self::E0301 => "E0301",
            Self::E0302 => "E0302",
        }
    }

    /// Get a brief title for this error code.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::E0101 => "Invalid package name",
            Self::E0102 => "Invalid version",
            Self::E0103 => "Invalid specifier",
            Self::E0104 => "Invalid requirement",
            Self::E0105 => "Incompatible constraints",
            Self::E0201 => "Requirement not pinned",
            Self::E0202 => "Package name mismatch",
            Self::E0203 => "Illegal state transition",
            Self::E0301 => "Dependency resolution failed",
            Self::E0302 => "Repository error",
        }
    }

    /// Whether this code marks a caller contract violation rather than a
    /// problem with the input data.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::E0201 | Self::E0202 | Self::E0203)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for Lockwright.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Package name could not be normalized.
    #[error("[E0101] invalid package name '{name}'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// Version string is not PEP 440 compliant.
    #[error("[E0102] invalid version '{version}'")]
    InvalidVersion {
        /// The rejected version string.
        version: String,
    },

    /// Specifier clause could not be parsed.
    #[error("[E0103] invalid specifier '{specifier}': {reason}")]
    InvalidSpecifier {
        /// The rejected specifier string.
        specifier: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Requirement line could not be parsed.
    #[error("[E0104] invalid requirement '{line}': {reason}")]
    InvalidRequirement {
        /// The rejected line.
        line: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two requirements for the same package cannot both hold.
    #[error("[E0105] incompatible constraints for '{name}': '{left}' and '{right}'")]
    IncompatibleConstraints {
        /// Package name.
        name: String,
        /// First requirement's specifier or source.
        left: String,
        /// Second requirement's specifier or source.
        right: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },

    /// An operation that needs an exact version got an open range.
    #[error("[E0201] {operation} requires a pinned requirement, got '{requirement}'")]
    NotPinned {
        /// Operation that was attempted.
        operation: &'static str,
        /// The offending requirement.
        requirement: String,
    },

    /// Requirements for different packages were combined.
    #[error("[E0202] cannot combine requirements for '{left}' and '{right}'")]
    NameMismatch {
        /// First name.
        left: String,
        /// Second name.
        right: String,
    },

    /// A state machine was driven through a transition it does not allow.
    #[error("[E0203] illegal transition from {from} to {to}")]
    IllegalTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// Metadata discovery for a source failed (e.g. a broken build script).
    #[error("Dependency resolution of {source_id} failed:\n{message}")]
    DependencyResolutionFailed {
        /// Source identifier (URL or `name==version`).
        source_id: String,
        /// Underlying diagnostic, kept verbatim.
        message: String,
    },

    /// Repository backend failure (network, cache, ...).
    #[error("[E0302] repository error: {message}")]
    Repository {
        /// Error message.
        message: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },
}

impl Error {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidName { .. } => ErrorCode::E0101,
            Self::InvalidVersion { .. } => ErrorCode::E0102,
            Self::InvalidSpecifier { .. } => ErrorCode::E0103,
            Self::InvalidRequirement { .. } => ErrorCode::E0104,
            Self::IncompatibleConstraints { .. } => ErrorCode::E0105,
            Self::NotPinned { .. } => ErrorCode::E0201,
            Self::NameMismatch { .. } => ErrorCode::E0202,
            Self::IllegalTransition { .. } => ErrorCode::E0203,
            Self::DependencyResolutionFailed { .. } => ErrorCode::E0301,
            Self::Repository { .. } => ErrorCode::E0302,
        }
    }

    /// Get suggestions for fixing this error.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::IncompatibleConstraints { suggestions, .. }
            | Self::Repository { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    /// Whether this error is a caller contract violation.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        self.code().is_contract_violation()
    }

    /// Create an invalid name error.
    #[must_use]
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// Create an invalid version error.
    #[must_use]
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create an invalid specifier error.
    #[must_use]
    pub fn invalid_specifier(specifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpecifier {
            specifier: specifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid requirement error.
    #[must_use]
    pub fn invalid_requirement(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequirement {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create an incompatible constraints error with suggestions.
    #[must_use]
    pub fn incompatible(
        name: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let left = left.into();
        let right = right.into();
        Self::IncompatibleConstraints {
            suggestions: vec![
                format!("No version of {name} satisfies both '{left}' and '{right}'"),
                "Relax one of the constraints or drop the stricter pin".to_string(),
            ],
            name,
            left,
            right,
        }
    }

    /// Create a not-pinned contract error.
    #[must_use]
    pub fn not_pinned(operation: &'static str, requirement: impl fmt::Display) -> Self {
        Self::NotPinned {
            operation,
            requirement: requirement.to_string(),
        }
    }

    /// Create a dependency discovery error, keeping the message verbatim.
    #[must_use]
    pub fn dependency_resolution_failed(
        source_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DependencyResolutionFailed {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut suggestions = vec!["Check the index configuration and retry".to_string()];
        if message.contains("timeout") {
            suggestions.push("The index may be slow; retry with a longer timeout".to_string());
        }
        Self::Repository {
            message,
            suggestions,
        }
    }

    /// Format the error with suggestions for display.
    #[must_use]
    pub fn display_with_suggestions(&self) -> String {
        let mut output = format!("{self}");
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                output.push_str(&format!("\n  - {suggestion}"));
            }
        }
        output
    }
}

/// Result type for Lockwright operations.
pub type Result<T> = std::result::Result<T, Error>;
