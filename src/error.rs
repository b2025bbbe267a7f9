//! Error handling for scriptfx
//!
//! Load, parse and compile failures are reported through [`FxError`].
//! Runtime failures on the audio path never surface as errors; script-facing
//! calls return sentinel values instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::sync::Role;
use crate::source::SectionKind;

/// Result type alias for scriptfx operations
pub type Result<T> = std::result::Result<T, FxError>;

/// Main error type for scriptfx operations
#[derive(Error, Debug)]
pub enum FxError {
    // Load Errors
    #[error("Cannot load {path}: {reason}")]
    Load {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// `line` is 1-based
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Compile error in @{section} (line {line}): {message}")]
    Compile {
        section: SectionKind,
        line: usize,
        message: String,
    },

    // Runtime Errors
    #[error("Resource exhausted: {resource}")]
    ResourceExhausted { resource: String },

    #[error("Invalid {kind} index: {index}")]
    InvalidHandle { kind: &'static str, index: i64 },

    #[error("Call requires the {expected} role but was made from the {actual} role")]
    RoleViolation { expected: Role, actual: Role },

    // Preset Errors
    #[error("Invalid preset bank: {reason}")]
    InvalidBank { reason: String },

    #[error("Invalid state blob: {reason}")]
    InvalidState { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FxError {
    /// Build a load error for `path` from an I/O failure.
    pub(crate) fn load_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FxError::Load {
            path: path.into(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// Build a load error for `path` with a plain message.
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FxError::Load {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::Load { .. } => "LOAD_ERROR",
            FxError::Parse { .. } => "PARSE_ERROR",
            FxError::Compile { .. } => "COMPILE_ERROR",
            FxError::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED",
            FxError::InvalidHandle { .. } => "INVALID_HANDLE",
            FxError::RoleViolation { .. } => "ROLE_VIOLATION",
            FxError::InvalidBank { .. } => "INVALID_BANK",
            FxError::InvalidState { .. } => "INVALID_STATE",
            FxError::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the effect usable as it was before the call.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FxError::ResourceExhausted { .. } => true,
            FxError::InvalidHandle { .. } => true,
            FxError::RoleViolation { .. } => true,
            FxError::InvalidBank { .. } => true,
            FxError::InvalidState { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = FxError::Parse {
            line: 3,
            message: "bad".to_string(),
        };
        assert_eq!(err.error_code(), "PARSE_ERROR");
        assert_eq!(err.to_string(), "Parse error at line 3: bad");
    }

    #[test]
    fn test_compile_error_message_names_section() {
        let err = FxError::Compile {
            section: SectionKind::Sample,
            line: 12,
            message: "syntax error".to_string(),
        };
        assert!(err.to_string().contains("@sample"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_role_violation_is_recoverable() {
        let err = FxError::RoleViolation {
            expected: Role::Audio,
            actual: Role::Drawing,
        };
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "ROLE_VIOLATION");
    }
}
