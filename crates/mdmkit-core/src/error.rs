// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for mdmkit.

use thiserror::Error;

/// Top-level error type for all mdmkit operations.
///
/// Only [`MdmError::Precondition`] and genuine operational failures reach the
/// JS side as rejected promises. "Not supported here" is normalised to an
/// empty/false value by the module facade before it gets that far.
#[derive(Debug, Error)]
pub enum MdmError {
    // -- Runtime bridge --
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("feature not available on this platform")]
    UnsupportedPlatform,

    #[error("observer registration failed: {0}")]
    ObserverRegistration(String),

    #[error("platform bridge error: {0}")]
    Bridge(String),

    // -- Build-time schema --
    #[error("invalid restriction schema: {0}")]
    Schema(String),

    #[error("property list error: {0}")]
    Plist(#[from] plist::Error),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MdmError {
    /// Stable code handed to the JS host alongside the message, so callers
    /// can branch on the failure kind without parsing text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "ERR_PRECONDITION",
            Self::UnsupportedPlatform => "ERR_UNSUPPORTED_PLATFORM",
            Self::ObserverRegistration(_) => "ERR_OBSERVER_REGISTRATION",
            Self::Bridge(_) => "ERR_BRIDGE",
            Self::Schema(_) => "ERR_SCHEMA",
            Self::Plist(_) => "ERR_PLIST",
            Self::Io(_) => "ERR_IO",
            Self::Serialization(_) => "ERR_SERIALIZATION",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MdmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_message_and_code() {
        let err = MdmError::Precondition("no foreground activity".into());
        assert_eq!(err.to_string(), "precondition failed: no foreground activity");
        assert_eq!(err.error_code(), "ERR_PRECONDITION");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: MdmError = io.into();
        assert_eq!(err.error_code(), "ERR_IO");
        assert!(err.to_string().contains("gone"));
    }
}
