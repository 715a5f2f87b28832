//! Transfer error types.
//!
//! Every variant serializes cleanly: non-serializable sources like
//! `std::io::Error` are captured as kind/message strings so errors can
//! cross FFI and REST boundaries unchanged.
//!
//! The `is_recoverable` partition is what the engine keys its control flow
//! on: a recoverable item failure is recorded and the queue moves on, an
//! unrecoverable one stops the remaining queue and clears resumability.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for transfer operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferError {
    /// I/O error while reading or writing blob files.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "not found", "permission denied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// Network/HTTP error while talking to the vault.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// Transfer was interrupted mid-item and can be retried.
    #[error("Transfer interrupted at {bytes_transferred} bytes")]
    Interrupted {
        /// Bytes moved before the interruption.
        bytes_transferred: u64,
    },

    /// Destination cannot hold the blob.
    #[error("Insufficient space on destination: need {needed} bytes, {available} available")]
    InsufficientSpace {
        /// Bytes required for the blob.
        needed: u64,
        /// Bytes free at the destination.
        available: u64,
    },

    /// Integrity check failed (checksum mismatch).
    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailed {
        /// Expected checksum.
        expected: String,
        /// Actual checksum computed.
        actual: String,
    },

    /// Transfer was cancelled.
    #[error("Transfer cancelled")]
    Cancelled,

    /// An operation is already running on this runner.
    #[error("A transfer operation is already in progress")]
    OperationInProgress,

    /// Retry requested but the previous run left nothing to retry.
    #[error("No failed items to retry")]
    NothingToRetry,

    /// Retry requested but the previous run failed unrecoverably.
    #[error("Previous operation is not resumable")]
    NotResumable,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl TransferError {
    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    ///
    /// This captures the error kind name and message for serialization.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an interrupted error.
    #[must_use]
    pub const fn interrupted(bytes_transferred: u64) -> Self {
        Self::Interrupted { bytes_transferred }
    }

    /// Create an insufficient space error.
    #[must_use]
    pub const fn insufficient_space(needed: u64, available: u64) -> Self {
        Self::InsufficientSpace { needed, available }
    }

    /// Create an integrity check failed error.
    pub fn integrity_failed(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IntegrityFailed {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this failure is recoverable (the item can be retried).
    ///
    /// Anything outside this set stops the remaining queue: retrying after
    /// a full destination or a checksum mismatch only repeats the failure.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Interrupted { .. } | Self::Io { .. }
        )
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error signals a caller contract violation rather than
    /// a transfer failure.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::OperationInProgress | Self::NothingToRetry | Self::NotResumable
        )
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::Network {
                message,
                status_code: Some(code),
            } => {
                format!("Network error (HTTP {code}): {message}")
            }
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::Interrupted { bytes_transferred } => {
                format!("Transfer interrupted after {bytes_transferred} bytes. You can retry it.")
            }
            Self::InsufficientSpace { needed, available } => {
                format!(
                    "The destination is out of space: {needed} bytes needed, {available} free."
                )
            }
            Self::IntegrityFailed { .. } => {
                "Integrity check failed. The transferred blob may be corrupted.".to_string()
            }
            Self::Cancelled => "Transfer was cancelled.".to_string(),
            Self::OperationInProgress => {
                "Another transfer operation is already running.".to_string()
            }
            Self::NothingToRetry => "There are no failed items to retry.".to_string(),
            Self::NotResumable => {
                "The previous operation failed unrecoverably and cannot be resumed.".to_string()
            }
            Self::Other { message } => message.clone(),
        }
    }
}

/// Convenience result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = TransferError::from_io_error(&io_err);

        match err {
            TransferError::Io { kind, message } => {
                assert_eq!(kind, "NotFound");
                assert!(message.contains("file not found"));
            }
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_error_serialization() {
        let err = TransferError::network_with_status("timeout", 408);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("408"));
        assert!(json.contains("timeout"));

        let parsed: TransferError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(TransferError::network("timeout").is_recoverable());
        assert!(TransferError::interrupted(100).is_recoverable());
        assert!(TransferError::io("TimedOut", "socket timed out").is_recoverable());

        assert!(!TransferError::insufficient_space(10, 2).is_recoverable());
        assert!(!TransferError::integrity_failed("aa", "bb").is_recoverable());
        assert!(!TransferError::Cancelled.is_recoverable());
        assert!(!TransferError::other("boom").is_recoverable());
    }

    #[test]
    fn test_contract_violations_are_not_item_failures() {
        assert!(TransferError::OperationInProgress.is_contract_violation());
        assert!(TransferError::NothingToRetry.is_contract_violation());
        assert!(TransferError::NotResumable.is_contract_violation());
        assert!(!TransferError::network("timeout").is_contract_violation());
    }

    #[test]
    fn test_user_messages() {
        let err = TransferError::insufficient_space(4096, 512);
        assert!(err.user_message().contains("4096"));
        assert!(err.user_message().contains("out of space"));
    }
}
