//! Error types for the session crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StorageError`: A key/value tier could not be read or written
//! - `SessionError`: A session-level operation failed (wraps storage reports)

use crate::storage::StorageTier;
use std::fmt;

/// Errors from a key/value storage tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The tier is not available in this environment.
    Unavailable { tier: StorageTier, reason: String },
    /// Reading a key failed.
    ReadFailed { key: String, reason: String },
    /// Writing or removing a key failed.
    WriteFailed { key: String, reason: String },
    /// The backing file holds data that is not a string map.
    Corrupt { reason: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { tier, reason } => {
                write!(f, "{tier} storage unavailable: {reason}")
            }
            Self::ReadFailed { key, reason } => {
                write!(f, "failed to read '{key}': {reason}")
            }
            Self::WriteFailed { key, reason } => {
                write!(f, "failed to write '{key}': {reason}")
            }
            Self::Corrupt { reason } => {
                write!(f, "storage data is corrupt: {reason}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Persisting the session failed.
    WriteFailed { tier: StorageTier },
    /// Reading the session failed.
    ReadFailed { tier: StorageTier },
    /// One or more keys could not be removed while clearing.
    ClearFailed { failed_keys: usize },
    /// Migrating legacy keys failed.
    MigrationFailed { tier: StorageTier },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed { tier } => {
                write!(f, "failed to write session to {tier} storage")
            }
            Self::ReadFailed { tier } => {
                write!(f, "failed to read session from {tier} storage")
            }
            Self::ClearFailed { failed_keys } => {
                write!(f, "failed to clear {failed_keys} session key(s)")
            }
            Self::MigrationFailed { tier } => {
                write!(f, "failed to migrate legacy keys in {tier} storage")
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_write_failed_display() {
        let err = StorageError::WriteFailed {
            key: "auth.access_token".to_string(),
            reason: "quota exceeded".to_string(),
        };
        assert!(err.to_string().contains("auth.access_token"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn storage_error_unavailable_names_tier() {
        let err = StorageError::Unavailable {
            tier: StorageTier::PerSession,
            reason: "no window".to_string(),
        };
        assert!(err.to_string().contains("per-session"));
    }

    #[test]
    fn session_error_clear_failed_display() {
        let err = SessionError::ClearFailed { failed_keys: 3 };
        assert!(err.to_string().contains('3'));
    }
}
