//! Error types for password locks.
//!
//! The one distinction callers must be able to make is between a wrong
//! password ([`LockError::BadCredentials`], worth asking again) and every
//! other failure, which no amount of re-prompting will fix.

use sealwright_crypto::CryptoError;
use thiserror::Error;

use crate::lock::PayloadKind;

/// Errors from lock creation, resolution and password management
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The password does not open this lock
    #[error("bad credentials")]
    BadCredentials,

    /// No usable password was supplied (empty, or entry was cancelled)
    #[error("invalid password: {reason}")]
    InvalidPassword {
        /// Why no password could be used
        reason: String,
    },

    /// The lock spec is outside its legal range
    #[error("invalid lock spec: {reason}")]
    InvalidSpec {
        /// What made the spec invalid
        reason: String,
    },

    /// The lock protects a different kind of payload than was requested
    #[error("lock holds a {actual} payload, expected {expected}")]
    KindMismatch {
        /// Kind the caller asked to resolve
        expected: PayloadKind,
        /// Kind recorded in the lock
        actual: PayloadKind,
    },

    /// Lock envelope version is not understood
    #[error("unsupported lock version: {0}")]
    UnsupportedVersion(u8),

    /// Lock bytes are malformed or the sealed payload failed authentication
    #[error("corrupt lock: {reason}")]
    Corrupt {
        /// Description of the corruption
        reason: String,
    },

    /// Payload encoding or obfuscation failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl LockError {
    /// Returns true if this error means the password was wrong.
    ///
    /// Bad credentials are the only recoverable lock failure: the retry loop
    /// and known-password attempts swallow them and move on.
    pub fn is_bad_credentials(&self) -> bool {
        matches!(self, Self::BadCredentials)
    }

    /// Returns true if retrying with the same input can never succeed.
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::BadCredentials => false,
            Self::InvalidPassword { .. }
            | Self::InvalidSpec { .. }
            | Self::KindMismatch { .. }
            | Self::UnsupportedVersion(_)
            | Self::Corrupt { .. } => true,
            Self::Crypto(err) => err.is_data_error(),
        }
    }
}
