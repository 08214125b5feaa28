//! Error types for payload and obfuscation operations

use thiserror::Error;

/// Errors from keyset, keypair, factory and obfuscation operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Authenticated decryption failed (wrong key or tampered data)
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for decryption failure
        reason: String,
    },

    /// Invalid key material length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// A spec value is outside its legal range
    #[error("invalid spec: {reason}")]
    InvalidSpec {
        /// What made the spec invalid
        reason: String,
    },

    /// An obfuscated identifier does not name a member of the enumeration
    #[error("unrecognised {enumeration} identifier: {id:#010x}")]
    UnknownIdentifier {
        /// Name of the enumeration that was being decoded
        enumeration: &'static str,
        /// The identifier as persisted
        id: i32,
    },

    /// A type name could not be parsed
    #[error("unknown {enumeration} name: {name}")]
    UnknownName {
        /// Name of the enumeration that was being parsed
        enumeration: &'static str,
        /// The rejected input
        name: String,
    },

    /// Serialized payload could not be encoded or decoded
    #[error("encoding error: {reason}")]
    Encoding {
        /// Underlying codec failure
        reason: String,
    },
}

impl CryptoError {
    /// Returns true if this error means persisted data is corrupt or foreign.
    ///
    /// Data errors are terminal: retrying with the same input cannot succeed.
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::DecryptionFailed { .. }
            | Self::UnknownIdentifier { .. }
            | Self::Encoding { .. }
            | Self::InvalidKeyLength { .. } => true,

            Self::InvalidSpec { .. } | Self::UnknownName { .. } => false,
        }
    }
}
