//! Error types for key agreement.
//!
//! Agreement failures split into two classes:
//!
//! - **Logic errors** are caller bugs: a method called in the wrong state, a
//!   spec the matrix rejects reaching execution, the wrong kind of keypair.
//!   They are fatal and never retried.
//! - **Data errors** come from the peer: malformed messages, a mismatched
//!   spec, a confirmation tag that does not verify.

use sealwright_crypto::CryptoError;
use thiserror::Error;

use crate::handshake::AgreementStatus;

/// Errors from the compatibility matrix, KDFs and the handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgreementError {
    /// Handshake method called from the wrong state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// State when the call was made
        state: AgreementStatus,
        /// Operation that was attempted
        operation: String,
    },

    /// Spec is invalid or cannot be executed by this engine
    #[error("unsupported agreement: {reason}")]
    UnsupportedSpec {
        /// Which check rejected the spec
        reason: String,
    },

    /// Keypair has the wrong family or lacks a required private key
    #[error("invalid keypair: {reason}")]
    InvalidKeyPair {
        /// What was wrong with the keypair
        reason: String,
    },

    /// Requested key material cannot be produced by the KDF
    #[error("kdf error: {reason}")]
    Kdf {
        /// Why derivation failed
        reason: String,
    },

    /// Peer message could not be parsed or has the wrong shape
    #[error("malformed message: {reason}")]
    MalformedMessage {
        /// Parse or shape failure
        reason: String,
    },

    /// Peer is running a different agreement spec
    #[error("spec mismatch: {reason}")]
    SpecMismatch {
        /// Which field disagreed
        reason: String,
    },

    /// Peer message version is not understood
    #[error("unsupported message version: {0}")]
    UnsupportedVersion(u8),

    /// Key confirmation tag did not verify
    #[error("key confirmation failed")]
    ConfirmationFailed,

    /// Identifier decoding or encoding failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl AgreementError {
    /// Returns true for caller bugs that must never be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. }
                | Self::UnsupportedSpec { .. }
                | Self::InvalidKeyPair { .. }
                | Self::Kdf { .. }
        )
    }

    /// Returns true for failures caused by peer data.
    pub fn is_data_error(&self) -> bool {
        !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_violations_are_fatal() {
        let err = AgreementError::InvalidState {
            state: AgreementStatus::Init,
            operation: "accept_server_hello".to_string(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_data_error());
        assert!(AgreementError::UnsupportedSpec { reason: "x".to_string() }.is_fatal());
    }

    #[test]
    fn peer_failures_are_data_errors() {
        assert!(AgreementError::ConfirmationFailed.is_data_error());
        assert!(AgreementError::UnsupportedVersion(3).is_data_error());
        assert!(AgreementError::MalformedMessage { reason: "eof".to_string() }.is_data_error());
        assert!(AgreementError::SpecMismatch { reason: "kdf".to_string() }.is_data_error());
    }

    #[test]
    fn invalid_state_message_names_operation() {
        let err = AgreementError::InvalidState {
            state: AgreementStatus::Complete,
            operation: "create_client_hello".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition: cannot create_client_hello from Complete"
        );
    }
}
