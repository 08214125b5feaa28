//! CLI error types.

use sealwright_agree::AgreementError;
use sealwright_crypto::CryptoError;
use sealwright_lock::LockError;
use thiserror::Error;

/// Errors surfaced by a CLI command.
#[derive(Error, Debug)]
pub enum CliError {
    /// Lock creation or resolution failed
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Payload handling failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Key agreement failed
    #[error(transparent)]
    Agreement(#[from] AgreementError),

    /// Reading or writing a file failed
    #[error("{path}: {source}")]
    File {
        /// File being accessed
        path: String,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Writing command output failed
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    /// Flags are inconsistent
    #[error("configuration error: {0}")]
    Config(String),
}
