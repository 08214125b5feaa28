//! Sealwright Key Agreement
//!
//! Decides which key derivation functions and agreement schemes may be
//! combined with each keypair family, and runs a two-party handshake over a
//! validated combination.
//!
//! # Architecture
//!
//! ```text
//! AgreementSpec ──► matrix (is_supported_kdf / is_supported_agreement)
//!       │
//!       ▼
//! Handshake ──► AgreementEngine (raw secret Z) ──► kdf::derive ──► result
//!       │
//!       └──► HMAC-SHA256 confirmation tags (confirming specs only)
//! ```
//!
//! # Error Classes
//!
//! [`AgreementError::is_fatal`] marks caller bugs (wrong-state calls,
//! unsupported combinations reaching execution). Everything else is a data
//! error caused by the peer.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod engine;
pub mod error;
pub mod handshake;
pub mod kdf;
pub mod matrix;
pub mod spec;
pub mod types;

pub use engine::{AgreementEngine, Role, X25519Engine};
pub use error::AgreementError;
pub use handshake::{AgreementStatus, Handshake};
pub use matrix::{is_supported_agreement, is_supported_kdf, supported_agreements, supported_kdfs};
pub use spec::AgreementSpec;
pub use types::{AgreementType, KdfFamily, KdfType};
