//! Sealwright Cryptographic Payloads
//!
//! The securable payload types of the suite and the primitives that protect
//! them. Everything that draws randomness takes an [`Environment`], so tests
//! and fuzzers can reproduce every salt and nonce.
//!
//! # Payloads
//!
//! Three kinds of object can be placed under a password lock:
//!
//! - [`Factory`]: provider root (type tag + security seed)
//! - [`KeySet`]: cascade of symmetric AEAD keys
//! - [`KeyPair`]: asymmetric key material for one algorithm family
//!
//! ```text
//! Factory seed
//!        │
//!        ├──► HKDF → personalised obfuscation constants
//!        │
//!        └──► HKDF → derived KeySets
//!
//! KeySet seed ──► HKDF → step keys ──► AEAD cascade
//! ```
//!
//! # Identifier Obfuscation
//!
//! Algorithm types written into persisted structures go through
//! [`KnuthObfuscator`]. It detects corruption and enumeration mismatches but
//! is not an authentication mechanism.
//!
//! # Security
//!
//! - Key material lives in `Zeroizing` buffers and is wiped on drop
//! - `Debug` output never includes key bytes
//! - AEAD failures collapse to a single `DecryptionFailed` error per step

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod env;
pub mod error;
pub mod factory;
pub mod keypair;
pub mod keyset;
pub mod obfuscation;

pub use env::{Environment, SystemEnv};
pub use error::CryptoError;
pub use factory::{Factory, FactoryType};
pub use keypair::{KeyPair, KeyPairType};
pub use keyset::{KeySet, KeySetSpec, SymKeyType};
pub use obfuscation::{KnuthObfuscator, Obfuscatable};
