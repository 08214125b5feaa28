//! Sealwright Password Locks
//!
//! Turns a user password into durable protection for a [`Factory`],
//! [`KeySet`] or [`KeyPair`], and remembers which passwords opened which
//! locks so that a store full of locks sharing one password prompts only
//! once.
//!
//! # Layers
//!
//! ```text
//! PasswordManager ── DialogController (application prompt)
//!        │
//!        ▼
//! PasswordCache   ── exact lookup, then known passwords
//!        │
//!        ▼
//! LockFactory     ── PBKDF2 + HKDF + HMAC verifier + keyset cascade
//! ```
//!
//! # Errors
//!
//! [`LockError::BadCredentials`] is the only recoverable failure. It is
//! swallowed by the retry loop and by known-password attempts; every other
//! error ends the operation.
//!
//! [`Factory`]: sealwright_crypto::Factory
//! [`KeySet`]: sealwright_crypto::KeySet
//! [`KeyPair`]: sealwright_crypto::KeyPair

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cache;
pub mod error;
pub mod factory;
pub mod lock;
pub mod manager;
pub mod spec;

pub use cache::PasswordCache;
pub use error::LockError;
pub use factory::LockFactory;
pub use lock::{Lock, Lockable, PayloadKind, ResolvedPayload};
pub use manager::{
    DialogController, PasswordBuffer, PasswordManager, PasswordManagerConfig, RetryPolicy,
};
pub use spec::PasswordLockSpec;
