//! Locks and the payloads they protect.
//!
//! A [`Lock`] is an opaque byte sequence plus the parsed
//! [`PasswordLockSpec`] and [`PayloadKind`] needed to interpret it. The bytes
//! are a CBOR envelope:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ version        u8                                        │
//! │ kind           i32   obfuscated PayloadKind              │
//! │ k_iterations   u8                                        │
//! │ sym_key_type   i32   obfuscated SymKeyType               │
//! │ cipher_steps   u8                                        │
//! │ salt           [u8; 32]                                  │
//! │ verifier       [u8; 32]  HMAC-SHA256 over the header     │
//! │ sealed         bytes     keyset cascade over the payload │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything above `verifier` is the header. It is both MAC'd by the
//! verifier and bound as associated data into every cascade step, so a
//! header edit surfaces as either bad credentials or a corrupt lock.

use std::fmt;

use sealwright_crypto::{
    CryptoError, Factory, KeyPair, KeySet, KeySetSpec, KnuthObfuscator, Obfuscatable, SymKeyType,
    codec,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{error::LockError, spec::PasswordLockSpec};

/// Current envelope version
pub const LOCK_VERSION: u8 = 1;

/// Size of the per-lock PBKDF2 salt
pub const SALT_SIZE: usize = 32;

/// Size of the HMAC-SHA256 verifier
pub const VERIFIER_SIZE: usize = 32;

/// Adjustment applied when obfuscating the payload kind
const KIND_ADJUSTMENT: i32 = 0x4C4B;

/// Adjustment applied when obfuscating the wrapping algorithm
const SYM_ADJUSTMENT: i32 = 0x4C53;

/// Kind of payload held by a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    /// A [`Factory`]
    Factory,
    /// A [`KeySet`]
    KeySet,
    /// A [`KeyPair`]
    KeyPair,
}

impl Obfuscatable for PayloadKind {
    const CLASS: u16 = 4;
    const NAME: &'static str = "PayloadKind";
    const ALL: &'static [Self] = &[Self::Factory, Self::KeySet, Self::KeyPair];
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Factory => "factory",
            Self::KeySet => "keyset",
            Self::KeyPair => "keypair",
        })
    }
}

/// A password lock.
///
/// Immutable once created. Two locks over the same payload and password
/// differ because every lock draws a fresh salt.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Lock {
    bytes: Vec<u8>,
    spec: PasswordLockSpec,
    kind: PayloadKind,
}

impl Lock {
    pub(crate) fn new(bytes: Vec<u8>, spec: PasswordLockSpec, kind: PayloadKind) -> Self {
        Self { bytes, spec, kind }
    }

    /// Persistable lock bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the lock, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Spec the lock was created with.
    pub fn spec(&self) -> PasswordLockSpec {
        self.spec
    }

    /// Kind of payload behind the lock.
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }
}

impl AsRef<[u8]> for Lock {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("kind", &self.kind)
            .field("spec", &self.spec)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A resolved payload of any kind.
#[derive(Debug, Clone)]
pub enum ResolvedPayload {
    /// Resolved factory
    Factory(Factory),
    /// Resolved keyset
    KeySet(KeySet),
    /// Resolved keypair
    KeyPair(KeyPair),
}

impl ResolvedPayload {
    /// Kind of the held payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Factory(_) => PayloadKind::Factory,
            Self::KeySet(_) => PayloadKind::KeySet,
            Self::KeyPair(_) => PayloadKind::KeyPair,
        }
    }
}

/// A payload type that can be placed under a password lock.
pub trait Lockable: Clone + Sized {
    /// Kind tag written into the envelope
    const KIND: PayloadKind;

    /// Serialize the payload for sealing.
    fn to_payload(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Restore the payload after unsealing.
    fn from_payload(bytes: &[u8]) -> Result<Self, CryptoError>;

    /// Wrap into the kind-erased form kept by the cache.
    fn into_resolved(self) -> ResolvedPayload;

    /// Borrow back out of the kind-erased form. `None` on kind mismatch.
    fn from_resolved(resolved: &ResolvedPayload) -> Option<Self>;
}

impl Lockable for Factory {
    const KIND: PayloadKind = PayloadKind::Factory;

    fn to_payload(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.to_bytes()
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_bytes(bytes)
    }

    fn into_resolved(self) -> ResolvedPayload {
        ResolvedPayload::Factory(self)
    }

    fn from_resolved(resolved: &ResolvedPayload) -> Option<Self> {
        match resolved {
            ResolvedPayload::Factory(factory) => Some(factory.clone()),
            _ => None,
        }
    }
}

impl Lockable for KeySet {
    const KIND: PayloadKind = PayloadKind::KeySet;

    fn to_payload(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.to_bytes()
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_bytes(bytes)
    }

    fn into_resolved(self) -> ResolvedPayload {
        ResolvedPayload::KeySet(self)
    }

    fn from_resolved(resolved: &ResolvedPayload) -> Option<Self> {
        match resolved {
            ResolvedPayload::KeySet(key_set) => Some(key_set.clone()),
            _ => None,
        }
    }
}

impl Lockable for KeyPair {
    const KIND: PayloadKind = PayloadKind::KeyPair;

    fn to_payload(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.to_bytes()
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_bytes(bytes)
    }

    fn into_resolved(self) -> ResolvedPayload {
        ResolvedPayload::KeyPair(self)
    }

    fn from_resolved(resolved: &ResolvedPayload) -> Option<Self> {
        match resolved {
            ResolvedPayload::KeyPair(key_pair) => Some(key_pair.clone()),
            _ => None,
        }
    }
}

/// Persisted lock layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LockEnvelope {
    pub version: u8,
    pub kind: i32,
    pub k_iterations: u8,
    pub sym_key_type: i32,
    pub cipher_steps: u8,
    pub salt: [u8; SALT_SIZE],
    pub verifier: [u8; VERIFIER_SIZE],
    pub sealed: Vec<u8>,
}

impl LockEnvelope {
    /// Start an envelope for `kind` under `spec`; verifier and sealed payload
    /// are filled in by the lock factory.
    pub fn new(
        obfuscator: &KnuthObfuscator,
        kind: PayloadKind,
        spec: PasswordLockSpec,
        salt: [u8; SALT_SIZE],
    ) -> Self {
        let key_set_spec = spec.key_set_spec();
        Self {
            version: LOCK_VERSION,
            kind: obfuscator.encode_adjusted(kind, KIND_ADJUSTMENT),
            k_iterations: spec.k_iterations(),
            sym_key_type: obfuscator.encode_adjusted(key_set_spec.sym_key_type(), SYM_ADJUSTMENT),
            cipher_steps: key_set_spec.cipher_steps(),
            salt,
            verifier: [0u8; VERIFIER_SIZE],
            sealed: Vec::new(),
        }
    }

    /// Decode lock bytes, rejecting unknown versions.
    pub fn decode(bytes: &[u8]) -> Result<Self, LockError> {
        let envelope: Self = codec::decode(bytes)
            .map_err(|err| LockError::Corrupt { reason: err.to_string() })?;

        if envelope.version != LOCK_VERSION {
            return Err(LockError::UnsupportedVersion(envelope.version));
        }

        Ok(envelope)
    }

    /// Encode to lock bytes.
    pub fn encode(&self) -> Result<Vec<u8>, LockError> {
        Ok(codec::encode(self)?)
    }

    /// Recover the payload kind.
    pub fn kind(&self, obfuscator: &KnuthObfuscator) -> Result<PayloadKind, LockError> {
        Ok(obfuscator.decode_adjusted(self.kind, KIND_ADJUSTMENT)?)
    }

    /// Recover and validate the lock spec.
    pub fn spec(&self, obfuscator: &KnuthObfuscator) -> Result<PasswordLockSpec, LockError> {
        let sym_key_type: SymKeyType =
            obfuscator.decode_adjusted(self.sym_key_type, SYM_ADJUSTMENT)?;
        let spec = PasswordLockSpec::new(
            self.k_iterations,
            KeySetSpec::new(sym_key_type, self.cipher_steps),
        );
        spec.validate()?;
        Ok(spec)
    }

    /// Header bytes covered by the verifier and bound into the cascade.
    pub fn header(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(1 + 4 + 1 + 4 + 1 + SALT_SIZE);
        header.push(self.version);
        header.extend_from_slice(&self.kind.to_be_bytes());
        header.push(self.k_iterations);
        header.extend_from_slice(&self.sym_key_type.to_be_bytes());
        header.push(self.cipher_steps);
        header.extend_from_slice(&self.salt);
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> LockEnvelope {
        LockEnvelope::new(
            &KnuthObfuscator::default(),
            PayloadKind::KeySet,
            PasswordLockSpec::default(),
            [0x11; SALT_SIZE],
        )
    }

    #[test]
    fn envelope_recovers_kind_and_spec() {
        let obfuscator = KnuthObfuscator::default();
        let envelope = sample_envelope();

        assert_eq!(envelope.kind(&obfuscator).unwrap(), PayloadKind::KeySet);
        assert_eq!(envelope.spec(&obfuscator).unwrap(), PasswordLockSpec::default());
    }

    #[test]
    fn kind_is_not_written_in_clear() {
        let envelope = sample_envelope();
        for ordinal in 0..3 {
            assert_ne!(envelope.kind, ordinal);
        }
    }

    #[test]
    fn foreign_obfuscator_cannot_read_kind() {
        let envelope = sample_envelope();
        let foreign = KnuthObfuscator::personalised(b"someone else");

        assert!(envelope.kind(&foreign).is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut envelope = sample_envelope();
        envelope.version = 2;
        let bytes = envelope.encode().unwrap();

        assert_eq!(LockEnvelope::decode(&bytes).unwrap_err(), LockError::UnsupportedVersion(2));
    }

    #[test]
    fn garbage_is_corrupt() {
        let result = LockEnvelope::decode(b"definitely not cbor");
        assert!(matches!(result, Err(LockError::Corrupt { .. })));
    }

    #[test]
    fn out_of_range_spec_is_rejected() {
        let mut envelope = sample_envelope();
        envelope.cipher_steps = 0;

        let result = envelope.spec(&KnuthObfuscator::default());
        assert!(matches!(result, Err(LockError::InvalidSpec { .. })));
    }

    #[test]
    fn header_covers_every_preamble_field() {
        let base = sample_envelope();

        let mut salted = base.clone();
        salted.salt[0] ^= 1;
        let mut stepped = base.clone();
        stepped.cipher_steps = 2;
        let mut worked = base.clone();
        worked.k_iterations = 17;

        assert_ne!(base.header(), salted.header());
        assert_ne!(base.header(), stepped.header());
        assert_ne!(base.header(), worked.header());
    }

    #[test]
    fn resolved_payload_kind_dispatch() {
        let key_set =
            KeySet::from_seed(KeySetSpec::default(), &[3u8; 32]).unwrap().into_resolved();

        assert_eq!(key_set.kind(), PayloadKind::KeySet);
        assert!(KeySet::from_resolved(&key_set).is_some());
        assert!(KeyPair::from_resolved(&key_set).is_none());
        assert!(Factory::from_resolved(&key_set).is_none());
    }
}
