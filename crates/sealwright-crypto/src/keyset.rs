//! Symmetric keysets.
//!
//! A [`KeySet`] bundles several independent AEAD keys that are applied as a
//! cascade: each step encrypts the output of the previous one under its own
//! key and a fresh random nonce. Compromise of a single step key does not
//! expose the plaintext.
//!
//! ```text
//! plaintext ──► step 0 ──► step 1 ──► … ──► step n-1 ──► ciphertext
//!               nonce0|ct0  nonce1|ct1        nonce(n-1)|ct(n-1)
//! ```
//!
//! Step keys are derived from a single 32-byte seed with HKDF, so a keyset is
//! fully reproducible from `(spec, seed)`. Lock wrapping relies on this: the
//! wrapping keyset is rebuilt from a password-derived seed on every resolve.

use std::{fmt, str::FromStr};

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{codec, env::Environment, error::CryptoError, obfuscation::Obfuscatable};

/// Label used for step key derivation
const STEP_KEY_LABEL: &[u8] = b"sealwrightKeySetV1";

/// Size of every step key
pub const KEY_SIZE: usize = 32;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// Symmetric AEAD algorithm used by every step of a keyset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SymKeyType {
    /// ChaCha20-Poly1305 with a 96-bit nonce
    ChaCha20Poly1305,
    /// XChaCha20-Poly1305 with a 192-bit nonce
    XChaCha20Poly1305,
}

impl SymKeyType {
    /// Nonce length for this algorithm in bytes.
    pub fn nonce_len(self) -> usize {
        match self {
            Self::ChaCha20Poly1305 => 12,
            Self::XChaCha20Poly1305 => 24,
        }
    }

    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ChaCha20Poly1305 => "chacha20poly1305",
            Self::XChaCha20Poly1305 => "xchacha20poly1305",
        }
    }
}

impl Obfuscatable for SymKeyType {
    const CLASS: u16 = 1;
    const NAME: &'static str = "SymKeyType";
    const ALL: &'static [Self] = &[Self::ChaCha20Poly1305, Self::XChaCha20Poly1305];
}

impl fmt::Display for SymKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SymKeyType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CryptoError::UnknownName {
                enumeration: Self::NAME,
                name: s.to_string(),
            })
    }
}

/// Shape of a keyset: algorithm and number of cascade steps.
///
/// # Invariants
///
/// A spec is valid iff `cipher_steps` is within
/// [`KeySetSpec::MIN_CIPHER_STEPS`]..=[`KeySetSpec::MAX_CIPHER_STEPS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeySetSpec {
    sym_key_type: SymKeyType,
    cipher_steps: u8,
}

impl KeySetSpec {
    /// Fewest cascade steps allowed
    pub const MIN_CIPHER_STEPS: u8 = 1;
    /// Most cascade steps allowed
    pub const MAX_CIPHER_STEPS: u8 = 5;
    /// Steps used by [`KeySetSpec::default`]
    pub const DEFAULT_CIPHER_STEPS: u8 = 3;

    /// Create a spec. The result may be invalid; check with
    /// [`KeySetSpec::is_valid`].
    pub fn new(sym_key_type: SymKeyType, cipher_steps: u8) -> Self {
        Self { sym_key_type, cipher_steps }
    }

    /// AEAD algorithm for every step.
    pub fn sym_key_type(&self) -> SymKeyType {
        self.sym_key_type
    }

    /// Number of cascade steps.
    pub fn cipher_steps(&self) -> u8 {
        self.cipher_steps
    }

    /// True if the step count is in range.
    pub fn is_valid(&self) -> bool {
        (Self::MIN_CIPHER_STEPS..=Self::MAX_CIPHER_STEPS).contains(&self.cipher_steps)
    }

    /// Reject an invalid spec.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CryptoError::InvalidSpec {
                reason: format!(
                    "cipher steps {} outside {}..={}",
                    self.cipher_steps,
                    Self::MIN_CIPHER_STEPS,
                    Self::MAX_CIPHER_STEPS
                ),
            })
        }
    }
}

impl Default for KeySetSpec {
    fn default() -> Self {
        Self::new(SymKeyType::XChaCha20Poly1305, Self::DEFAULT_CIPHER_STEPS)
    }
}

impl fmt::Display for KeySetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.sym_key_type, self.cipher_steps)
    }
}

/// A cascade of symmetric AEAD keys treated as one securable unit.
///
/// Key material is zeroized on drop.
#[derive(Clone)]
pub struct KeySet {
    spec: KeySetSpec,
    keys: Vec<Zeroizing<[u8; KEY_SIZE]>>,
}

/// Persisted form of a keyset (spec plus raw step keys)
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeySetRecord {
    #[zeroize(skip)]
    spec: KeySetSpec,
    keys: Vec<[u8; KEY_SIZE]>,
}

impl KeySet {
    /// Generate a keyset with fresh random key material.
    pub fn generate<E: Environment>(spec: KeySetSpec, env: &E) -> Result<Self, CryptoError> {
        let seed = Zeroizing::new(env.random_array::<KEY_SIZE>());
        Self::from_seed(spec, &seed)
    }

    /// Derive a keyset deterministically from a 32-byte seed.
    ///
    /// Same `(spec, seed)` always yields the same step keys. Different step
    /// indices and algorithms produce unrelated keys.
    pub fn from_seed(spec: KeySetSpec, seed: &[u8; KEY_SIZE]) -> Result<Self, CryptoError> {
        spec.validate()?;

        let hkdf = Hkdf::<Sha256>::new(None, seed);
        let keys = (0..spec.cipher_steps)
            .map(|step| {
                // label || algorithm ordinal || step index
                let mut info = Vec::with_capacity(STEP_KEY_LABEL.len() + 2);
                info.extend_from_slice(STEP_KEY_LABEL);
                info.push(spec.sym_key_type.ordinal() as u8);
                info.push(step);

                let mut key = Zeroizing::new([0u8; KEY_SIZE]);
                let Ok(()) = hkdf.expand(&info, &mut key[..]) else {
                    unreachable!("32 bytes is a valid HKDF-SHA256 output length");
                };
                key
            })
            .collect();

        Ok(Self { spec, keys })
    }

    /// Shape of this keyset.
    pub fn spec(&self) -> KeySetSpec {
        self.spec
    }

    /// Encrypt `plaintext` through every step, binding `aad` to each layer.
    ///
    /// Output size is `plaintext.len() + steps * (nonce_len + 16)`.
    pub fn encrypt<E: Environment>(&self, plaintext: &[u8], aad: &[u8], env: &E) -> Vec<u8> {
        let sym = self.spec.sym_key_type;
        let mut data = plaintext.to_vec();

        for (step, key) in self.keys.iter().enumerate() {
            let mut nonce = vec![0u8; sym.nonce_len()];
            env.random_bytes(&mut nonce);

            let step_aad = step_aad(aad, step);
            let sealed = seal(sym, key, &nonce, &data, &step_aad);

            data.zeroize();
            nonce.extend_from_slice(&sealed);
            data = nonce;
        }

        data
    }

    /// Decrypt a ciphertext produced by [`KeySet::encrypt`] with the same
    /// `aad`.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed`: truncated input, wrong keyset, wrong `aad`, or
    ///   tampered ciphertext
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let sym = self.spec.sym_key_type;
        let mut data = Zeroizing::new(ciphertext.to_vec());

        for (step, key) in self.keys.iter().enumerate().rev() {
            if data.len() < sym.nonce_len() + POLY1305_TAG_SIZE {
                return Err(CryptoError::DecryptionFailed {
                    reason: format!("step {step}: ciphertext too short"),
                });
            }

            let (nonce, sealed) = data.split_at(sym.nonce_len());
            let step_aad = step_aad(aad, step);
            let opened = open(sym, key, nonce, sealed, &step_aad).ok_or_else(|| {
                CryptoError::DecryptionFailed {
                    reason: format!("step {step}: authentication failed"),
                }
            })?;

            data = Zeroizing::new(opened);
        }

        Ok(data)
    }

    /// Serialize the keyset including raw key material.
    ///
    /// The returned buffer is zeroized on drop; callers must only persist it
    /// under a lock.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let record =
            KeySetRecord { spec: self.spec, keys: self.keys.iter().map(|key| **key).collect() };
        codec::encode(&record).map(Zeroizing::new)
    }

    /// Restore a keyset serialized with [`KeySet::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let record: KeySetRecord = codec::decode(bytes)?;
        record.spec.validate()?;

        if record.keys.len() != usize::from(record.spec.cipher_steps) {
            return Err(CryptoError::Encoding {
                reason: format!(
                    "keyset declares {} steps but carries {} keys",
                    record.spec.cipher_steps,
                    record.keys.len()
                ),
            });
        }

        let keys = record.keys.iter().map(|key| Zeroizing::new(*key)).collect();
        Ok(Self { spec: record.spec, keys })
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet").field("spec", &self.spec).finish_non_exhaustive()
    }
}

/// Per-step associated data: caller aad || step index
fn step_aad(aad: &[u8], step: usize) -> Vec<u8> {
    let mut step_aad = Vec::with_capacity(aad.len() + 1);
    step_aad.extend_from_slice(aad);
    step_aad.push(step as u8);
    step_aad
}

fn seal(sym: SymKeyType, key: &[u8; KEY_SIZE], nonce: &[u8], msg: &[u8], aad: &[u8]) -> Vec<u8> {
    let payload = Payload { msg, aad };
    let sealed = match sym {
        SymKeyType::ChaCha20Poly1305 => {
            ChaCha20Poly1305::new(key.into()).encrypt(Nonce::from_slice(nonce), payload)
        },
        SymKeyType::XChaCha20Poly1305 => {
            XChaCha20Poly1305::new(key.into()).encrypt(XNonce::from_slice(nonce), payload)
        },
    };

    let Ok(sealed) = sealed else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    sealed
}

fn open(
    sym: SymKeyType,
    key: &[u8; KEY_SIZE],
    nonce: &[u8],
    sealed: &[u8],
    aad: &[u8],
) -> Option<Vec<u8>> {
    let payload = Payload { msg: sealed, aad };
    match sym {
        SymKeyType::ChaCha20Poly1305 => {
            ChaCha20Poly1305::new(key.into()).decrypt(Nonce::from_slice(nonce), payload).ok()
        },
        SymKeyType::XChaCha20Poly1305 => {
            XChaCha20Poly1305::new(key.into()).decrypt(XNonce::from_slice(nonce), payload).ok()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_utils::SeededEnv;

    fn test_seed() -> [u8; KEY_SIZE] {
        let mut seed = [0u8; KEY_SIZE];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = i as u8;
        }
        seed
    }

    #[test]
    fn default_spec_is_valid() {
        let spec = KeySetSpec::default();
        assert!(spec.is_valid());
        assert_eq!(spec.sym_key_type(), SymKeyType::XChaCha20Poly1305);
        assert_eq!(spec.cipher_steps(), 3);
    }

    #[test]
    fn step_bounds() {
        assert!(!KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 0).is_valid());
        assert!(KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 1).is_valid());
        assert!(KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 5).is_valid());
        assert!(!KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 6).is_valid());
    }

    #[test]
    fn invalid_spec_rejected_by_from_seed() {
        let spec = KeySetSpec::new(SymKeyType::XChaCha20Poly1305, 9);
        let result = KeySet::from_seed(spec, &test_seed());
        assert!(matches!(result, Err(CryptoError::InvalidSpec { .. })));
    }

    #[test]
    fn encrypt_decrypt_roundtrip_all_algorithms() {
        let env = SeededEnv::new(1);
        for sym in SymKeyType::ALL {
            for steps in KeySetSpec::MIN_CIPHER_STEPS..=KeySetSpec::MAX_CIPHER_STEPS {
                let key_set =
                    KeySet::from_seed(KeySetSpec::new(*sym, steps), &test_seed()).unwrap();
                let ciphertext = key_set.encrypt(b"Hello, World!", b"aad", &env);
                let plaintext = key_set.decrypt(&ciphertext, b"aad").unwrap();
                assert_eq!(plaintext.as_slice(), b"Hello, World!");
            }
        }
    }

    #[test]
    fn ciphertext_size() {
        let env = SeededEnv::new(2);
        let key_set = KeySet::from_seed(KeySetSpec::default(), &test_seed()).unwrap();
        let ciphertext = key_set.encrypt(b"test message", b"", &env);

        assert_eq!(ciphertext.len(), 12 + 3 * (24 + POLY1305_TAG_SIZE));
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let env = SeededEnv::new(3);
        let key_set = KeySet::generate(KeySetSpec::default(), &env).unwrap();
        let ciphertext = key_set.encrypt(b"", b"", &env);
        assert!(key_set.decrypt(&ciphertext, b"").unwrap().is_empty());
    }

    #[test]
    fn from_seed_is_deterministic() {
        let a = KeySet::from_seed(KeySetSpec::default(), &test_seed()).unwrap();
        let b = KeySet::from_seed(KeySetSpec::default(), &test_seed()).unwrap();
        assert_eq!(*a.to_bytes().unwrap(), *b.to_bytes().unwrap());
    }

    #[test]
    fn step_keys_are_distinct() {
        let key_set = KeySet::from_seed(KeySetSpec::default(), &test_seed()).unwrap();
        assert_ne!(*key_set.keys[0], *key_set.keys[1]);
        assert_ne!(*key_set.keys[1], *key_set.keys[2]);
    }

    #[test]
    fn wrong_aad_fails() {
        let env = SeededEnv::new(4);
        let key_set = KeySet::generate(KeySetSpec::default(), &env).unwrap();
        let ciphertext = key_set.encrypt(b"secret", b"context-a", &env);

        let result = key_set.decrypt(&ciphertext, b"context-b");
        assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
    }

    #[test]
    fn wrong_keyset_fails() {
        let env = SeededEnv::new(5);
        let a = KeySet::generate(KeySetSpec::default(), &env).unwrap();
        let b = KeySet::generate(KeySetSpec::default(), &env).unwrap();

        let ciphertext = a.encrypt(b"secret", b"", &env);
        assert!(b.decrypt(&ciphertext, b"").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let env = SeededEnv::new(6);
        let key_set = KeySet::generate(KeySetSpec::default(), &env).unwrap();
        let mut ciphertext = key_set.encrypt(b"original message", b"", &env);

        if let Some(byte) = ciphertext.last_mut() {
            *byte ^= 0xFF;
        }

        assert!(key_set.decrypt(&ciphertext, b"").is_err());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let key_set = KeySet::from_seed(KeySetSpec::default(), &test_seed()).unwrap();
        let result = key_set.decrypt(&[0u8; 10], b"");
        assert!(matches!(
            result,
            Err(CryptoError::DecryptionFailed { reason }) if reason.contains("too short")
        ));
    }

    #[test]
    fn serialize_roundtrip_preserves_behaviour() {
        let env = SeededEnv::new(7);
        let original =
            KeySet::generate(KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 2), &env).unwrap();

        let bytes = original.to_bytes().unwrap();
        let restored = KeySet::from_bytes(&bytes).unwrap();

        assert_eq!(restored.spec(), original.spec());
        let ciphertext = original.encrypt(b"sample", b"", &env);
        assert_eq!(restored.decrypt(&ciphertext, b"").unwrap().as_slice(), b"sample");
    }

    #[test]
    fn sym_key_type_parses_names() {
        assert_eq!(
            "XChaCha20Poly1305".parse::<SymKeyType>().unwrap(),
            SymKeyType::XChaCha20Poly1305
        );
        assert_eq!("chacha20poly1305".parse::<SymKeyType>().unwrap(), SymKeyType::ChaCha20Poly1305);
        assert!("aes".parse::<SymKeyType>().is_err());
    }
}
