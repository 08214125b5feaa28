//! Lock creation and resolution.
//!
//! # Derivation
//!
//! ```text
//! password ──► SHA-256(label ‖ len ‖ password) = pre-hash
//!
//! pre-hash, salt ──► PBKDF2-HMAC-SHA256 (k × 1024 rounds) ──► master (64 B)
//!
//! master ──► HKDF-SHA256 ─┬─► verifier key ──► HMAC(header) = verifier
//!                         └─► wrap seed    ──► KeySet ──► sealed payload
//! ```
//!
//! Resolution recomputes the derivation from the stored salt, checks the
//! verifier in constant time, and only then unseals. A verifier mismatch is
//! reported as [`LockError::BadCredentials`]; an unseal failure after a good
//! verifier means the lock itself is damaged.
//!
//! The pre-hash gives PBKDF2 a fixed 32-byte HMAC key. Raw passwords would
//! hit HMAC's key normalisation, where zero padding and hashing of long keys
//! make distinct passwords derive the same master.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sealwright_crypto::{
    Environment, Factory, KeyPair, KeySet, KnuthObfuscator, keyset::KEY_SIZE,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{
    error::LockError,
    lock::{Lock, LockEnvelope, Lockable, SALT_SIZE, VERIFIER_SIZE},
    spec::PasswordLockSpec,
};

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 output length
const MASTER_SIZE: usize = 64;

/// Domain label for the password pre-hash
const PASSWORD_LABEL: &[u8] = b"sealwrightLockPasswordV1";

/// HKDF label for the verifier key
const VERIFIER_LABEL: &[u8] = b"sealwrightLockVerifierV1";

/// HKDF label for the wrapping keyset seed
const WRAP_LABEL: &[u8] = b"sealwrightLockWrapV1";

/// Creates and resolves password locks.
///
/// Holds the randomness source for salts and nonces and the obfuscator used
/// for persisted type tags. A lock created by one factory can only be parsed
/// by a factory with the same obfuscator.
#[derive(Debug, Clone)]
pub struct LockFactory<E: Environment> {
    env: E,
    obfuscator: KnuthObfuscator,
}

impl<E: Environment> LockFactory<E> {
    /// Create a lock factory using the default obfuscator.
    pub fn new(env: E) -> Self {
        Self::with_obfuscator(env, KnuthObfuscator::default())
    }

    /// Create a lock factory with explicit obfuscation constants.
    pub fn with_obfuscator(env: E, obfuscator: KnuthObfuscator) -> Self {
        Self { env, obfuscator }
    }

    /// Create a lock factory whose identifiers follow `factory`'s
    /// personalisation.
    pub fn for_factory(env: E, factory: &Factory) -> Self {
        Self::with_obfuscator(env, factory.obfuscator())
    }

    /// Randomness source.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Obfuscator applied to persisted type tags.
    pub fn obfuscator(&self) -> KnuthObfuscator {
        self.obfuscator
    }

    /// Place `payload` under a new lock.
    ///
    /// # Errors
    ///
    /// - `InvalidPassword` if `password` is empty
    /// - `InvalidSpec` if `spec` is out of range
    pub fn new_lock<T: Lockable>(
        &self,
        payload: &T,
        spec: PasswordLockSpec,
        password: &[u8],
    ) -> Result<Lock, LockError> {
        check_password(password)?;
        spec.validate()?;

        let salt: [u8; SALT_SIZE] = self.env.random_array();
        let keys = LockKeys::derive(password, &salt, spec)?;

        let mut envelope = LockEnvelope::new(&self.obfuscator, T::KIND, spec, salt);
        let header = envelope.header();
        envelope.verifier = keys.verifier(&header);

        let plaintext = payload.to_payload()?;
        envelope.sealed = keys.wrap.encrypt(&plaintext, &header, &self.env);

        tracing::debug!(kind = %T::KIND, spec = %spec, "created password lock");

        Ok(Lock::new(envelope.encode()?, spec, T::KIND))
    }

    /// Open a lock and return its payload.
    ///
    /// # Errors
    ///
    /// - `BadCredentials` if `password` does not open the lock
    /// - `InvalidPassword` if `password` is empty
    /// - `KindMismatch` if the lock holds a different payload kind
    /// - `UnsupportedVersion`, `Corrupt` or `Crypto` for damaged locks
    pub fn resolve_lock<T: Lockable>(
        &self,
        lock_bytes: &[u8],
        password: &[u8],
    ) -> Result<T, LockError> {
        check_password(password)?;

        let (envelope, lock) = self.open_envelope(lock_bytes)?;
        if lock.kind() != T::KIND {
            return Err(LockError::KindMismatch { expected: T::KIND, actual: lock.kind() });
        }

        let header = envelope.header();
        let keys = LockKeys::derive(password, &envelope.salt, lock.spec())?;
        keys.check_verifier(&header, &envelope.verifier)?;

        let plaintext = keys
            .wrap
            .decrypt(&envelope.sealed, &header)
            .map_err(|err| LockError::Corrupt { reason: err.to_string() })?;

        T::from_payload(&plaintext).map_err(|err| LockError::Corrupt { reason: err.to_string() })
    }

    /// Check `password` against a lock without unsealing the payload.
    pub fn verify_password(&self, lock_bytes: &[u8], password: &[u8]) -> Result<Lock, LockError> {
        check_password(password)?;

        let (envelope, lock) = self.open_envelope(lock_bytes)?;
        let keys = LockKeys::derive(password, &envelope.salt, lock.spec())?;
        keys.check_verifier(&envelope.header(), &envelope.verifier)?;

        Ok(lock)
    }

    /// Parse lock bytes into a [`Lock`] without a password.
    ///
    /// Recovers the payload kind and spec; the payload stays sealed.
    pub fn parse_lock(&self, lock_bytes: &[u8]) -> Result<Lock, LockError> {
        self.open_envelope(lock_bytes).map(|(_, lock)| lock)
    }

    /// Lock a factory.
    pub fn new_factory_lock(
        &self,
        payload: &Factory,
        spec: PasswordLockSpec,
        password: &[u8],
    ) -> Result<Lock, LockError> {
        self.new_lock(payload, spec, password)
    }

    /// Lock a keyset.
    pub fn new_key_set_lock(
        &self,
        payload: &KeySet,
        spec: PasswordLockSpec,
        password: &[u8],
    ) -> Result<Lock, LockError> {
        self.new_lock(payload, spec, password)
    }

    /// Lock a keypair.
    pub fn new_key_pair_lock(
        &self,
        payload: &KeyPair,
        spec: PasswordLockSpec,
        password: &[u8],
    ) -> Result<Lock, LockError> {
        self.new_lock(payload, spec, password)
    }

    /// Resolve a factory lock.
    pub fn resolve_factory_lock(
        &self,
        lock_bytes: &[u8],
        password: &[u8],
    ) -> Result<Factory, LockError> {
        self.resolve_lock(lock_bytes, password)
    }

    /// Resolve a keyset lock.
    pub fn resolve_key_set_lock(
        &self,
        lock_bytes: &[u8],
        password: &[u8],
    ) -> Result<KeySet, LockError> {
        self.resolve_lock(lock_bytes, password)
    }

    /// Resolve a keypair lock.
    pub fn resolve_key_pair_lock(
        &self,
        lock_bytes: &[u8],
        password: &[u8],
    ) -> Result<KeyPair, LockError> {
        self.resolve_lock(lock_bytes, password)
    }

    fn open_envelope(&self, lock_bytes: &[u8]) -> Result<(LockEnvelope, Lock), LockError> {
        let envelope = LockEnvelope::decode(lock_bytes)?;
        let kind = envelope.kind(&self.obfuscator)?;
        let spec = envelope.spec(&self.obfuscator)?;
        Ok((envelope, Lock::new(lock_bytes.to_vec(), spec, kind)))
    }
}

fn check_password(password: &[u8]) -> Result<(), LockError> {
    if password.is_empty() {
        return Err(LockError::InvalidPassword { reason: "password is empty".to_string() });
    }
    Ok(())
}

/// Keys derived from one `(password, salt, spec)` triple.
struct LockKeys {
    verifier_key: Zeroizing<[u8; KEY_SIZE]>,
    wrap: KeySet,
}

impl LockKeys {
    fn derive(
        password: &[u8],
        salt: &[u8; SALT_SIZE],
        spec: PasswordLockSpec,
    ) -> Result<Self, LockError> {
        let prehash = password_prehash(password);
        let mut master = Zeroizing::new([0u8; MASTER_SIZE]);
        pbkdf2::pbkdf2_hmac::<Sha256>(&prehash[..], salt, spec.iterations(), &mut master[..]);

        let hkdf = Hkdf::<Sha256>::new(Some(&salt[..]), &master[..]);

        let mut verifier_key = Zeroizing::new([0u8; KEY_SIZE]);
        let Ok(()) = hkdf.expand(VERIFIER_LABEL, &mut verifier_key[..]) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };

        let mut wrap_seed = Zeroizing::new([0u8; KEY_SIZE]);
        let Ok(()) = hkdf.expand(WRAP_LABEL, &mut wrap_seed[..]) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };

        let wrap = KeySet::from_seed(spec.key_set_spec(), &wrap_seed)?;
        Ok(Self { verifier_key, wrap })
    }

    fn mac(&self, header: &[u8]) -> HmacSha256 {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.verifier_key[..]) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac.update(header);
        mac
    }

    fn verifier(&self, header: &[u8]) -> [u8; VERIFIER_SIZE] {
        let mut verifier = [0u8; VERIFIER_SIZE];
        verifier.copy_from_slice(&self.mac(header).finalize().into_bytes());
        verifier
    }

    /// Constant-time verifier comparison.
    fn check_verifier(
        &self,
        header: &[u8],
        expected: &[u8; VERIFIER_SIZE],
    ) -> Result<(), LockError> {
        self.mac(header).verify_slice(expected).map_err(|_| {
            tracing::debug!("lock verifier mismatch");
            LockError::BadCredentials
        })
    }
}

/// Length-prefixed, domain-separated digest of the password.
fn password_prehash(password: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(PASSWORD_LABEL);
    hasher.update((password.len() as u64).to_be_bytes());
    hasher.update(password);
    Zeroizing::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use sealwright_crypto::{FactoryType, KeySetSpec, SymKeyType, env::test_utils::SeededEnv};

    use super::*;
    use crate::lock::PayloadKind;

    /// Cheapest valid spec, keeps PBKDF2 fast in tests
    fn fast_spec() -> PasswordLockSpec {
        PasswordLockSpec::new(1, KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 1))
    }

    fn factory() -> LockFactory<SeededEnv> {
        LockFactory::new(SeededEnv::new(42))
    }

    #[test]
    fn key_set_lock_roundtrip() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();

        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"hunter2").unwrap();
        let resolved = lock_factory.resolve_key_set_lock(lock.bytes(), b"hunter2").unwrap();

        assert_eq!(*resolved.to_bytes().unwrap(), *key_set.to_bytes().unwrap());
        assert_eq!(lock.kind(), PayloadKind::KeySet);
        assert_eq!(lock.spec(), fast_spec());
    }

    #[test]
    fn wrong_password_is_bad_credentials() {
        let lock_factory = factory();
        let key_pair = KeyPair::generate_x25519(lock_factory.env());

        let lock = lock_factory.new_key_pair_lock(&key_pair, fast_spec(), b"right").unwrap();
        let result = lock_factory.resolve_key_pair_lock(lock.bytes(), b"wrong");

        assert_eq!(result.unwrap_err(), LockError::BadCredentials);
    }

    #[test]
    fn empty_password_is_invalid() {
        let lock_factory = factory();
        let factory_payload = Factory::generate(FactoryType::Standard, lock_factory.env());

        let result = lock_factory.new_factory_lock(&factory_payload, fast_spec(), b"");
        assert!(matches!(result, Err(LockError::InvalidPassword { .. })));
    }

    #[test]
    fn invalid_spec_is_rejected() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();

        let spec = PasswordLockSpec::new(0, KeySetSpec::default());
        let result = lock_factory.new_key_set_lock(&key_set, spec, b"pw");
        assert!(matches!(result, Err(LockError::InvalidSpec { .. })));
    }

    #[test]
    fn resolving_as_wrong_kind_fails() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();
        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();

        let result = lock_factory.resolve_key_pair_lock(lock.bytes(), b"pw");
        assert_eq!(
            result.unwrap_err(),
            LockError::KindMismatch { expected: PayloadKind::KeyPair, actual: PayloadKind::KeySet }
        );
    }

    #[test]
    fn same_payload_gets_fresh_salt() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();

        let a = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();
        let b = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();

        assert_ne!(a.bytes(), b.bytes());
    }

    #[test]
    fn parse_lock_recovers_metadata_without_password() {
        let lock_factory = factory();
        let factory_payload = Factory::generate(FactoryType::Personalised, lock_factory.env());
        let lock = lock_factory.new_factory_lock(&factory_payload, fast_spec(), b"pw").unwrap();

        let parsed = lock_factory.parse_lock(lock.bytes()).unwrap();
        assert_eq!(parsed, lock);
    }

    #[test]
    fn verify_password_checks_without_unsealing() {
        let lock_factory = factory();
        let key_pair = KeyPair::generate_x25519(lock_factory.env());
        let lock = lock_factory.new_key_pair_lock(&key_pair, fast_spec(), b"pw").unwrap();

        assert!(lock_factory.verify_password(lock.bytes(), b"pw").is_ok());
        assert_eq!(
            lock_factory.verify_password(lock.bytes(), b"nope").unwrap_err(),
            LockError::BadCredentials
        );
    }

    #[test]
    fn foreign_obfuscator_cannot_parse() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();
        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();

        let foreign = LockFactory::with_obfuscator(
            SeededEnv::new(1),
            KnuthObfuscator::personalised(b"other install"),
        );
        let result = foreign.resolve_key_set_lock(lock.bytes(), b"pw");

        assert!(matches!(result, Err(LockError::Crypto(_))));
    }

    #[test]
    fn personalised_factory_locks_roundtrip() {
        let env = SeededEnv::new(9);
        let root = Factory::generate(FactoryType::Personalised, &env);
        let lock_factory = LockFactory::for_factory(env, &root);

        let key_pair = KeyPair::generate_x25519(lock_factory.env());
        let lock = lock_factory.new_key_pair_lock(&key_pair, fast_spec(), b"pw").unwrap();

        let resolved = lock_factory.resolve_key_pair_lock(lock.bytes(), b"pw").unwrap();
        assert_eq!(resolved.public_key(), key_pair.public_key());
    }

    #[test]
    fn damaged_sealed_payload_is_corrupt() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();
        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();

        let mut envelope = LockEnvelope::decode(lock.bytes()).unwrap();
        if let Some(byte) = envelope.sealed.last_mut() {
            *byte ^= 0x01;
        }
        let damaged = envelope.encode().unwrap();

        let result = lock_factory.resolve_key_set_lock(&damaged, b"pw");
        assert!(matches!(result, Err(LockError::Corrupt { .. })));
    }

    #[test]
    fn edited_header_fails_verification() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();
        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();

        let mut envelope = LockEnvelope::decode(lock.bytes()).unwrap();
        envelope.salt[0] ^= 0x01;
        let edited = envelope.encode().unwrap();

        let result = lock_factory.resolve_key_set_lock(&edited, b"pw");
        assert_eq!(result.unwrap_err(), LockError::BadCredentials);
    }

    #[test]
    fn padded_or_digested_password_is_rejected() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();

        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();
        let result = lock_factory.resolve_key_set_lock(lock.bytes(), b"pw\0");
        assert_eq!(result.unwrap_err(), LockError::BadCredentials);

        let long = [0x5a; 80];
        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), &long).unwrap();
        let digest = Sha256::digest(long);
        let result = lock_factory.resolve_key_set_lock(lock.bytes(), &digest);
        assert_eq!(result.unwrap_err(), LockError::BadCredentials);
    }

    #[test]
    fn trailing_bytes_make_lock_corrupt() {
        let lock_factory = factory();
        let key_set = KeySet::generate(KeySetSpec::default(), lock_factory.env()).unwrap();
        let lock = lock_factory.new_key_set_lock(&key_set, fast_spec(), b"pw").unwrap();

        let mut extended = lock.bytes().to_vec();
        extended.extend_from_slice(b"garbage");

        let result = lock_factory.resolve_key_set_lock(&extended, b"pw");
        assert!(matches!(result, Err(LockError::Corrupt { .. })));
        assert!(matches!(lock_factory.parse_lock(&extended), Err(LockError::Corrupt { .. })));
    }
}
