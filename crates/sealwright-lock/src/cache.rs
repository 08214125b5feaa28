//! Memory of passwords that have already opened a lock.
//!
//! Many locks in one store usually share a password. The cache lets the
//! password manager resolve them without prompting again:
//!
//! 1. exact lookup: lock bytes seen before map straight to their payload
//! 2. known passwords: every password that opened some lock is tried, in the
//!    order it was first seen
//!
//! Passwords are never held in clear between attempts. Each distinct
//! password is sealed under a keyset generated for this cache alone and is
//! only opened into a zeroizing buffer for the duration of one attempt.
//! Duplicates are detected by a keyed fingerprint, so the cache never keeps
//! a plain hash of a password either.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sealwright_crypto::{Environment, KeySet, KeySetSpec, SymKeyType, keyset::KEY_SIZE};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    error::LockError,
    factory::LockFactory,
    lock::{Lock, Lockable, ResolvedPayload},
    spec::PasswordLockSpec,
};

type HmacSha256 = Hmac<Sha256>;

/// Associated data for sealed cache passwords
const PASSWORD_AAD: &[u8] = b"sealwrightCachedPasswordV1";

/// Index into the sealed password list
type PasswordIndex = usize;

/// A lock that has been resolved, with the password that opened it.
struct ResolvedEntry {
    payload: ResolvedPayload,
    password: PasswordIndex,
}

/// Cache of resolved locks and the passwords that resolved them.
///
/// Owns the [`LockFactory`] it resolves through, so a cache is scoped to
/// one factory handle rather than shared process-wide.
pub struct PasswordCache<E: Environment> {
    factory: LockFactory<E>,
    sealer: KeySet,
    fingerprint_key: Zeroizing<[u8; KEY_SIZE]>,
    passwords: Vec<Vec<u8>>,
    fingerprints: HashMap<[u8; 32], PasswordIndex>,
    resolved: HashMap<Vec<u8>, ResolvedEntry>,
}

impl<E: Environment> PasswordCache<E> {
    /// Create an empty cache over `factory`.
    pub fn new(factory: LockFactory<E>) -> Result<Self, LockError> {
        let sealer =
            KeySet::generate(KeySetSpec::new(SymKeyType::XChaCha20Poly1305, 1), factory.env())?;
        let fingerprint_key = Zeroizing::new(factory.env().random_array::<KEY_SIZE>());

        Ok(Self {
            factory,
            sealer,
            fingerprint_key,
            passwords: Vec::new(),
            fingerprints: HashMap::new(),
            resolved: HashMap::new(),
        })
    }

    /// Lock factory used for every resolution.
    pub fn factory(&self) -> &LockFactory<E> {
        &self.factory
    }

    /// Number of distinct passwords remembered.
    pub fn known_password_count(&self) -> usize {
        self.passwords.len()
    }

    /// Number of locks with a cached payload.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Record that `password` opens `lock_bytes`, yielding `payload`.
    pub fn add_resolved<T: Lockable>(
        &mut self,
        lock_bytes: &[u8],
        payload: T,
        password: &[u8],
    ) -> Result<(), LockError> {
        let index = self.remember_password(password)?;
        self.record(lock_bytes, payload, index);
        Ok(())
    }

    /// Payload of a lock resolved earlier, if any.
    ///
    /// Returns `None` for unseen locks and for locks that hold a different
    /// payload kind than `T`.
    pub fn look_up_resolved<T: Lockable>(&self, lock_bytes: &[u8]) -> Option<T> {
        let entry = self.resolved.get(lock_bytes)?;
        let payload = T::from_resolved(&entry.payload);
        if payload.is_some() {
            tracing::debug!(kind = %T::KIND, "password cache hit");
        }
        payload
    }

    /// Try every known password against `lock_bytes`.
    ///
    /// Passwords are tried in the order they were first seen and the first
    /// one that opens the lock wins; the lock is then recorded as resolved.
    /// Bad credentials are swallowed. Returns `Ok(None)` when no known
    /// password fits.
    ///
    /// # Errors
    ///
    /// Any failure other than bad credentials (corrupt lock, kind mismatch)
    /// is returned immediately.
    pub fn attempt_known_passwords<T: Lockable>(
        &mut self,
        lock_bytes: &[u8],
    ) -> Result<Option<T>, LockError> {
        if let Some(payload) = self.look_up_resolved(lock_bytes) {
            return Ok(Some(payload));
        }

        for index in 0..self.passwords.len() {
            let password = self.unseal_password(index)?;

            match self.factory.resolve_lock::<T>(lock_bytes, &password) {
                Ok(payload) => {
                    tracing::debug!(
                        kind = %T::KIND,
                        attempt = index + 1,
                        "known password resolved lock"
                    );
                    self.record(lock_bytes, payload.clone(), index);
                    return Ok(Some(payload));
                },
                Err(err) if err.is_bad_credentials() => {},
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(known = self.passwords.len(), "no known password resolves lock");
        Ok(None)
    }

    /// Lock `payload` with the password that resolved `reference_lock_bytes`.
    ///
    /// The new lock gets a fresh salt. Returns `Ok(None)` if the reference
    /// lock has not been resolved through this cache.
    pub fn create_similar<T: Lockable>(
        &mut self,
        payload: &T,
        reference_lock_bytes: &[u8],
        spec: PasswordLockSpec,
    ) -> Result<Option<Lock>, LockError> {
        let Some(index) = self.resolved.get(reference_lock_bytes).map(|entry| entry.password) else {
            return Ok(None);
        };

        let password = self.unseal_password(index)?;
        let lock = self.factory.new_lock(payload, spec, &password)?;
        self.record(lock.bytes(), payload.clone(), index);

        Ok(Some(lock))
    }

    /// Create a lock through the factory and record it.
    pub fn new_lock<T: Lockable>(
        &mut self,
        payload: &T,
        spec: PasswordLockSpec,
        password: &[u8],
    ) -> Result<Lock, LockError> {
        let lock = self.factory.new_lock(payload, spec, password)?;
        self.add_resolved(lock.bytes(), payload.clone(), password)?;
        Ok(lock)
    }

    /// Resolve a lock through the factory and record it on success.
    pub fn resolve_lock<T: Lockable>(
        &mut self,
        lock_bytes: &[u8],
        password: &[u8],
    ) -> Result<T, LockError> {
        let payload = self.factory.resolve_lock::<T>(lock_bytes, password)?;
        self.add_resolved(lock_bytes, payload.clone(), password)?;
        Ok(payload)
    }

    /// Remember `password` as known without tying it to a lock.
    pub fn remember_password(&mut self, password: &[u8]) -> Result<usize, LockError> {
        if password.is_empty() {
            return Err(LockError::InvalidPassword { reason: "password is empty".to_string() });
        }

        let fingerprint = self.fingerprint(password);
        if let Some(index) = self.fingerprints.get(&fingerprint) {
            return Ok(*index);
        }

        let sealed = self.sealer.encrypt(password, PASSWORD_AAD, self.factory.env());
        self.passwords.push(sealed);

        let index = self.passwords.len() - 1;
        self.fingerprints.insert(fingerprint, index);
        Ok(index)
    }

    /// Forget every password and resolved payload.
    pub fn clear(&mut self) {
        self.passwords.clear();
        self.fingerprints.clear();
        self.resolved.clear();
    }

    fn record<T: Lockable>(&mut self, lock_bytes: &[u8], payload: T, password: PasswordIndex) {
        self.resolved
            .entry(lock_bytes.to_vec())
            .or_insert_with(|| ResolvedEntry { payload: payload.into_resolved(), password });
    }

    fn unseal_password(&self, index: PasswordIndex) -> Result<Zeroizing<Vec<u8>>, LockError> {
        let sealed = self.passwords.get(index).ok_or_else(|| LockError::Corrupt {
            reason: format!("password index {index} out of range"),
        })?;
        Ok(self.sealer.decrypt(sealed, PASSWORD_AAD)?)
    }

    fn fingerprint(&self, password: &[u8]) -> [u8; 32] {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.fingerprint_key[..]) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac.update(password);

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&mac.finalize().into_bytes());
        fingerprint
    }
}

#[cfg(test)]
mod tests {
    use sealwright_crypto::{KeyPair, env::test_utils::SeededEnv};

    use super::*;

    fn fast_spec() -> PasswordLockSpec {
        PasswordLockSpec::new(1, KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 1))
    }

    fn cache() -> PasswordCache<SeededEnv> {
        PasswordCache::new(LockFactory::new(SeededEnv::new(7))).unwrap()
    }

    fn key_set(cache: &PasswordCache<SeededEnv>) -> KeySet {
        KeySet::generate(KeySetSpec::default(), cache.factory().env()).unwrap()
    }

    #[test]
    fn look_up_after_new_lock() {
        let mut cache = cache();
        let payload = key_set(&cache);

        let lock = cache.new_lock(&payload, fast_spec(), b"pw").unwrap();
        let found: KeySet = cache.look_up_resolved(lock.bytes()).unwrap();

        assert_eq!(*found.to_bytes().unwrap(), *payload.to_bytes().unwrap());
    }

    #[test]
    fn look_up_unknown_lock_is_none() {
        let cache = cache();
        assert!(cache.look_up_resolved::<KeySet>(b"never seen").is_none());
    }

    #[test]
    fn look_up_with_wrong_kind_is_none() {
        let mut cache = cache();
        let payload = key_set(&cache);
        let lock = cache.new_lock(&payload, fast_spec(), b"pw").unwrap();

        assert!(cache.look_up_resolved::<KeyPair>(lock.bytes()).is_none());
    }

    #[test]
    fn known_password_opens_sibling_lock() {
        let mut cache = cache();
        let first = key_set(&cache);
        let second = key_set(&cache);

        cache.new_lock(&first, fast_spec(), b"shared").unwrap();
        let sibling = cache.factory().new_lock(&second, fast_spec(), b"shared").unwrap();

        let resolved: KeySet = cache.attempt_known_passwords(sibling.bytes()).unwrap().unwrap();
        assert_eq!(*resolved.to_bytes().unwrap(), *second.to_bytes().unwrap());

        // Recorded for exact lookup afterwards
        assert!(cache.look_up_resolved::<KeySet>(sibling.bytes()).is_some());
    }

    #[test]
    fn known_passwords_tried_until_one_fits() {
        let mut cache = cache();
        cache.remember_password(b"first").unwrap();
        cache.remember_password(b"second").unwrap();
        cache.remember_password(b"third").unwrap();

        let payload = key_set(&cache);
        let lock = cache.factory().new_lock(&payload, fast_spec(), b"third").unwrap();

        let resolved = cache.attempt_known_passwords::<KeySet>(lock.bytes()).unwrap();
        assert!(resolved.is_some());
    }

    #[test]
    fn no_known_password_is_none() {
        let mut cache = cache();
        cache.remember_password(b"alpha").unwrap();

        let payload = key_set(&cache);
        let lock = cache.factory().new_lock(&payload, fast_spec(), b"beta").unwrap();

        assert!(cache.attempt_known_passwords::<KeySet>(lock.bytes()).unwrap().is_none());
    }

    #[test]
    fn non_credential_errors_propagate() {
        let mut cache = cache();
        cache.remember_password(b"alpha").unwrap();

        let result = cache.attempt_known_passwords::<KeySet>(b"not a lock");
        assert!(matches!(result, Err(LockError::Corrupt { .. })));
    }

    #[test]
    fn passwords_are_deduplicated() {
        let mut cache = cache();
        let a = cache.remember_password(b"same").unwrap();
        let b = cache.remember_password(b"same").unwrap();
        let c = cache.remember_password(b"other").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.known_password_count(), 2);
    }

    #[test]
    fn passwords_are_not_stored_in_clear() {
        let mut cache = cache();
        cache.remember_password(b"Sn0wy-Owl!").unwrap();

        let sealed = &cache.passwords[0];
        assert!(!sealed.windows(10).any(|window| window == b"Sn0wy-Owl!"));
    }

    #[test]
    fn create_similar_reuses_reference_password() {
        let mut cache = cache();
        let first = key_set(&cache);
        let second = key_set(&cache);

        let reference = cache.new_lock(&first, fast_spec(), b"reuse me").unwrap();
        let similar =
            cache.create_similar(&second, reference.bytes(), fast_spec()).unwrap().unwrap();

        assert_ne!(similar.bytes(), reference.bytes());
        let resolved = cache.factory().resolve_key_set_lock(similar.bytes(), b"reuse me").unwrap();
        assert_eq!(*resolved.to_bytes().unwrap(), *second.to_bytes().unwrap());
    }

    #[test]
    fn create_similar_with_unknown_reference_is_none() {
        let mut cache = cache();
        let payload = key_set(&cache);

        assert!(cache.create_similar(&payload, b"unknown", fast_spec()).unwrap().is_none());
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = cache();
        let payload = key_set(&cache);
        let lock = cache.new_lock(&payload, fast_spec(), b"pw").unwrap();

        cache.clear();

        assert_eq!(cache.known_password_count(), 0);
        assert!(cache.look_up_resolved::<KeySet>(lock.bytes()).is_none());
    }
}
