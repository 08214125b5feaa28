//! Property-based tests for password locks
//!
//! Uses the cheapest valid spec so PBKDF2 stays fast, and a seeded
//! environment so every failing case reproduces.

use proptest::prelude::*;
use sealwright_crypto::{KeyPair, KeySet, KeySetSpec, SymKeyType, env::test_utils::SeededEnv};
use sealwright_lock::{LockError, LockFactory, PasswordCache, PasswordLockSpec};
use sha2::{Digest, Sha256};

fn fast_spec(sym_key_type: SymKeyType, cipher_steps: u8) -> PasswordLockSpec {
    PasswordLockSpec::new(1, KeySetSpec::new(sym_key_type, cipher_steps))
}

fn arbitrary_sym() -> impl Strategy<Value = SymKeyType> {
    prop_oneof![Just(SymKeyType::ChaCha20Poly1305), Just(SymKeyType::XChaCha20Poly1305)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: resolve(new(payload, pw), pw) returns the payload byte for byte
    #[test]
    fn prop_key_set_lock_roundtrip(
        seed in any::<u64>(),
        password in prop::collection::vec(any::<u8>(), 1..64),
        sym in arbitrary_sym(),
        steps in 1u8..=5,
    ) {
        let factory = LockFactory::new(SeededEnv::new(seed));
        let key_set = KeySet::generate(KeySetSpec::new(sym, steps), factory.env())?;

        let lock = factory.new_key_set_lock(&key_set, fast_spec(sym, steps), &password)?;
        let resolved = factory.resolve_key_set_lock(lock.bytes(), &password)?;

        let resolved_bytes = resolved.to_bytes()?;
        let original_bytes = key_set.to_bytes()?;
        prop_assert_eq!(resolved_bytes.as_slice(), original_bytes.as_slice());
    }

    /// Property: any other password is rejected as bad credentials
    #[test]
    fn prop_wrong_password_is_bad_credentials(
        seed in any::<u64>(),
        password in prop::collection::vec(any::<u8>(), 1..32),
        other in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        prop_assume!(password != other);

        let factory = LockFactory::new(SeededEnv::new(seed));
        let key_pair = KeyPair::generate_x25519(factory.env());
        let lock = factory.new_key_pair_lock(
            &key_pair,
            fast_spec(SymKeyType::XChaCha20Poly1305, 1),
            &password,
        )?;

        let result = factory.resolve_key_pair_lock(lock.bytes(), &other);
        prop_assert_eq!(result.err(), Some(LockError::BadCredentials));
    }

    /// Property: appending NUL bytes to the password does not open the lock
    #[test]
    fn prop_nul_padded_password_is_bad_credentials(
        seed in any::<u64>(),
        password in prop::collection::vec(any::<u8>(), 1..32),
        padding in 1usize..8,
    ) {
        let factory = LockFactory::new(SeededEnv::new(seed));
        let key_set = KeySet::generate(KeySetSpec::default(), factory.env())?;
        let lock = factory.new_key_set_lock(
            &key_set,
            fast_spec(SymKeyType::ChaCha20Poly1305, 1),
            &password,
        )?;

        let mut padded = password.clone();
        padded.resize(password.len() + padding, 0);

        let result = factory.resolve_key_set_lock(lock.bytes(), &padded);
        prop_assert_eq!(result.err(), Some(LockError::BadCredentials));
    }

    /// Property: the SHA-256 of a long password does not open its lock
    #[test]
    fn prop_digest_of_long_password_is_bad_credentials(
        seed in any::<u64>(),
        password in prop::collection::vec(any::<u8>(), 65..128),
    ) {
        let factory = LockFactory::new(SeededEnv::new(seed));
        let key_pair = KeyPair::generate_x25519(factory.env());
        let lock = factory.new_key_pair_lock(
            &key_pair,
            fast_spec(SymKeyType::XChaCha20Poly1305, 1),
            &password,
        )?;

        let digest = Sha256::digest(&password);
        let result = factory.resolve_key_pair_lock(lock.bytes(), &digest);
        prop_assert_eq!(result.err(), Some(LockError::BadCredentials));
    }

    /// Property: a lock with bytes appended is corrupt, not an alias
    #[test]
    fn prop_extended_lock_is_corrupt(
        seed in any::<u64>(),
        suffix in prop::collection::vec(any::<u8>(), 1..16),
    ) {
        let factory = LockFactory::new(SeededEnv::new(seed));
        let key_set = KeySet::generate(KeySetSpec::default(), factory.env())?;
        let lock = factory.new_key_set_lock(
            &key_set,
            fast_spec(SymKeyType::ChaCha20Poly1305, 1),
            b"password",
        )?;

        let mut extended = lock.into_bytes();
        extended.extend_from_slice(&suffix);

        let result = factory.resolve_key_set_lock(&extended, b"password");
        prop_assert!(matches!(result, Err(LockError::Corrupt { .. })), "expected LockError::Corrupt, got {:?}", result);
    }

    /// Property: flipping any byte of a lock never yields a payload
    #[test]
    fn prop_tampered_lock_never_resolves(
        seed in any::<u64>(),
        position in any::<prop::sample::Index>(),
        flip in 1u8..,
    ) {
        let factory = LockFactory::new(SeededEnv::new(seed));
        let key_set = KeySet::generate(KeySetSpec::default(), factory.env())?;
        let lock = factory.new_key_set_lock(
            &key_set,
            fast_spec(SymKeyType::ChaCha20Poly1305, 2),
            b"password",
        )?;

        let mut tampered = lock.into_bytes();
        let index = position.index(tampered.len());
        tampered[index] ^= flip;

        let result = factory.resolve_key_set_lock(&tampered, b"password");
        prop_assert!(result.is_err());
    }

    /// Property: the cache resolves any lock made with a remembered password
    #[test]
    fn prop_cache_resolves_with_known_password(
        seed in any::<u64>(),
        passwords in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 1..5),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut cache = PasswordCache::new(LockFactory::new(SeededEnv::new(seed)))?;
        for password in &passwords {
            cache.remember_password(password)?;
        }

        let chosen = pick.get(&passwords);
        let key_set = KeySet::generate(KeySetSpec::default(), cache.factory().env())?;
        let lock = cache.factory().new_key_set_lock(
            &key_set,
            fast_spec(SymKeyType::ChaCha20Poly1305, 1),
            chosen,
        )?;

        let resolved = cache.attempt_known_passwords::<KeySet>(lock.bytes())?;
        prop_assert!(resolved.is_some());
    }
}
