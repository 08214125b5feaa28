//! Fuzz target for lock parsing and resolution
//!
//! # Strategy
//!
//! - Random bytes: arbitrary input handed to `parse_lock` and every resolver
//! - Bit flips: a valid lock with one byte changed
//! - Truncation: a valid lock cut short
//!
//! # Invariants
//!
//! - NEVER panic on malformed locks
//! - A modified lock never resolves with the original password

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealwright_crypto::{KeySet, KeySetSpec, SymKeyType, env::test_utils::SeededEnv};
use sealwright_lock::{LockFactory, PasswordLockSpec};

const PASSWORD: &[u8] = b"fuzz password";

#[derive(Debug, Arbitrary)]
enum LockInput {
    RandomBytes { bytes: Vec<u8>, password: Vec<u8> },
    BitFlip { seed: u64, index: u16, mask: u8 },
    Truncate { seed: u64, keep: u16 },
}

fn valid_lock(factory: &LockFactory<SeededEnv>) -> Option<Vec<u8>> {
    let spec = PasswordLockSpec::new(1, KeySetSpec::new(SymKeyType::ChaCha20Poly1305, 1));
    let key_set = KeySet::generate(spec.key_set_spec(), factory.env()).ok()?;
    factory.new_key_set_lock(&key_set, spec, PASSWORD).ok().map(|lock| lock.into_bytes())
}

fuzz_target!(|input: LockInput| {
    match input {
        LockInput::RandomBytes { bytes, password } => {
            let factory = LockFactory::new(SeededEnv::new(0));
            let _ = factory.parse_lock(&bytes);
            let _ = factory.verify_password(&bytes, &password);
            let _ = factory.resolve_factory_lock(&bytes, &password);
            let _ = factory.resolve_key_set_lock(&bytes, &password);
            let _ = factory.resolve_key_pair_lock(&bytes, &password);
        }

        LockInput::BitFlip { seed, index, mask } => {
            let factory = LockFactory::new(SeededEnv::new(seed));
            let Some(mut bytes) = valid_lock(&factory) else { return };
            if mask == 0 || bytes.is_empty() {
                return;
            }
            let index = usize::from(index) % bytes.len();
            bytes[index] ^= mask;

            assert!(factory.resolve_key_set_lock(&bytes, PASSWORD).is_err());
        }

        LockInput::Truncate { seed, keep } => {
            let factory = LockFactory::new(SeededEnv::new(seed));
            let Some(bytes) = valid_lock(&factory) else { return };
            let keep = usize::from(keep) % bytes.len().max(1);

            assert!(factory.resolve_key_set_lock(&bytes[..keep], PASSWORD).is_err());
        }
    }
});
