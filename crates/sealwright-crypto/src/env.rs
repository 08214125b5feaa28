//! Environment abstraction for deterministic testing.
//!
//! Decouples lock and agreement logic from the source of randomness. Salts,
//! nonces and ephemeral key seeds are all drawn through [`Environment`], so a
//! seeded environment reproduces every byte of a lock or handshake while
//! production uses the OS RNG.

use std::sync::{Arc, Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Abstract environment providing randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a fixed-size array of random bytes.
    ///
    /// Convenience for salts, nonces and key seeds.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Production environment using the OS cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Salts and nonces drawn from a broken RNG
/// would silently weaken every lock, so there is no fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot derive secure salts");
    }
}

/// Deterministic environments for tests, fuzzing and reproducible tooling.
pub mod test_utils {
    use super::{Arc, ChaCha20Rng, Environment, Mutex, PoisonError, RngCore, SeedableRng};

    /// Seeded environment backed by `ChaCha20Rng`.
    ///
    /// Clones share one RNG stream, so a lock factory and the cache that owns
    /// it draw from the same reproducible sequence.
    #[derive(Debug, Clone)]
    pub struct SeededEnv {
        rng: Arc<Mutex<ChaCha20Rng>>,
    }

    impl SeededEnv {
        /// Create an environment whose output is fully determined by `seed`.
        pub fn new(seed: u64) -> Self {
            Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
        }

        /// Create an environment seeded from the OS RNG.
        ///
        /// Output is not reproducible but the type stays the same as in
        /// deterministic tests.
        pub fn with_crypto_rng() -> Self {
            let seed = super::SystemEnv.random_u64();
            Self::new(seed)
        }
    }

    impl Environment for SeededEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.fill_bytes(buffer);
        }
    }
}
